// factory.rs — Fold "tensor from scalars" factory calls into constant operations
//
// Recognizes
//
//     apply @__tf_tensor_from_scalars (%scalars, %shape)
//     apply @__tf_tensor_from_scalars_1d (%scalars)
//
// and, when every argument is a literal array, replaces the call with
//
//     __tfop_Const,value$tensor,$elt...,value$shape,$elt...,dtype$dtype
//
// The 1-D form has no shape argument: its shape is a single Int64 count, and
// the element type marker doubles as the shape marker. The marker is also
// passed again as the dtype.
//
// Preconditions: `func` is well-formed.
// Postconditions: `Rewritten` ⇒ the call is gone and the returned descriptor
//   decodes and validates; otherwise `func` is untouched.
// Failure modes: a shape whose element product differs from the scalar count
//   is `Rejected` with a diagnostic; other unresolved arguments are left for
//   later lowering.
// Side effects: mutates `func` on rewrite.

use crate::canonicalize::{insert_marker, materialize, scalar_elements, OperandBuilder};
use crate::decode::OperationDescriptor;
use crate::diag::Diagnostic;
use crate::dtype::TargetInfo;
use crate::id::InstId;
use crate::ir::{Function, InstKind, Type};
use crate::location::user_source_location;
use crate::opclass::{OperandClass, OperandEntry};
use crate::validate::{check_operands, ShapePolicy, ValidationError};

pub const TENSOR_FROM_SCALARS: &str = "__tf_tensor_from_scalars";
pub const TENSOR_FROM_SCALARS_1D: &str = "__tf_tensor_from_scalars_1d";

const CONST_OP: &str = "Const";
const VALUE_LABEL: &str = "value";
const DTYPE_LABEL: &str = "dtype";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryKind {
    /// Flat scalar list plus an explicit shape.
    WithShape,
    /// Flat scalar list; the shape is its length.
    OneDimensional,
}

impl FactoryKind {
    /// The factory `inst` calls, if it is one with the right argument count.
    pub fn of(func: &Function, inst: InstId) -> Option<FactoryKind> {
        let InstKind::Apply { callee, args } = func.kind(inst) else {
            return None;
        };
        match (callee.as_str(), args.len()) {
            (TENSOR_FROM_SCALARS, 2) => Some(FactoryKind::WithShape),
            (TENSOR_FROM_SCALARS_1D, 1) => Some(FactoryKind::OneDimensional),
            _ => None,
        }
    }

    fn argument_classes(self) -> (Vec<OperandEntry>, ShapePolicy) {
        match self {
            FactoryKind::WithShape => (
                vec![
                    OperandEntry::new(VALUE_LABEL, OperandClass::Tensor),
                    OperandEntry::new(VALUE_LABEL, OperandClass::Shape),
                ],
                ShapePolicy::Required,
            ),
            FactoryKind::OneDimensional => (
                vec![OperandEntry::new(VALUE_LABEL, OperandClass::Tensor)],
                ShapePolicy::Synthesized,
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FactoryOutcome {
    Rewritten(OperationDescriptor),
    /// Not a factory call, or not all arguments are constant.
    Unchanged,
    /// Constant arguments that disagree on the element count.
    Rejected(Diagnostic),
}

/// Lower one factory call.
pub fn lower_factory_call(func: &mut Function, inst: InstId, target: &TargetInfo) -> FactoryOutcome {
    let Some(kind) = FactoryKind::of(func, inst) else {
        return FactoryOutcome::Unchanged;
    };
    let args = func.kind(inst).operands();

    let (classes, policy) = kind.argument_classes();
    match check_operands(func, &args, &classes, policy, target) {
        Ok(()) => {}
        Err(err @ ValidationError::ShapeArity { .. }) => {
            let loc = user_source_location(func, inst);
            return FactoryOutcome::Rejected(err.into_diagnostic_at(func, loc));
        }
        Err(_) => return FactoryOutcome::Unchanged,
    }

    let Some((element_type, scalars)) = scalar_elements(func, args[0], target) else {
        return FactoryOutcome::Unchanged;
    };
    let shape = match kind {
        FactoryKind::WithShape => match scalar_elements(func, args[1], target) {
            Some(shape) => Some(shape),
            None => return FactoryOutcome::Unchanged,
        },
        FactoryKind::OneDimensional => None,
    };

    let mut out = OperandBuilder::new(CONST_OP);
    let marker = insert_marker(func, &element_type, inst);
    let count = scalars.len();
    out.push(marker, VALUE_LABEL, OperandClass::Tensor);
    for scalar in scalars {
        let scalar = materialize(func, scalar, inst);
        out.push(scalar, "", OperandClass::ArrayElement);
    }
    out.released.push(args[0]);

    match shape {
        Some((dim_type, dims)) => {
            let shape_marker = insert_marker(func, &dim_type, inst);
            out.push(shape_marker, VALUE_LABEL, OperandClass::Shape);
            for dim in dims {
                let dim = materialize(func, dim, inst);
                out.push(dim, "", OperandClass::ArrayElement);
            }
            out.released.push(args[1]);
        }
        None => {
            let loc = func.loc(inst).clone();
            let len = func.insert_before(
                inst,
                InstKind::IntegerLiteral {
                    value: count as i128,
                },
                Type::Int(64),
                loc,
            );
            out.push(marker, VALUE_LABEL, OperandClass::Shape);
            out.push(len, "", OperandClass::ArrayElement);
        }
    }
    out.push(marker, DTYPE_LABEL, OperandClass::DType);

    FactoryOutcome::Rewritten(out.replace(func, inst, target))
}

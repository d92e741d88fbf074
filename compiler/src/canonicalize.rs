// canonicalize.rs — Rewrite an operation so every attribute is a direct literal
//
// Inputs are replaced by their resolved scalar (or kept, if already device
// tensors). Scalar attributes are replaced by the literal defining them.
// Array attributes are expanded to a type marker followed by one `$elt`
// operand per element. The encoded name is regenerated to match.
//
// Preconditions: `desc` was decoded from `func` and validated.
// Postconditions: the returned descriptor decodes; canonicalizing it again
//   returns it unchanged.
// Failure modes: none for validated input. A rewritten instruction that
//   does not decode is an internal error and panics.
// Side effects: mutates `func`: inserts markers, cloned literals and
//   `release_value`s before the operation, replaces it, erases the original.

use crate::array_literal::try_decode_array_literal;
use crate::constant::{attr_operand, scalar_operand, AttrValue};
use crate::decode::{decode, OperationDescriptor};
use crate::dtype::TargetInfo;
use crate::id::InstId;
use crate::ir::{Function, InstKind, Type};
use crate::opclass::{EncodedName, OperandClass};

/// Outcome of canonicalizing one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonicalized {
    pub descriptor: OperationDescriptor,
    /// False when the operation was already canonical and left in place.
    pub changed: bool,
}

/// Operands and name under construction, plus the aggregates they replace.
pub(crate) struct OperandBuilder {
    pub(crate) name: EncodedName,
    pub(crate) operands: Vec<InstId>,
    pub(crate) released: Vec<InstId>,
}

impl OperandBuilder {
    pub(crate) fn new(op_name: &str) -> Self {
        Self {
            name: EncodedName::new(op_name),
            operands: Vec::new(),
            released: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, operand: InstId, label: &str, class: OperandClass) {
        self.operands.push(operand);
        self.name.push(label, class);
    }

    /// Splice the built operation in place of `old` and decode it.
    pub(crate) fn replace(
        self,
        func: &mut Function,
        old: InstId,
        target: &TargetInfo,
    ) -> OperationDescriptor {
        for aggregate in &self.released {
            let loc = func.loc(old).clone();
            func.insert_before(
                old,
                InstKind::ReleaseValue {
                    operand: *aggregate,
                },
                Type::unit(),
                loc,
            );
        }
        let ty = func.ty(old).clone();
        let loc = func.loc(old).clone();
        let new = func.insert_before(
            old,
            InstKind::Builtin {
                name: self.name.to_string(),
                operands: self.operands,
            },
            ty,
            loc,
        );
        func.replace_all_uses(old, new);
        func.erase(old);
        decode(func, new, target)
            .ok()
            .flatten()
            .expect("internal: rewritten operation does not decode")
    }
}

/// Bring a literal into the body. Literals of global static initializers are
/// cloned before `anchor`; body literals are used directly.
pub(crate) fn materialize(func: &mut Function, value: InstId, anchor: InstId) -> InstId {
    if func.is_attached(value) {
        value
    } else {
        func.clone_before(value, anchor)
    }
}

/// Insert a type marker for `ty` before `anchor`.
pub(crate) fn insert_marker(func: &mut Function, ty: &Type, anchor: InstId) -> InstId {
    let loc = func.loc(anchor).clone();
    func.insert_before(
        anchor,
        InstKind::Metatype,
        Type::Metatype(Box::new(ty.clone())),
        loc,
    )
}

/// The literal instructions defining each element of an array attribute, or
/// `None` if an element is not a scalar constant.
pub(crate) fn scalar_elements(
    func: &Function,
    array: InstId,
    target: &TargetInfo,
) -> Option<(Type, Vec<InstId>)> {
    let literal = try_decode_array_literal(func, array)?;
    let mut elements = Vec::with_capacity(literal.elements.len());
    for elt in literal.elements {
        match attr_operand(func, elt, target)? {
            AttrValue::Array(_) => return None,
            value => elements.push(value.inst()),
        }
    }
    Some((literal.element_type, elements))
}

/// Rewrite `desc` into canonical form.
pub fn canonicalize(
    func: &mut Function,
    desc: &OperationDescriptor,
    target: &TargetInfo,
) -> Canonicalized {
    let inst = desc.inst;
    let original = desc.operands(func);
    let mut out = OperandBuilder::new(&desc.op_name);

    for (entry, &operand) in desc.operand_classes.iter().zip(&original) {
        let label = entry.label.as_str();
        if entry.class.is_input() {
            let resolved = if func.ty(operand).is_tensor_handle() {
                operand
            } else {
                scalar_operand(func, operand).unwrap_or(operand)
            };
            out.push(resolved, label, entry.class);
            continue;
        }

        match attr_operand(func, operand, target) {
            Some(AttrValue::Array(array)) => match scalar_elements(func, array, target) {
                Some((element_type, elements)) => {
                    let marker = insert_marker(func, &element_type, inst);
                    let class = match entry.class {
                        OperandClass::Normal => OperandClass::Array,
                        other => other,
                    };
                    out.push(marker, label, class);
                    for elt in elements {
                        let elt = materialize(func, elt, inst);
                        out.push(elt, "", OperandClass::ArrayElement);
                    }
                    out.released.push(array);
                }
                None => out.push(operand, label, entry.class),
            },
            Some(value) => {
                let literal = materialize(func, value.inst(), inst);
                out.push(literal, label, entry.class);
            }
            None => out.push(operand, label, entry.class),
        }
    }

    if out.name.to_string() == desc.builtin_name && out.operands == original {
        return Canonicalized {
            descriptor: desc.clone(),
            changed: false,
        };
    }

    Canonicalized {
        descriptor: out.replace(func, inst, target),
        changed: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{parse_module, BuildResult};

    fn build(source: &str) -> BuildResult {
        let result = parse_module("t.tfir", source);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        result
    }

    fn canonicalize_named(source: &str, value: &str) -> (Function, Canonicalized) {
        let result = build(source);
        let mut func = result.module.functions[0].clone();
        let target = TargetInfo::default();
        let desc = decode(&func, result.value_names[0][value], &target)
            .expect("decodes")
            .expect("operation");
        let out = canonicalize(&mut func, &desc, &target);
        (func, out)
    }

    #[test]
    fn already_canonical_is_left_in_place() {
        let source = r#"
            func @f {
              %a = argument 0 : TensorHandle<Float>
              %x = integer_literal 1 : Builtin.Int64
              %r = builtin "__tfop_Op,$in,axis" (%a, %x) : TensorHandle<Float>
            }
        "#;
        let (func, out) = canonicalize_named(source, "r");
        assert!(!out.changed);
        assert_eq!(func.body().len(), 3);
    }

    #[test]
    fn scalar_wrappers_are_stripped() {
        let source = r#"
            func @f {
              %x = integer_literal 1 : Builtin.Int64
              %i = struct (%x) : Int
              %y = float_literal 2.0 : Builtin.FPIEEE32
              %s = struct (%y) : Float
              %r = builtin "__tfop_Op,$in,axis" (%s, %i) : TensorHandle<Float>
              return (%r)
            }
        "#;
        let (func, out) = canonicalize_named(source, "r");
        assert!(out.changed);
        let new = out.descriptor.inst;
        let ops = func.kind(new).operands();
        assert!(matches!(func.kind(ops[0]), InstKind::FloatLiteral { .. }));
        assert!(matches!(func.kind(ops[1]), InstKind::IntegerLiteral { value: 1 }));
        let ret = *func.body().last().expect("return");
        assert_eq!(func.kind(ret), &InstKind::Return { operand: Some(new) });
    }

    #[test]
    fn normal_array_becomes_array_class() {
        let source = r#"
            global @lits {
              %0 = integer_literal 1 : Builtin.Int64
              %1 = integer_literal 2 : Builtin.Int64
              %2 = object (%0, %1) : _ContiguousArrayStorage<Int32>
            }
            func @f {
              %a = argument 0 : TensorHandle<Float>
              %g = global_value @lits : _ContiguousArrayStorage<Int32>
              %arr = struct (%g) : Array<Int32>
              %r = builtin "__tfop_Conv,$in,strides" (%a, %arr) : TensorHandle<Float>
            }
        "#;
        let (func, out) = canonicalize_named(source, "r");
        assert_eq!(out.descriptor.builtin_name, "__tfop_Conv,$in,strides$array,$elt,$elt");
        let ops = func.kind(out.descriptor.inst).operands();
        assert_eq!(
            func.ty(ops[1]),
            &Type::Metatype(Box::new(Type::nominal("Int32")))
        );
        // Global literals are cloned into the body.
        assert!(func.is_attached(ops[2]));
        assert!(func.is_attached(ops[3]));
        // The dropped aggregate is released.
        let array_ty = Type::array(Type::nominal("Int32"));
        assert!(func.body().iter().any(|&i| matches!(
            func.kind(i),
            InstKind::ReleaseValue { operand } if func.ty(*operand) == &array_ty
        )));
    }

    #[test]
    fn empty_array_stays_distinguishable() {
        let source = r#"
            global @_swiftEmptyArrayStorage
            func @f {
              %a = argument 0 : TensorHandle<Float>
              %g = global_addr @_swiftEmptyArrayStorage : *_SwiftEmptyArrayStorage
              %p = address_to_pointer %g : Builtin.RawPointer
              %e = raw_pointer_to_ref %p : _EmptyArrayStorage
              %arr = struct (%e) : Array<Int32>
              %r = builtin "__tfop_Op,$in,dims" (%a, %arr) : TensorHandle<Float>
            }
        "#;
        let (_, out) = canonicalize_named(source, "r");
        assert_eq!(out.descriptor.builtin_name, "__tfop_Op,$in,dims$array");
    }

    #[test]
    fn second_canonicalization_is_a_no_op() {
        let source = r#"
            global @lits {
              %0 = float_literal 1.0 : Builtin.FPIEEE32
              %1 = float_literal 2.0 : Builtin.FPIEEE32
              %2 = object (%0, %1) : _ContiguousArrayStorage<Float>
            }
            func @f {
              %g = global_value @lits : _ContiguousArrayStorage<Float>
              %arr = struct (%g) : Array<Float>
              %r = builtin "__tfop_Op,vals" (%arr) : TensorHandle<Float>
            }
        "#;
        let (mut func, first) = canonicalize_named(source, "r");
        assert!(first.changed);
        let printed = func.to_string();
        let second = canonicalize(&mut func, &first.descriptor, &TargetInfo::default());
        assert!(!second.changed);
        assert_eq!(second.descriptor, first.descriptor);
        assert_eq!(func.to_string(), printed);
    }
}

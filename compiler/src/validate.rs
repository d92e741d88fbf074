// validate.rs — Check that attribute operands are constants of the right shape
//
// Operands are walked per operand, inputs included, in groups: an attribute
// head followed by its `$elt` continuation operands. Both the inline form
// (an attribute is an array literal) and the canonical form (a type marker
// followed by elements) are accepted.
//
// Preconditions: `operands` and `classes` are parallel (decode guarantees it).
// Postconditions: `Ok(())` ⇒ every attribute resolves; every tensor paired
//   with a shape has exactly as many scalars as the shape's element product.
// Failure modes: the first violation, as a `ValidationError`.
// Side effects: none.

use std::fmt;

use crate::array_literal::try_decode_array_literal;
use crate::constant::{attr_operand, AttrValue};
use crate::decode::OperationDescriptor;
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::dtype::TargetInfo;
use crate::id::InstId;
use crate::ir::{Function, InstKind, SourceLoc};
use crate::location::user_source_location;
use crate::opclass::{OperandClass, OperandEntry};

/// Whether an inline tensor literal must be followed by its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapePolicy {
    Required,
    /// The shape is synthesized later (1-D factory calls).
    Synthesized,
}

/// What kind of constant an attribute needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Constant,
    IntegerOrType,
    Number,
    ArrayOfConstants,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Expectation::Constant => "a constant argument",
            Expectation::IntegerOrType => "a constant integer or type",
            Expectation::Number => "a constant integer or floating point constant",
            Expectation::ArrayOfConstants => "an array of constant values",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    ConstantRequired {
        operand: InstId,
        label: String,
        expected: Expectation,
    },
    MissingShape {
        operand: InstId,
        label: String,
    },
    InvalidShape {
        operand: InstId,
        label: String,
    },
    NonConstantShape {
        operand: InstId,
        label: String,
    },
    ShapeArity {
        operand: InstId,
        /// The shape attribute the count was checked against.
        shape: InstId,
        expected: i128,
        actual: usize,
    },
}

impl ValidationError {
    pub fn operand(&self) -> InstId {
        match self {
            ValidationError::ConstantRequired { operand, .. }
            | ValidationError::MissingShape { operand, .. }
            | ValidationError::InvalidShape { operand, .. }
            | ValidationError::NonConstantShape { operand, .. }
            | ValidationError::ShapeArity { operand, .. } => *operand,
        }
    }

    pub fn code(&self) -> DiagCode {
        match self {
            ValidationError::ConstantRequired { .. } => codes::E0200,
            ValidationError::ShapeArity { .. } => codes::E0201,
            ValidationError::MissingShape { .. }
            | ValidationError::InvalidShape { .. }
            | ValidationError::NonConstantShape { .. } => codes::E0202,
        }
    }

    /// Report at the operand's user location, falling back to the operation's.
    pub fn into_diagnostic(self, func: &Function, inst: InstId) -> Diagnostic {
        let loc = user_source_location(func, self.operand())
            .or_else(|| user_source_location(func, inst));
        self.into_diagnostic_at(func, loc)
    }

    /// Report at `loc`, with a hint and the shape's location where they apply.
    pub fn into_diagnostic_at(self, func: &Function, loc: Option<SourceLoc>) -> Diagnostic {
        let mut diag = Diagnostic::error(loc.clone(), self.to_string()).with_code(self.code());
        match &self {
            ValidationError::ShapeArity { shape, .. } => {
                diag = diag.with_hint("the shape's dimensions must multiply to the number of scalars");
                if let Some(shape_loc) = user_source_location(func, *shape) {
                    if Some(&shape_loc) != loc.as_ref() {
                        diag = diag.with_related(shape_loc, "shape given here");
                    }
                }
            }
            ValidationError::MissingShape { label, .. } => {
                diag = diag.with_hint(format!("follow it with a '{}$shape' attribute", label));
            }
            _ => {}
        }
        diag
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::ConstantRequired {
                label, expected, ..
            } => write!(f, "attribute '{}' requires {}", label, expected),
            ValidationError::MissingShape { label, .. } => {
                write!(f, "tensor array attribute '{}' must be followed by a shape", label)
            }
            ValidationError::InvalidShape { label, .. } => {
                write!(f, "attribute '{}' has invalid shape", label)
            }
            ValidationError::NonConstantShape { label, .. } => {
                write!(f, "attribute '{}' has non-constant shape", label)
            }
            ValidationError::ShapeArity {
                expected, actual, ..
            } => write!(
                f,
                "tensor literal should have {} scalars for this shape, but has {}",
                expected, actual
            ),
        }
    }
}

/// Validate every attribute operand of a decoded operation.
pub fn validate(
    func: &Function,
    desc: &OperationDescriptor,
    policy: ShapePolicy,
    target: &TargetInfo,
) -> Result<(), ValidationError> {
    check_operands(func, &desc.operands(func), &desc.operand_classes, policy, target)
}

/// An attribute head and the values it carries.
struct Group<'a> {
    operand: InstId,
    entry: &'a OperandEntry,
    /// Index of the first operand after the group.
    end: usize,
    /// Element count for tensors and arrays; `None` for scalars.
    count: Option<usize>,
    /// Dimension values, for shapes.
    dims: Vec<i128>,
}

/// Validate parallel operand and class lists.
pub fn check_operands(
    func: &Function,
    operands: &[InstId],
    classes: &[OperandEntry],
    policy: ShapePolicy,
    target: &TargetInfo,
) -> Result<(), ValidationError> {
    let mut i = 0;
    let mut pending_tensor: Option<Group<'_>> = None;
    while i < operands.len() {
        let entry = &classes[i];
        match entry.class {
            OperandClass::Input | OperandClass::InputElement => {
                i += 1;
                continue;
            }
            OperandClass::ArrayElement => {
                // A continuation with no head before it.
                require_number(func, operands[i], &entry.label, target)?;
                i += 1;
                continue;
            }
            _ => {}
        }

        let group = check_group(func, operands, classes, i, target)?;
        i = group.end;

        if let Some(tensor) = pending_tensor.take() {
            if group.entry.class == OperandClass::Shape && group.entry.label == tensor.entry.label
            {
                check_shape_arity(&tensor, &group)?;
                continue;
            }
        }
        if group.entry.class == OperandClass::Tensor && group.count.is_some() {
            let inline = is_inline(func, group.operand, target);
            let followed_by_shape = classes
                .get(group.end)
                .is_some_and(|next| next.class == OperandClass::Shape && next.label == group.entry.label);
            if inline && !followed_by_shape && policy == ShapePolicy::Required {
                return Err(ValidationError::MissingShape {
                    operand: group.operand,
                    label: group.entry.label.clone(),
                });
            }
            pending_tensor = Some(group);
        }
    }
    Ok(())
}

fn is_inline(func: &Function, operand: InstId, target: &TargetInfo) -> bool {
    matches!(attr_operand(func, operand, target), Some(AttrValue::Array(_)))
}

fn check_shape_arity(tensor: &Group<'_>, shape: &Group<'_>) -> Result<(), ValidationError> {
    let actual = tensor.count.unwrap_or(1);
    let expected = shape
        .dims
        .iter()
        .try_fold(1i128, |acc, d| acc.checked_mul(*d))
        .ok_or_else(|| ValidationError::InvalidShape {
            operand: shape.operand,
            label: shape.entry.label.clone(),
        })?;
    if expected != actual as i128 {
        return Err(ValidationError::ShapeArity {
            operand: tensor.operand,
            shape: shape.operand,
            expected,
            actual,
        });
    }
    Ok(())
}

/// A canonical array head: any type marker, representable or not.
fn is_marker(func: &Function, operand: InstId) -> bool {
    matches!(func.kind(operand), InstKind::Metatype)
}

fn check_group<'a>(
    func: &Function,
    operands: &[InstId],
    classes: &'a [OperandEntry],
    start: usize,
    target: &TargetInfo,
) -> Result<Group<'a>, ValidationError> {
    let entry = &classes[start];
    let operand = operands[start];
    let label = entry.label.as_str();
    let mut end = start + 1;
    while classes
        .get(end)
        .is_some_and(|e| e.class == OperandClass::ArrayElement)
    {
        end += 1;
    }
    let elts = &operands[start + 1..end];

    let constant_required = |expected| ValidationError::ConstantRequired {
        operand,
        label: label.to_string(),
        expected,
    };
    let mut group = Group {
        operand,
        entry,
        end,
        count: None,
        dims: Vec::new(),
    };

    match entry.class {
        OperandClass::Normal => {
            attr_operand(func, operand, target)
                .or_else(|| is_marker(func, operand).then_some(AttrValue::TypeMarker(operand)))
                .ok_or_else(|| constant_required(Expectation::Constant))?;
            for &elt in elts {
                require_constant(func, elt, label, target)?;
            }
        }
        OperandClass::DType => match attr_operand(func, operand, target) {
            Some(AttrValue::Integer(_) | AttrValue::TypeMarker(_)) => {}
            _ => return Err(constant_required(Expectation::IntegerOrType)),
        },
        OperandClass::Array => {
            if is_marker(func, operand) {
                for &elt in elts {
                    require_constant(func, elt, label, target)?;
                }
                group.count = Some(elts.len());
            } else {
                match attr_operand(func, operand, target) {
                    Some(AttrValue::Array(_)) => {
                        group.count = inline_elements(func, operand).map(|e| e.len());
                    }
                    _ => return Err(constant_required(Expectation::ArrayOfConstants)),
                }
            }
        }
        OperandClass::Shape => {
            let shape_invalid = || ValidationError::InvalidShape {
                operand,
                label: label.to_string(),
            };
            let dim_values: Vec<InstId> = if is_marker(func, operand) {
                elts.to_vec()
            } else {
                match attr_operand(func, operand, target) {
                    Some(AttrValue::Array(_)) => inline_elements(func, operand).unwrap_or_default(),
                    Some(_) => return Err(shape_invalid()),
                    None => {
                        return Err(ValidationError::NonConstantShape {
                            operand,
                            label: label.to_string(),
                        })
                    }
                }
            };
            for dim in dim_values {
                match attr_operand(func, dim, target) {
                    Some(AttrValue::Integer(lit)) => group.dims.push(integer_value(func, lit)),
                    _ => return Err(shape_invalid()),
                }
            }
        }
        OperandClass::Tensor => {
            if is_marker(func, operand) {
                for &elt in elts {
                    require_number(func, elt, label, target)?;
                }
                group.count = Some(elts.len());
            } else {
                match attr_operand(func, operand, target) {
                    Some(AttrValue::Integer(_) | AttrValue::Float(_)) => {}
                    Some(AttrValue::Array(_)) => {
                        let elements = inline_elements(func, operand).unwrap_or_default();
                        for &elt in &elements {
                            require_number(func, elt, label, target)?;
                        }
                        group.count = Some(elements.len());
                    }
                    _ => return Err(constant_required(Expectation::Constant)),
                }
            }
        }
        OperandClass::Input | OperandClass::InputElement | OperandClass::ArrayElement => {}
    }
    Ok(group)
}

fn inline_elements(func: &Function, operand: InstId) -> Option<Vec<InstId>> {
    try_decode_array_literal(func, operand).map(|a| a.elements)
}

fn integer_value(func: &Function, lit: InstId) -> i128 {
    match func.kind(lit) {
        InstKind::IntegerLiteral { value } => *value,
        _ => 0,
    }
}

fn require_number(
    func: &Function,
    operand: InstId,
    label: &str,
    target: &TargetInfo,
) -> Result<(), ValidationError> {
    match attr_operand(func, operand, target) {
        Some(value) if value.is_numeric() => Ok(()),
        _ => Err(ValidationError::ConstantRequired {
            operand,
            label: label.to_string(),
            expected: Expectation::Number,
        }),
    }
}

fn require_constant(
    func: &Function,
    operand: InstId,
    label: &str,
    target: &TargetInfo,
) -> Result<(), ValidationError> {
    attr_operand(func, operand, target)
        .map(|_| ())
        .ok_or_else(|| ValidationError::ConstantRequired {
            operand,
            label: label.to_string(),
            expected: Expectation::Constant,
        })
}

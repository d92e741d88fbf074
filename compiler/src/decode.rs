// decode.rs — Recognize an instruction as an encoded tensor operation
//
// Builds a transient `OperationDescriptor` from a builtin call whose name
// follows the operation grammar. Descriptors are never mutated: a rewrite
// erases the old instruction and decodes the new one.
//
// Preconditions: `func` is well-formed.
// Postconditions: `Ok(Some(d))` ⇒ `d.operand_classes.len()` equals the
//   builtin's operand count and every input operand is a device tensor or a
//   representable scalar.
// Failure modes: a prefixed name that is malformed, has the wrong arity, or
//   feeds an unusable input returns `DecodeError`. A name without the prefix
//   is `Ok(None)`.
// Side effects: none.

use std::fmt;

use crate::constant::scalar_operand;
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::dtype::TargetInfo;
use crate::id::InstId;
use crate::ir::{Function, InstKind, Type};
use crate::location::user_source_location;
use crate::opclass::{EncodedName, NameError, OperandClass, OperandEntry};

/// A recognized tensor operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    /// The builtin instruction carrying the operation.
    pub inst: InstId,
    pub builtin_name: String,
    pub op_name: String,
    /// One entry per operand, in operand order.
    pub operand_classes: Vec<OperandEntry>,
}

impl OperationDescriptor {
    /// The builtin's operands, parallel to `operand_classes`.
    pub fn operands(&self, func: &Function) -> Vec<InstId> {
        func.kind(self.inst).operands()
    }

    /// The operation name regenerated from the classification.
    pub fn encoded_name(&self) -> String {
        EncodedName {
            op_name: self.op_name.clone(),
            operands: self.operand_classes.clone(),
        }
        .to_string()
    }

    pub fn classes(&self) -> Vec<OperandClass> {
        self.operand_classes.iter().map(|e| e.class).collect()
    }
}

/// A builtin that was clearly meant as an operation but is ill-formed.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    MalformedName {
        inst: InstId,
        name: String,
        error: NameError,
    },
    ArityMismatch {
        inst: InstId,
        op_name: String,
        expected: usize,
        actual: usize,
    },
    UnrecognizedOperandType {
        inst: InstId,
        operand: InstId,
        ty: Type,
    },
}

impl DecodeError {
    pub fn inst(&self) -> InstId {
        match self {
            DecodeError::MalformedName { inst, .. }
            | DecodeError::ArityMismatch { inst, .. }
            | DecodeError::UnrecognizedOperandType { inst, .. } => *inst,
        }
    }

    pub fn code(&self) -> DiagCode {
        match self {
            DecodeError::MalformedName { .. } => codes::E0100,
            DecodeError::ArityMismatch { .. } => codes::E0101,
            DecodeError::UnrecognizedOperandType { .. } => codes::E0102,
        }
    }

    /// Report at the best user location. Operand type errors point at the
    /// operand when it has a location of its own.
    pub fn into_diagnostic(self, func: &Function) -> Diagnostic {
        let loc = match &self {
            DecodeError::UnrecognizedOperandType { inst, operand, .. } => {
                user_source_location(func, *operand)
                    .or_else(|| user_source_location(func, *inst))
            }
            _ => user_source_location(func, self.inst()),
        };
        Diagnostic::error(loc, self.to_string()).with_code(self.code())
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MalformedName { name, error, .. } => {
                write!(f, "{} in operation name '{}'", error, name)
            }
            DecodeError::ArityMismatch {
                op_name,
                expected,
                actual,
                ..
            } => write!(
                f,
                "operation '{}' names {} operands but is applied to {}",
                op_name, expected, actual
            ),
            DecodeError::UnrecognizedOperandType { ty, .. } => {
                write!(f, "operand has unrecognized type '{}'", ty)
            }
        }
    }
}

/// Decode `inst` as a tensor operation.
///
/// A `tuple_extract` of a builtin decodes as that builtin, so every result
/// of a multi-output operation maps back to the one operation.
pub fn decode(
    func: &Function,
    inst: InstId,
    target: &TargetInfo,
) -> Result<Option<OperationDescriptor>, DecodeError> {
    let (name, operands) = match func.kind(inst) {
        InstKind::Builtin { name, operands } => (name, operands),
        InstKind::TupleExtract { operand, .. } => {
            return match func.kind(*operand) {
                InstKind::Builtin { .. } => decode(func, *operand, target),
                _ => Ok(None),
            };
        }
        _ => return Ok(None),
    };

    let Some(parsed) = EncodedName::parse(name) else {
        return Ok(None);
    };
    let encoded = parsed.map_err(|error| DecodeError::MalformedName {
        inst,
        name: name.clone(),
        error,
    })?;

    if encoded.operands.len() != operands.len() {
        return Err(DecodeError::ArityMismatch {
            inst,
            op_name: encoded.op_name,
            expected: encoded.operands.len(),
            actual: operands.len(),
        });
    }

    for (entry, &operand) in encoded.operands.iter().zip(operands) {
        if entry.class.is_input() && !is_input_value(func, operand, target) {
            return Err(DecodeError::UnrecognizedOperandType {
                inst,
                operand,
                ty: func.ty(operand).clone(),
            });
        }
    }

    Ok(Some(OperationDescriptor {
        inst,
        builtin_name: name.clone(),
        op_name: encoded.op_name,
        operand_classes: encoded.operands,
    }))
}

/// A device tensor, or something that resolves to a representable scalar.
pub fn is_input_value(func: &Function, value: InstId, target: &TargetInfo) -> bool {
    if func.ty(value).is_tensor_handle() {
        return true;
    }
    scalar_operand(func, value).is_some_and(|s| target.is_representable(func.ty(s)))
}

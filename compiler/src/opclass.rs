// opclass.rs — Operand classes and the encoded operation-name grammar
//
// Tensor operations are smuggled through the IR as builtin calls whose name
// encodes the operation and the role of every operand:
//
//     __tfop_<opName>(,<label>[$<suffix>])*
//
// `EncodedName` is the parsed form; its `Display` is the serializer. The two
// are exact inverses: a name parsed and printed again is byte-identical.
//
// Preconditions: none.
// Postconditions: `parse` returns `None` for names without the prefix and an
//   error only for a recognized prefix with a malformed class suffix.
// Failure modes: unknown suffix → `NameError::UnknownSuffix`.
// Side effects: none.

use std::fmt;

use serde::Serialize;

/// Prefix marking a builtin as an encoded tensor operation.
pub const OP_PREFIX: &str = "__tfop_";

/// The role an operand plays in the target operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperandClass {
    /// A runtime dataflow input.
    Input,
    /// An element of an input list.
    InputElement,
    /// An attribute with no modifier.
    Normal,
    /// An integer (or type marker) naming a data type.
    DType,
    /// A scalar or array to be baked into a constant tensor.
    Tensor,
    /// A shape: a type marker followed by its dimensions.
    Shape,
    /// An array attribute: a type marker followed by its elements.
    Array,
    /// A continuation element of a preceding tensor, shape or array.
    ArrayElement,
}

impl OperandClass {
    pub const ALL: [OperandClass; 8] = [
        OperandClass::Input,
        OperandClass::InputElement,
        OperandClass::Normal,
        OperandClass::DType,
        OperandClass::Tensor,
        OperandClass::Shape,
        OperandClass::Array,
        OperandClass::ArrayElement,
    ];

    /// The name suffix for this class, including the `$`.
    pub fn suffix(self) -> &'static str {
        match self {
            OperandClass::Input => "$in",
            OperandClass::InputElement => "$inelt",
            OperandClass::Normal => "",
            OperandClass::DType => "$dtype",
            OperandClass::Tensor => "$tensor",
            OperandClass::Shape => "$shape",
            OperandClass::Array => "$array",
            OperandClass::ArrayElement => "$elt",
        }
    }

    /// Parse the text after `$`.
    pub fn from_suffix(suffix: &str) -> Option<OperandClass> {
        match suffix {
            "in" => Some(OperandClass::Input),
            "inelt" => Some(OperandClass::InputElement),
            "dtype" => Some(OperandClass::DType),
            "tensor" => Some(OperandClass::Tensor),
            "shape" => Some(OperandClass::Shape),
            "array" => Some(OperandClass::Array),
            "elt" => Some(OperandClass::ArrayElement),
            _ => None,
        }
    }

    /// Inputs are runtime values; everything else is a compile-time attribute.
    pub fn is_input(self) -> bool {
        matches!(self, OperandClass::Input | OperandClass::InputElement)
    }
}

/// One classified operand slot: `<label><suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperandEntry {
    pub label: String,
    pub class: OperandClass,
}

impl OperandEntry {
    pub fn new(label: impl Into<String>, class: OperandClass) -> Self {
        Self {
            label: label.into(),
            class,
        }
    }
}

/// A name that failed to parse despite carrying the operation prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    UnknownSuffix { label: String, suffix: String },
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::UnknownSuffix { suffix, .. } => {
                write!(f, "invalid operand class suffix '{}'", suffix)
            }
        }
    }
}

/// A parsed operation name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedName {
    pub op_name: String,
    pub operands: Vec<OperandEntry>,
}

impl EncodedName {
    pub fn new(op_name: impl Into<String>) -> Self {
        Self {
            op_name: op_name.into(),
            operands: Vec::new(),
        }
    }

    pub fn push(&mut self, label: impl Into<String>, class: OperandClass) {
        self.operands.push(OperandEntry::new(label, class));
    }

    /// Parse a builtin name. `None` means the name is not an operation.
    pub fn parse(name: &str) -> Option<Result<EncodedName, NameError>> {
        let rest = name.strip_prefix(OP_PREFIX)?;
        let mut tokens = rest.split(',');
        let op_name = tokens.next().unwrap_or_default();
        let mut encoded = EncodedName::new(op_name);
        for token in tokens {
            match parse_operand_token(token) {
                Ok(entry) => encoded.operands.push(entry),
                Err(e) => return Some(Err(e)),
            }
        }
        Some(Ok(encoded))
    }
}

fn parse_operand_token(token: &str) -> Result<OperandEntry, NameError> {
    let Some((label, suffix)) = token.split_once('$') else {
        return Ok(OperandEntry::new(token, OperandClass::Normal));
    };
    match OperandClass::from_suffix(suffix) {
        Some(class) => Ok(OperandEntry::new(label, class)),
        None => Err(NameError::UnknownSuffix {
            label: label.to_string(),
            suffix: suffix.to_string(),
        }),
    }
}

impl fmt::Display for EncodedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", OP_PREFIX, self.op_name)?;
        for entry in &self.operands {
            write!(f, ",{}{}", entry.label, entry.class.suffix())?;
        }
        Ok(())
    }
}

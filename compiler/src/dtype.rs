// dtype.rs — Target data types and the IR-type mapping onto them
//
// Data-type codes follow the TensorFlow `TF_DataType` numbering so the
// downstream graph serializer can use them directly.
//
// Preconditions: none.
// Postconditions: `TargetInfo::dtype_of` is total; unrepresentable types map
//   to `None`.
// Failure modes: none.
// Side effects: none.

use serde::Serialize;

use crate::ir::Type;

/// A data type the target graph runtime can hold in a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DType {
    Float,
    Double,
    Int32,
    UInt8,
    Int16,
    Int8,
    Int64,
    Bool,
    UInt16,
    Half,
    UInt32,
    UInt64,
}

impl DType {
    /// The runtime's numeric code for this data type.
    pub fn code(self) -> u32 {
        match self {
            DType::Float => 1,
            DType::Double => 2,
            DType::Int32 => 3,
            DType::UInt8 => 4,
            DType::Int16 => 5,
            DType::Int8 => 6,
            DType::Int64 => 9,
            DType::Bool => 10,
            DType::UInt16 => 17,
            DType::Half => 19,
            DType::UInt32 => 22,
            DType::UInt64 => 23,
        }
    }
}

/// Properties of the compilation target that affect type mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    /// Width of `Int`, `UInt` and `Builtin.Word`, in bits (32 or 64).
    pub pointer_width: u32,
}

impl Default for TargetInfo {
    fn default() -> Self {
        Self { pointer_width: 64 }
    }
}

impl TargetInfo {
    fn is_64bit(&self) -> bool {
        self.pointer_width == 64
    }

    /// Map an IR type to the target data type it denotes, if any.
    ///
    /// Library scalar types map by name; builtin integers carry no sign and
    /// map to the signed type of the same width.
    pub fn dtype_of(&self, ty: &Type) -> Option<DType> {
        match ty {
            Type::Nominal { name, args } if args.is_empty() => match name.as_str() {
                "Bool" => Some(DType::Bool),
                "Int8" => Some(DType::Int8),
                "UInt8" => Some(DType::UInt8),
                "Int16" => Some(DType::Int16),
                "UInt16" => Some(DType::UInt16),
                "Int32" => Some(DType::Int32),
                "UInt32" => Some(DType::UInt32),
                "Int64" => Some(DType::Int64),
                "UInt64" => Some(DType::UInt64),
                "Float" => Some(DType::Float),
                "Double" => Some(DType::Double),
                "Int" if self.is_64bit() => Some(DType::Int64),
                "Int" => Some(DType::Int32),
                "UInt" if self.is_64bit() => Some(DType::UInt64),
                "UInt" => Some(DType::UInt32),
                _ => None,
            },
            Type::Word if self.is_64bit() => Some(DType::Int64),
            Type::Word => Some(DType::Int32),
            Type::Int(1) => Some(DType::Bool),
            Type::Int(8) => Some(DType::Int8),
            Type::Int(16) => Some(DType::Int16),
            Type::Int(32) => Some(DType::Int32),
            Type::Int(64) => Some(DType::Int64),
            Type::Float(16) => Some(DType::Half),
            Type::Float(32) => Some(DType::Float),
            Type::Float(64) => Some(DType::Double),
            _ => None,
        }
    }

    pub fn is_representable(&self, ty: &Type) -> bool {
        self.dtype_of(ty).is_some()
    }
}

// constant.rs — Resolve operands to the literal instructions defining them
//
// A closed-set matcher: only the wrapper and indirection shapes listed here
// are looked through. Anything else is unresolved, never approximated.
//
// Preconditions: `func` is well-formed (operands defined before use).
// Postconditions: a resolved `AttrValue` names a literal, a type marker, or
//   an array literal whose elements all resolve.
// Failure modes: none; unresolvable operands yield `None`. This module never
//   creates diagnostics.
// Side effects: none.

use serde::Serialize;

use crate::array_literal::try_decode_array_literal;
use crate::dtype::{DType, TargetInfo};
use crate::id::InstId;
use crate::ir::{CastKind, Function, InstKind, StringEncoding, Type};

/// Builtins that bridge a string's storage without changing it. Only the
/// first operand carries the string.
const BRIDGE_BUILTINS: &[&str] = &["and", "or", "zextOrBitCast", "ptrtoint"];

/// What an attribute operand resolved to. Each variant names the defining
/// instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrValue {
    Integer(InstId),
    Float(InstId),
    String(InstId),
    TypeMarker(InstId),
    /// An array literal rooted at this value.
    Array(InstId),
}

impl AttrValue {
    pub fn inst(self) -> InstId {
        match self {
            AttrValue::Integer(id)
            | AttrValue::Float(id)
            | AttrValue::String(id)
            | AttrValue::TypeMarker(id)
            | AttrValue::Array(id) => id,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, AttrValue::Integer(_) | AttrValue::Float(_))
    }
}

/// A constant as handed to the graph serializer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstantValue {
    Integer { value: i128, bits: u32 },
    Float { value: f64, bits: u32 },
    String { value: String },
    TypeMarker { ty: String, dtype: Option<DType> },
}

/// Look through a scalar wrapper, or through a stack slot with exactly one
/// store, to the value that defines `value`.
pub fn scalar_operand(func: &Function, value: InstId) -> Option<InstId> {
    if !func.ty(value).is_address() {
        let mut v = value;
        while let InstKind::Struct { operands } = func.kind(v) {
            match operands.as_slice() {
                [inner] => v = *inner,
                _ => break,
            }
        }
        return Some(v);
    }

    match func.kind(value) {
        InstKind::AllocStack => {
            let stores: Vec<InstId> = func
                .users(value)
                .into_iter()
                .filter(|&u| matches!(func.kind(u), InstKind::Store { dest, .. } if *dest == value))
                .collect();
            let [store] = stores.as_slice() else {
                return None;
            };
            let InstKind::Store { src, .. } = func.kind(*store) else {
                return None;
            };
            scalar_operand(func, *src)
        }
        _ => None,
    }
}

/// Resolve an attribute operand to a constant.
pub fn attr_operand(func: &Function, value: InstId, target: &TargetInfo) -> Option<AttrValue> {
    if func.ty(value).is_string() {
        return string_literal(func, value).map(AttrValue::String);
    }

    if let Some(array) = try_decode_array_literal(func, value) {
        for elt in &array.elements {
            if let AttrValue::Array(_) = attr_operand(func, *elt, target)? {
                return None;
            }
        }
        return Some(AttrValue::Array(value));
    }

    let scalar = scalar_operand(func, value)?;
    literal(func, scalar, target)
}

/// Classify a literal-producing instruction.
pub fn literal(func: &Function, inst: InstId, target: &TargetInfo) -> Option<AttrValue> {
    match func.kind(inst) {
        InstKind::IntegerLiteral { .. } => match func.ty(inst) {
            Type::Int(bits) if *bits <= 64 => Some(AttrValue::Integer(inst)),
            Type::Word => Some(AttrValue::Integer(inst)),
            _ => None,
        },
        InstKind::FloatLiteral { .. } => Some(AttrValue::Float(inst)),
        InstKind::StringLiteral {
            encoding: StringEncoding::Utf8,
            ..
        } => Some(AttrValue::String(inst)),
        InstKind::Metatype => {
            let marked = func.ty(inst).metatype_instance()?;
            target
                .is_representable(marked)
                .then_some(AttrValue::TypeMarker(inst))
        }
        _ => None,
    }
}

/// Peel string bridging down to a UTF-8 literal, stopping at the first
/// unrecognized instruction.
fn string_literal(func: &Function, value: InstId) -> Option<InstId> {
    let mut v = value;
    loop {
        v = match func.kind(v) {
            InstKind::StringLiteral {
                encoding: StringEncoding::Utf8,
                ..
            } => return Some(v),
            InstKind::Struct { operands } => *operands.first()?,
            InstKind::Enum {
                payload: Some(payload),
                ..
            } => *payload,
            InstKind::Cast {
                kind: CastKind::UncheckedBitwise,
                operand,
            } => *operand,
            InstKind::Builtin { name, operands } if is_bridge_builtin(name) => *operands.first()?,
            _ => return None,
        };
    }
}

/// `and_Int64`, `zextOrBitCast_Int1_Int64` and so on.
fn is_bridge_builtin(name: &str) -> bool {
    let base = name.split('_').next().unwrap_or(name);
    BRIDGE_BUILTINS.contains(&base)
}

/// The serializer-facing value of a literal instruction.
pub fn constant_value(func: &Function, inst: InstId, target: &TargetInfo) -> Option<ConstantValue> {
    let bits = |ty: &Type| match ty {
        Type::Int(bits) | Type::Float(bits) => *bits,
        _ => target.pointer_width,
    };
    match func.kind(inst) {
        InstKind::IntegerLiteral { value } => Some(ConstantValue::Integer {
            value: *value,
            bits: bits(func.ty(inst)),
        }),
        InstKind::FloatLiteral { value } => Some(ConstantValue::Float {
            value: *value,
            bits: bits(func.ty(inst)),
        }),
        InstKind::StringLiteral { value, .. } => Some(ConstantValue::String {
            value: value.clone(),
        }),
        InstKind::Metatype => {
            let marked = func.ty(inst).metatype_instance()?;
            Some(ConstantValue::TypeMarker {
                ty: marked.to_string(),
                dtype: target.dtype_of(marked),
            })
        }
        _ => None,
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

    fn resolve(source: &str, value: &str) -> Option<AttrValue> {
        let result = build(source);
        let func = &result.module.functions[0];
        attr_operand(func, result.value_names[0][value], &TargetInfo::default())
    }

    #[test]
    fn scalar_wrappers_are_peeled() {
        let result = build(
            r#"
            func @f {
              %x = integer_literal 4 : Builtin.Int64
              %i = struct (%x) : Int
              %w = struct (%i) : Wrapped
            }
            "#,
        );
        let func = &result.module.functions[0];
        let names = &result.value_names[0];
        assert_eq!(scalar_operand(func, names["w"]), Some(names["x"]));
        assert_eq!(
            attr_operand(func, names["i"], &TargetInfo::default()),
            Some(AttrValue::Integer(names["x"]))
        );
    }

    #[test]
    fn single_store_stack_slot() {
        let source = r#"
            func @f {
              %s = alloc_stack : *Int
              %x = integer_literal 4 : Builtin.Int64
              %i = struct (%x) : Int
              store %i to %s
            }
        "#;
        assert!(matches!(resolve(source, "s"), Some(AttrValue::Integer(_))));
    }

    #[test]
    fn stack_slot_with_two_stores_is_unresolved() {
        let source = r#"
            func @f {
              %s = alloc_stack : *Int
              %x = integer_literal 4 : Builtin.Int64
              %y = integer_literal 5 : Builtin.Int64
              store %x to %s
              store %y to %s
            }
        "#;
        assert_eq!(resolve(source, "s"), None);
    }

    #[test]
    fn other_addresses_are_unresolved() {
        let source = r#"
            global @g
            func @f {
              %a = global_addr @g : *Int
            }
        "#;
        assert_eq!(resolve(source, "a"), None);
    }

    #[test]
    fn string_bridging_chain() {
        let source = r#"
            func @f {
              %lit = string_literal utf8 "SAME" : Builtin.RawPointer
              %bits = builtin "ptrtoint_Word" (%lit) : Builtin.Word
              %mask = builtin "or_Int64" (%bits) : Builtin.Int64
              %obj = unchecked_bitwise_cast %mask : Builtin.BridgeObject
              %guts = struct (%obj) : _StringGuts
              %s = struct (%guts) : String
            }
        "#;
        assert!(matches!(resolve(source, "s"), Some(AttrValue::String(_))));
    }

    #[test]
    fn string_chain_stops_at_unknown_node() {
        let source = r#"
            func @f {
              %lit = string_literal utf8 "SAME" : Builtin.RawPointer
              %bits = builtin "xor_Int64" (%lit) : Builtin.Int64
              %s = struct (%bits) : String
              %u = string_literal utf16 "SAME" : Builtin.RawPointer
              %t = struct (%u) : String
            }
        "#;
        assert_eq!(resolve(source, "s"), None);
        assert_eq!(resolve(source, "t"), None);
    }

    #[test]
    fn wide_integers_and_unrepresentable_markers_are_rejected() {
        let source = r#"
            func @f {
              %big = integer_literal 1 : Builtin.Int128
              %m = metatype : Metatype<String>
              %ok = metatype : Metatype<Float>
              %d = float_literal 0.5 : Builtin.FPIEEE64
            }
        "#;
        assert_eq!(resolve(source, "big"), None);
        assert_eq!(resolve(source, "m"), None);
        assert!(matches!(resolve(source, "ok"), Some(AttrValue::TypeMarker(_))));
        assert!(matches!(resolve(source, "d"), Some(AttrValue::Float(_))));
    }

    #[test]
    fn arrays_resolve_only_if_every_element_does() {
        let good = r#"
            global @lits {
              %0 = integer_literal 1 : Builtin.Int64
              %1 = object (%0) : _ContiguousArrayStorage<Int>
            }
            func @f {
              %g = global_value @lits : _ContiguousArrayStorage<Int>
              %arr = struct (%g) : Array<Int>
            }
        "#;
        assert!(matches!(resolve(good, "arr"), Some(AttrValue::Array(_))));

        let bad = r#"
            global @lits {
              %0 = argument 0 : Int
              %1 = object (%0) : _ContiguousArrayStorage<Int>
            }
            func @f {
              %g = global_value @lits : _ContiguousArrayStorage<Int>
              %arr = struct (%g) : Array<Int>
            }
        "#;
        assert_eq!(resolve(bad, "arr"), None);
    }

    #[test]
    fn arrays_of_arrays_do_not_resolve() {
        let source = r#"
            global @inner {
              %0 = integer_literal 1 : Builtin.Int64
              %1 = object (%0) : _ContiguousArrayStorage<Int>
            }
            func @f {
              %g = global_value @inner : _ContiguousArrayStorage<Int>
              %in = struct (%g) : Array<Int>
              %n = integer_literal 1 : Builtin.Word
              %b = alloc_ref %n : _ContiguousArrayStorage<Array<Int>>
              %u = upcast %b : _ContiguousArrayStorageBase
              %t = ref_tail_addr %u : *Array<Int>
              store %in to %t
              %arr = struct (%b) : Array<Array<Int>>
            }
        "#;
        assert!(matches!(resolve(source, "in"), Some(AttrValue::Array(_))));
        assert_eq!(resolve(source, "arr"), None);
    }

    #[test]
    fn constant_values_for_serialization() {
        let result = build(
            r#"
            func @f {
              %i = integer_literal -3 : Builtin.Int32
              %w = integer_literal 8 : Builtin.Word
              %m = metatype : Metatype<Double>
            }
            "#,
        );
        let func = &result.module.functions[0];
        let names = &result.value_names[0];
        let target = TargetInfo::default();
        assert_eq!(
            constant_value(func, names["i"], &target),
            Some(ConstantValue::Integer { value: -3, bits: 32 })
        );
        assert_eq!(
            constant_value(func, names["w"], &target),
            Some(ConstantValue::Integer { value: 8, bits: 64 })
        );
        assert_eq!(
            constant_value(func, names["m"], &target),
            Some(ConstantValue::TypeMarker {
                ty: "Double".to_string(),
                dtype: Some(DType::Double)
            })
        );
    }
}

// array_literal.rs — Recognize IR idioms that build a fixed-length literal array
//
// Each construction idiom is one `ArrayIdiom` strategy. `try_decode_array_literal`
// asks every strategy in turn; strategies may recurse through the decoder to
// peel wrappers. Adding an idiom means adding a strategy to `IDIOMS`.
//
// Preconditions: `func` is well-formed (operands defined before use).
// Postconditions: a decoded literal's element count equals the statically
//   known length of the construction; elements are in index order.
// Failure modes: anything outside the recognized idioms, including a
//   partially initialized buffer, decodes to `None`.
// Side effects: none.

use std::collections::BTreeMap;

use crate::id::InstId;
use crate::ir::{CastKind, Function, InstKind, Type};

/// The runtime's shared storage for every empty array.
pub const EMPTY_ARRAY_STORAGE: &str = "_swiftEmptyArrayStorage";

/// A decoded array literal.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLiteral {
    pub element_type: Type,
    /// The instructions defining each element, in index order.
    pub elements: Vec<InstId>,
}

/// Decode `value` as an array literal. `value` must have type `Array<T>`.
pub fn try_decode_array_literal(func: &Function, value: InstId) -> Option<ArrayLiteral> {
    let element_type = func.ty(value).array_element()?.clone();
    let elements = decode_elements(func, value)?;
    Some(ArrayLiteral {
        element_type,
        elements,
    })
}

fn decode_elements(func: &Function, value: InstId) -> Option<Vec<InstId>> {
    IDIOMS.iter().find_map(|idiom| idiom.elements(func, value))
}

// ── Strategies ──────────────────────────────────────────────────────────────

trait ArrayIdiom: Sync {
    /// The element-defining instructions, or `None` if `value` is not built
    /// by this idiom.
    fn elements(&self, func: &Function, value: InstId) -> Option<Vec<InstId>>;
}

static IDIOMS: &[&dyn ArrayIdiom] = &[&WrapperPeel, &HeapBuffer, &StaticInitializer, &EmptySentinel];

/// Single-operand wrappers around the storage: the array struct itself and
/// reference casts.
struct WrapperPeel;

impl ArrayIdiom for WrapperPeel {
    fn elements(&self, func: &Function, value: InstId) -> Option<Vec<InstId>> {
        let inner = match func.kind(value) {
            InstKind::Struct { operands } if operands.len() == 1 => operands[0],
            InstKind::Cast {
                kind: CastKind::UncheckedRef | CastKind::Upcast,
                operand,
            } => *operand,
            _ => return None,
        };
        decode_elements(func, inner)
    }
}

/// `alloc_ref` of a literal count `N`, reached through one `upcast` and one
/// `ref_tail_addr`, with exactly one store per index in `[0, N)`:
///
/// ```text
/// %b = alloc_ref %n
/// %u = upcast %b
/// %t = ref_tail_addr %u
/// store %e0 to %t
/// %a1 = index_addr %t, %one
/// store %e1 to %a1
/// ```
struct HeapBuffer;

impl ArrayIdiom for HeapBuffer {
    fn elements(&self, func: &Function, value: InstId) -> Option<Vec<InstId>> {
        let InstKind::AllocRef { count } = func.kind(value) else {
            return None;
        };
        let InstKind::IntegerLiteral { value: n } = func.kind(*count) else {
            return None;
        };
        let len = usize::try_from(*n).ok()?;

        let upcast = func.single_user_where(value, |k| {
            matches!(
                k,
                InstKind::Cast {
                    kind: CastKind::Upcast,
                    ..
                }
            )
        })?;
        let tail = func.single_user_where(upcast, |k| matches!(k, InstKind::RefTailAddr { .. }))?;

        // The count is untrusted; size everything by the stores actually seen.
        let mut slots: BTreeMap<usize, InstId> = BTreeMap::new();
        for user in func.users(tail) {
            let (index, stored) = stored_element(func, tail, user)?;
            if index >= len || slots.insert(index, stored).is_some() {
                return None;
            }
        }
        if slots.len() != len {
            return None;
        }
        Some(slots.into_values().collect())
    }
}

/// Classify one use of the tail address: `(index, stored value)`.
fn stored_element(func: &Function, tail: InstId, user: InstId) -> Option<(usize, InstId)> {
    match func.kind(user) {
        InstKind::Store { src, dest } if *dest == tail => Some((0, *src)),
        InstKind::IndexAddr { base, index } if *base == tail => {
            let InstKind::IntegerLiteral { value } = func.kind(*index) else {
                return None;
            };
            let index = usize::try_from(*value).ok()?;
            match func.kind(func.single_use(user)?) {
                InstKind::Store { src, dest } if *dest == user => Some((index, *src)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// `global_value` of a global whose static initializer is an `object`; the
/// tail operands are the elements.
struct StaticInitializer;

impl ArrayIdiom for StaticInitializer {
    fn elements(&self, func: &Function, value: InstId) -> Option<Vec<InstId>> {
        let InstKind::GlobalValue { global } = func.kind(value) else {
            return None;
        };
        let init = func.global(global)?.init?;
        match func.kind(init) {
            InstKind::Object { tail } => Some(tail.clone()),
            _ => None,
        }
    }
}

/// `raw_pointer_to_ref (address_to_pointer (global_addr @_swiftEmptyArrayStorage))`
struct EmptySentinel;

impl ArrayIdiom for EmptySentinel {
    fn elements(&self, func: &Function, value: InstId) -> Option<Vec<InstId>> {
        let InstKind::Cast {
            kind: CastKind::RawPointerToRef,
            operand,
        } = func.kind(value)
        else {
            return None;
        };
        let InstKind::Cast {
            kind: CastKind::AddressToPointer,
            operand,
        } = func.kind(*operand)
        else {
            return None;
        };
        match func.kind(*operand) {
            InstKind::GlobalAddr { global } if global == EMPTY_ARRAY_STORAGE => Some(Vec::new()),
            _ => None,
        }
    }
}

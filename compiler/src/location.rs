// location.rs — Best user-facing source location for a diagnostic
//
// Instructions inlined from library wrappers usually carry no location of
// their own. Their scope chain records where they were inlined; walking it
// outward finds a location in the user's code.
//
// Preconditions: scope ids in `func` refer to its own scope table.
// Postconditions: the result is a location taken from the instruction or one
//   of its enclosing scopes, or `None` if the chain has none.
// Failure modes: none.
// Side effects: none.

use crate::id::InstId;
use crate::ir::{DebugLoc, Function, InstKind, SourceLoc};

/// Skip locations inside inlined library code.
///
/// An instruction's own location wins only when its scope was not inlined.
/// Otherwise the scope chain is walked toward the outermost call site,
/// stopping at the first scope with a location, or at a scope whose inlined
/// function has a known location. With nothing better found, the
/// instruction's own location is kept.
pub fn skip_internal_locations(func: &Function, loc: &DebugLoc) -> Option<SourceLoc> {
    let Some(mut scope) = loc.scope.and_then(|id| func.scope(id)) else {
        return loc.loc.clone();
    };
    if scope.inlined_call_site.is_none() && loc.loc.is_some() {
        return loc.loc.clone();
    }
    while let Some(parent) = scope.inlined_call_site {
        if scope.loc.is_some() {
            return scope.loc.clone();
        }
        if scope.inlined_fn_loc.is_some() {
            break;
        }
        scope = func.scope(parent)?;
    }
    scope.loc.clone().or_else(|| loc.loc.clone())
}

/// The location to report for a problem with `inst`.
///
/// A `struct_extract` that unwraps a builtin or device-tensor value is looked
/// through to the aggregate it came from.
pub fn user_source_location(func: &Function, inst: InstId) -> Option<SourceLoc> {
    let mut inst = inst;
    while let InstKind::StructExtract { operand, .. } = func.kind(inst) {
        let ty = func.ty(inst);
        if !(ty.is_builtin() || ty.is_tensor_handle()) {
            break;
        }
        inst = *operand;
    }
    skip_internal_locations(func, func.loc(inst))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::parse_module;

    fn locate(source: &str, value: &str) -> Option<String> {
        let result = parse_module("t.tfir", source);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let func = &result.module.functions[0];
        user_source_location(func, result.value_names[0][value]).map(|l| l.to_string())
    }

    #[test]
    fn own_location_wins() {
        let source = r#"
            scope 0 loc "main.swift":1:1
            func @f { %a = argument 0 : Int loc "main.swift":7:3 scope 0 }
        "#;
        assert_eq!(locate(source, "a").as_deref(), Some("main.swift:7:3"));
    }

    #[test]
    fn inlined_own_location_yields_to_call_site() {
        let source = r#"
            scope 0 loc "main.swift":12:5
            scope 1 inlined_at 0
            func @f { %a = argument 0 : Int loc "Lib.swift":40:2 scope 1 }
        "#;
        assert_eq!(locate(source, "a").as_deref(), Some("main.swift:12:5"));
    }

    #[test]
    fn own_location_kept_when_chain_has_none() {
        let source = r#"
            scope 0
            scope 1 inlined_at 0
            func @f { %a = argument 0 : Int loc "Lib.swift":40:2 scope 1 }
        "#;
        assert_eq!(locate(source, "a").as_deref(), Some("Lib.swift:40:2"));
    }

    #[test]
    fn walks_out_of_inlined_scopes() {
        let source = r#"
            scope 0 loc "main.swift":12:5
            scope 1 inlined_at 0
            scope 2 inlined_at 1
            func @f { %a = argument 0 : Int scope 2 }
        "#;
        assert_eq!(locate(source, "a").as_deref(), Some("main.swift:12:5"));
    }

    #[test]
    fn stops_at_inlined_function_with_location() {
        let source = r#"
            scope 0 loc "main.swift":12:5
            scope 1 inlined_at 0 fn_loc "Lib.swift":3:1
            func @f { %a = argument 0 : Int scope 1 }
        "#;
        assert_eq!(locate(source, "a"), None);
    }

    #[test]
    fn looks_through_struct_extract_of_builtin() {
        let source = r#"
            func @f {
              %s = argument 0 : Int loc "main.swift":4:9
              %x = struct_extract %s, 0 : Builtin.Int64
            }
        "#;
        assert_eq!(locate(source, "x").as_deref(), Some("main.swift:4:9"));
    }

    #[test]
    fn no_location_at_all() {
        let source = "func @f { %a = argument 0 : Int }";
        assert_eq!(locate(source, "a"), None);
    }
}

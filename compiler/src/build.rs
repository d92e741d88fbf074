// build.rs — Lower the textual AST into arena IR
//
// Scopes and global static initializers are module-level in the text but live
// inside each function in the IR. They are built once into a template
// function, which every `func` clones before its own body is lowered.
//
// Preconditions: `ast` came from `parser::parse`.
// Postconditions: one `Function` per `func` item, in source order. Value
//   names are resolved in definition order (no forward references).
// Failure modes: undefined / duplicate names, missing type annotations and
//   unknown scopes produce diagnostics; the offending instruction is skipped
//   and building continues.
// Side effects: none.

use std::collections::{HashMap, HashSet};

use chumsky::span::Span as _;

use crate::ast::{self, InstDecl, Item, OpDecl};
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::id::{InstId, ScopeId};
use crate::ir::{DebugLoc, Function, Global, InstKind, Module, Scope, SourceLoc, Type};

/// Result of building: the module, per-function value names, diagnostics.
#[derive(Debug)]
pub struct BuildResult {
    pub module: Module,
    /// For each function (same order as `module.functions`), the textual
    /// value name (without `%`) of every named body instruction.
    pub value_names: Vec<HashMap<String, InstId>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Maps byte offsets of IR text to line/column locations.
pub struct SourceMap<'a> {
    file: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceMap<'a> {
    pub fn new(file: &'a str, text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { file, line_starts }
    }

    pub fn loc(&self, offset: usize) -> SourceLoc {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        SourceLoc {
            file: self.file.to_string(),
            line: line as u32,
            column: (offset - line_start + 1) as u32,
        }
    }
}

/// Lex, parse and build textual IR. Syntax errors are reported as `E0001`.
pub fn parse_module(file: &str, source: &str) -> BuildResult {
    let parsed = crate::parser::parse(source);
    let map = SourceMap::new(file, source);
    let mut diagnostics: Vec<Diagnostic> = parsed
        .errors
        .iter()
        .map(|e| {
            Diagnostic::error(Some(map.loc(e.span().start())), e.to_string())
                .with_code(codes::E0001)
        })
        .collect();

    let Some(ast) = parsed.module else {
        return BuildResult {
            module: Module::default(),
            value_names: Vec::new(),
            diagnostics,
        };
    };

    let mut result = build_module(&ast, &map);
    diagnostics.append(&mut result.diagnostics);
    result.diagnostics = diagnostics;
    result
}

/// Lower a parsed module into arena IR.
pub fn build_module(ast: &ast::Module, map: &SourceMap<'_>) -> BuildResult {
    let mut builder = Builder {
        map,
        diagnostics: Vec::new(),
        scope_ids: HashMap::new(),
        global_names: HashSet::new(),
    };

    let template = builder.build_template(ast);

    let mut module = Module::default();
    let mut value_names = Vec::new();
    for item in &ast.items {
        if let Item::Func(decl) = item {
            let mut func = template.clone();
            func.name = decl.name.clone();
            let mut names = HashMap::new();
            for inst in &decl.body {
                builder.lower_inst(&mut func, &mut names, inst, false);
            }
            module.functions.push(func);
            value_names.push(names);
        }
    }

    BuildResult {
        module,
        value_names,
        diagnostics: builder.diagnostics,
    }
}

struct Builder<'m, 'a> {
    map: &'m SourceMap<'a>,
    diagnostics: Vec<Diagnostic>,
    scope_ids: HashMap<u32, ScopeId>,
    global_names: HashSet<String>,
}

impl Builder<'_, '_> {
    fn error(&mut self, code: DiagCode, span: ast::Span, message: String) {
        let loc = self.map.loc(span.start());
        self.diagnostics
            .push(Diagnostic::error(Some(loc), message).with_code(code));
    }

    /// Build the scopes and globals shared by every function.
    fn build_template(&mut self, ast: &ast::Module) -> Function {
        let mut template = Function::new("");

        for item in &ast.items {
            let Item::Scope(decl) = item else { continue };
            if self.scope_ids.contains_key(&decl.id) {
                self.error(
                    codes::E0003,
                    decl.span,
                    format!("scope {} is declared more than once", decl.id),
                );
                continue;
            }
            let inlined_call_site = match decl.inlined_at {
                Some(parent) => match self.scope_ids.get(&parent) {
                    Some(id) => Some(*id),
                    None => {
                        self.error(
                            codes::E0005,
                            decl.span,
                            format!("scope {} is inlined at unknown scope {}", decl.id, parent),
                        );
                        None
                    }
                },
                None => None,
            };
            let id = template.add_scope(Scope {
                loc: decl.loc.clone(),
                inlined_call_site,
                inlined_fn_loc: decl.fn_loc.clone(),
            });
            self.scope_ids.insert(decl.id, id);
        }

        // Names first, so initializers may mention any global.
        for item in &ast.items {
            let Item::Global(decl) = item else { continue };
            if !self.global_names.insert(decl.name.clone()) {
                self.error(
                    codes::E0003,
                    decl.span,
                    format!("global '@{}' is defined more than once", decl.name),
                );
            }
        }

        let mut seen = HashSet::new();
        for item in &ast.items {
            let Item::Global(decl) = item else { continue };
            if !seen.insert(decl.name.as_str()) {
                continue;
            }
            let mut names = HashMap::new();
            let mut init = None;
            for inst in decl.body.iter().flatten() {
                init = self.lower_inst(&mut template, &mut names, inst, true);
            }
            template.add_global(Global {
                name: decl.name.clone(),
                init,
            });
        }

        template
    }

    fn lookup(
        &mut self,
        names: &HashMap<String, InstId>,
        name: &str,
        span: ast::Span,
    ) -> Option<InstId> {
        match names.get(name) {
            Some(id) => Some(*id),
            None => {
                self.error(
                    codes::E0002,
                    span,
                    format!("use of undefined value '%{}'", name),
                );
                None
            }
        }
    }

    /// Resolve every name, reporting each undefined one.
    fn lookup_all(
        &mut self,
        names: &HashMap<String, InstId>,
        list: &[String],
        span: ast::Span,
    ) -> Option<Vec<InstId>> {
        let resolved: Vec<Option<InstId>> =
            list.iter().map(|n| self.lookup(names, n, span)).collect();
        resolved.into_iter().collect()
    }

    fn check_global(&mut self, name: &str, span: ast::Span) -> Option<()> {
        if self.global_names.contains(name) {
            Some(())
        } else {
            self.error(
                codes::E0002,
                span,
                format!("use of undefined global '@{}'", name),
            );
            None
        }
    }

    fn lower_op(
        &mut self,
        names: &HashMap<String, InstId>,
        op: &OpDecl,
        span: ast::Span,
    ) -> Option<InstKind> {
        let kind = match op {
            OpDecl::Argument(index) => InstKind::Argument { index: *index },
            OpDecl::IntegerLiteral(value) => InstKind::IntegerLiteral { value: *value },
            OpDecl::FloatLiteral(value) => InstKind::FloatLiteral { value: *value },
            OpDecl::StringLiteral(encoding, value) => InstKind::StringLiteral {
                value: value.clone(),
                encoding: *encoding,
            },
            OpDecl::Metatype => InstKind::Metatype,
            OpDecl::Struct(list) => InstKind::Struct {
                operands: self.lookup_all(names, list, span)?,
            },
            OpDecl::StructExtract(v, field) => InstKind::StructExtract {
                operand: self.lookup(names, v, span)?,
                field: *field,
            },
            OpDecl::Enum { case, payload } => InstKind::Enum {
                case: case.clone(),
                payload: match payload {
                    Some(p) => Some(self.lookup(names, p, span)?),
                    None => None,
                },
            },
            OpDecl::Cast(kind, v) => InstKind::Cast {
                kind: *kind,
                operand: self.lookup(names, v, span)?,
            },
            OpDecl::GlobalAddr(g) => {
                self.check_global(g, span)?;
                InstKind::GlobalAddr { global: g.clone() }
            }
            OpDecl::GlobalValue(g) => {
                self.check_global(g, span)?;
                InstKind::GlobalValue { global: g.clone() }
            }
            OpDecl::Object(list) => InstKind::Object {
                tail: self.lookup_all(names, list, span)?,
            },
            OpDecl::AllocStack => InstKind::AllocStack,
            OpDecl::AllocRef(v) => InstKind::AllocRef {
                count: self.lookup(names, v, span)?,
            },
            OpDecl::RefTailAddr(v) => InstKind::RefTailAddr {
                operand: self.lookup(names, v, span)?,
            },
            OpDecl::IndexAddr(base, index) => {
                let base = self.lookup(names, base, span);
                let index = self.lookup(names, index, span);
                InstKind::IndexAddr {
                    base: base?,
                    index: index?,
                }
            }
            OpDecl::Store { src, dest } => {
                let src = self.lookup(names, src, span);
                let dest = self.lookup(names, dest, span);
                InstKind::Store {
                    src: src?,
                    dest: dest?,
                }
            }
            OpDecl::Builtin { name, operands } => InstKind::Builtin {
                name: name.clone(),
                operands: self.lookup_all(names, operands, span)?,
            },
            OpDecl::Apply { callee, args } => InstKind::Apply {
                callee: callee.clone(),
                args: self.lookup_all(names, args, span)?,
            },
            OpDecl::TupleExtract(v, index) => InstKind::TupleExtract {
                operand: self.lookup(names, v, span)?,
                index: *index,
            },
            OpDecl::ReleaseValue(v) => InstKind::ReleaseValue {
                operand: self.lookup(names, v, span)?,
            },
            OpDecl::Return(v) => InstKind::Return {
                operand: match v {
                    Some(v) => Some(self.lookup(names, v, span)?),
                    None => None,
                },
            },
        };
        Some(kind)
    }

    fn result_type(&mut self, kind: &InstKind, decl: &InstDecl) -> Option<Type> {
        match (&decl.ty, kind) {
            (Some(ty), InstKind::Metatype) if ty.metatype_instance().is_none() => {
                self.error(
                    codes::E0004,
                    decl.span,
                    format!("metatype must have a Metatype<T> type, found '{}'", ty),
                );
                None
            }
            (Some(ty), _) => Some(ty.clone()),
            (None, InstKind::StringLiteral { .. }) => Some(Type::RawPointer),
            (None, k) if !k.has_result() => Some(Type::unit()),
            (None, k) => {
                self.error(
                    codes::E0004,
                    decl.span,
                    format!("'{}' requires a type annotation", k.mnemonic()),
                );
                None
            }
        }
    }

    /// Lower one instruction into `func`, either into the body or detached.
    fn lower_inst(
        &mut self,
        func: &mut Function,
        names: &mut HashMap<String, InstId>,
        decl: &InstDecl,
        detached: bool,
    ) -> Option<InstId> {
        let kind = self.lower_op(names, &decl.op, decl.span)?;
        let ty = self.result_type(&kind, decl)?;
        let scope = match decl.scope {
            Some(n) => match self.scope_ids.get(&n) {
                Some(id) => Some(*id),
                None => {
                    self.error(codes::E0005, decl.span, format!("unknown scope {}", n));
                    return None;
                }
            },
            None => None,
        };

        if let Some(name) = &decl.result {
            if !kind.has_result() {
                self.error(
                    codes::E0004,
                    decl.span,
                    format!("'{}' does not produce a value", kind.mnemonic()),
                );
                return None;
            }
            if names.contains_key(name) {
                self.error(
                    codes::E0003,
                    decl.span,
                    format!("value '%{}' is defined more than once", name),
                );
                return None;
            }
        }

        let id = if detached {
            func.add_detached(kind, ty)
        } else {
            let loc = DebugLoc {
                loc: decl.loc.clone(),
                scope,
            };
            func.push(kind, ty, loc)
        };
        if let Some(name) = &decl.result {
            names.insert(name.clone(), id);
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(source: &str) -> BuildResult {
        parse_module("test.tfir", source)
    }

    fn codes_of(result: &BuildResult) -> Vec<&'static str> {
        result
            .diagnostics
            .iter()
            .filter_map(|d| d.code.map(|c| c.0))
            .collect()
    }

    #[test]
    fn builds_body_in_order() {
        let result = build(
            r#"
            func @f {
              %a = integer_literal 1 : Builtin.Int64
              %b = struct (%a) : Int
              return (%b)
            }
            "#,
        );
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let func = &result.module.functions[0];
        assert_eq!(func.body().len(), 3);
        let names = &result.value_names[0];
        let b = names["b"];
        assert_eq!(
            func.kind(b),
            &InstKind::Struct {
                operands: vec![names["a"]]
            }
        );
    }

    #[test]
    fn globals_are_detached_and_shared() {
        let result = build(
            r#"
            global @lits {
              %0 = integer_literal 7 : Builtin.Int64
              %1 = object (%0) : _ContiguousArrayStorage<Int>
            }
            func @f { return () }
            func @g { return () }
            "#,
        );
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert_eq!(result.module.functions.len(), 2);
        for func in &result.module.functions {
            let init = func.global("lits").and_then(|g| g.init).expect("init");
            assert!(!func.is_attached(init));
            assert!(matches!(func.kind(init), InstKind::Object { tail } if tail.len() == 1));
            assert_eq!(func.body().len(), 1);
        }
    }

    #[test]
    fn scope_chain_is_resolved() {
        let result = build(
            r#"
            scope 0 loc "main.swift":2:1
            scope 1 loc "Lib.swift":5:3 inlined_at 0
            func @f { %0 = argument 0 : Int loc "Lib.swift":5:3 scope 1 }
            "#,
        );
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let func = &result.module.functions[0];
        let inst = func.body()[0];
        let scope = func.loc(inst).scope.and_then(|s| func.scope(s)).expect("scope");
        assert_eq!(scope.inlined_call_site, Some(ScopeId(0)));
    }

    #[test]
    fn undefined_value_is_reported_with_location() {
        let result = build("func @f {\n  %a = struct (%zz) : Int\n}");
        assert_eq!(codes_of(&result), vec!["E0002"]);
        let loc = result.diagnostics[0].loc.as_ref().expect("loc");
        assert_eq!((loc.line, loc.column), (2, 3));
        assert!(result.module.functions[0].body().is_empty());
    }

    #[test]
    fn duplicate_and_untyped_values() {
        let result = build(
            r#"
            func @f {
              %a = argument 0 : Int
              %a = argument 1 : Int
              %b = argument 2
            }
            "#,
        );
        assert_eq!(codes_of(&result), vec!["E0003", "E0004"]);
    }

    #[test]
    fn unknown_scope_and_global() {
        let result = build(
            r#"
            func @f {
              %a = argument 0 : Int scope 4
              %b = global_addr @nowhere : *Int
            }
            "#,
        );
        assert_eq!(codes_of(&result), vec!["E0005", "E0002"]);
    }

    #[test]
    fn syntax_error_is_e0001() {
        let result = build("func @f { %a = }");
        assert!(codes_of(&result).contains(&"E0001"));
    }

    #[test]
    fn source_map_lines_and_columns() {
        let map = SourceMap::new("x", "ab\ncd\n");
        assert_eq!((map.loc(0).line, map.loc(0).column), (1, 1));
        assert_eq!((map.loc(4).line, map.loc(4).column), (2, 2));
    }
}

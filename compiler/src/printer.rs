// printer.rs — Textual IR printer
//
// `Display` for `Function` and `Module`. Output re-parses with
// `build::parse_module` to an equivalent function. Values are renumbered
// densely (`%0`, `%1`, ...) in body order, so two functions that differ only
// in arena layout print identically.
//
// Preconditions: none.
// Postconditions: scopes print first, then globals with their reachable
//   initializer instructions, then the function body.
// Failure modes: none; an operand that is neither in the body nor printed
//   earlier prints as `%?<id>`, which will not re-parse.
// Side effects: none.

use std::collections::HashMap;
use std::fmt;

use crate::id::InstId;
use crate::ir::{Function, InstData, InstKind, Module, SourceLoc};
use crate::lexer::escape_string;

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_header(f, self)?;
        write_body(f, self)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Scopes and globals are shared; print them once.
        if let Some(first) = self.functions.first() {
            write_header(f, first)?;
        }
        for (i, func) in self.functions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write_body(f, func)?;
        }
        Ok(())
    }
}

fn write_loc(f: &mut fmt::Formatter<'_>, loc: &SourceLoc) -> fmt::Result {
    write!(f, "{}:{}:{}", escape_string(&loc.file), loc.line, loc.column)
}

fn write_header(f: &mut fmt::Formatter<'_>, func: &Function) -> fmt::Result {
    for (i, scope) in func.scopes().iter().enumerate() {
        write!(f, "scope {i}")?;
        if let Some(loc) = &scope.loc {
            write!(f, " loc ")?;
            write_loc(f, loc)?;
        }
        if let Some(parent) = scope.inlined_call_site {
            write!(f, " inlined_at {}", parent.0)?;
        }
        if let Some(loc) = &scope.inlined_fn_loc {
            write!(f, " fn_loc ")?;
            write_loc(f, loc)?;
        }
        writeln!(f)?;
    }

    for global in func.globals() {
        write!(f, "global @{}", global.name)?;
        match global.init {
            Some(init) => {
                writeln!(f, " {{")?;
                let mut order = Vec::new();
                collect_post_order(func, init, &mut order);
                let mut names = Names::default();
                for id in order {
                    write_inst(f, func, id, &mut names)?;
                }
                writeln!(f, "}}")?;
            }
            None => writeln!(f)?,
        }
    }
    Ok(())
}

fn write_body(f: &mut fmt::Formatter<'_>, func: &Function) -> fmt::Result {
    writeln!(f, "func @{} {{", func.name)?;
    let mut names = Names::default();
    for &id in func.body() {
        write_inst(f, func, id, &mut names)?;
    }
    writeln!(f, "}}")
}

/// Operands before users, each instruction once.
fn collect_post_order(func: &Function, id: InstId, order: &mut Vec<InstId>) {
    if order.contains(&id) {
        return;
    }
    for op in func.kind(id).operands() {
        collect_post_order(func, op, order);
    }
    order.push(id);
}

#[derive(Default)]
struct Names {
    map: HashMap<InstId, usize>,
}

impl Names {
    fn define(&mut self, id: InstId) -> usize {
        let n = self.map.len();
        *self.map.entry(id).or_insert(n)
    }

    fn name(&self, id: InstId) -> String {
        match self.map.get(&id) {
            Some(n) => format!("%{n}"),
            None => format!("%?{}", id.0),
        }
    }

    fn list(&self, ids: &[InstId]) -> String {
        ids.iter()
            .map(|&id| self.name(id))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn write_inst(
    f: &mut fmt::Formatter<'_>,
    func: &Function,
    id: InstId,
    names: &mut Names,
) -> fmt::Result {
    let InstData { kind, ty, loc } = func.inst(id);
    write!(f, "  ")?;
    if kind.has_result() {
        let n = names.define(id);
        write!(f, "%{n} = ")?;
    }
    let m = kind.mnemonic();
    match kind {
        InstKind::Argument { index } => write!(f, "{m} {index}")?,
        InstKind::IntegerLiteral { value } => write!(f, "{m} {value}")?,
        InstKind::FloatLiteral { value } => write!(f, "{m} {value:?}")?,
        InstKind::StringLiteral { value, encoding } => {
            let enc = match encoding {
                crate::ir::StringEncoding::Utf8 => "utf8",
                crate::ir::StringEncoding::Utf16 => "utf16",
            };
            write!(f, "{m} {enc} {}", escape_string(value))?
        }
        InstKind::Metatype | InstKind::AllocStack => write!(f, "{m}")?,
        InstKind::Struct { operands } => write!(f, "{m} ({})", names.list(operands))?,
        InstKind::Object { tail } => write!(f, "{m} ({})", names.list(tail))?,
        InstKind::StructExtract { operand, field } => {
            write!(f, "{m} {}, {field}", names.name(*operand))?
        }
        InstKind::TupleExtract { operand, index } => {
            write!(f, "{m} {}, {index}", names.name(*operand))?
        }
        InstKind::Enum { case, payload } => match payload {
            Some(p) => write!(f, "{m} {case}({})", names.name(*p))?,
            None => write!(f, "{m} {case}")?,
        },
        InstKind::Cast { operand, .. }
        | InstKind::RefTailAddr { operand }
        | InstKind::ReleaseValue { operand } => write!(f, "{m} {}", names.name(*operand))?,
        InstKind::AllocRef { count } => write!(f, "{m} {}", names.name(*count))?,
        InstKind::GlobalAddr { global } | InstKind::GlobalValue { global } => {
            write!(f, "{m} @{global}")?
        }
        InstKind::IndexAddr { base, index } => {
            write!(f, "{m} {}, {}", names.name(*base), names.name(*index))?
        }
        InstKind::Store { src, dest } => {
            write!(f, "{m} {} to {}", names.name(*src), names.name(*dest))?
        }
        InstKind::Builtin { name, operands } => write!(
            f,
            "{m} {} ({})",
            escape_string(name),
            names.list(operands)
        )?,
        InstKind::Apply { callee, args } => {
            write!(f, "{m} @{callee} ({})", names.list(args))?
        }
        InstKind::Return { operand } => match operand {
            Some(v) => write!(f, "{m} ({})", names.name(*v))?,
            None => write!(f, "{m} ()")?,
        },
    }
    if kind.has_result() {
        write!(f, " : {ty}")?;
    }
    if let Some(l) = &loc.loc {
        write!(f, " loc ")?;
        write_loc(f, l)?;
    }
    if let Some(scope) = loc.scope {
        write!(f, " scope {}", scope.0)?;
    }
    writeln!(f)
}

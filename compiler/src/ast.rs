// AST for textual tensor-op IR (.tfir) files.
//
// A direct image of the surface syntax: names are still strings, nothing is
// resolved. `build` lowers this into the arena IR.
//
// Preconditions: none (data types only).
// Postconditions: none (data types only).
// Failure modes: none.
// Side effects: none.

use chumsky::span::SimpleSpan;

use crate::ir::{CastKind, SourceLoc, StringEncoding, Type};

pub type Span = SimpleSpan;

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Scope(ScopeDecl),
    Global(GlobalDecl),
    Func(FuncDecl),
}

/// `scope N [loc "f":l:c] [inlined_at M] [fn_loc "f":l:c]`
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeDecl {
    pub id: u32,
    pub loc: Option<SourceLoc>,
    pub inlined_at: Option<u32>,
    pub fn_loc: Option<SourceLoc>,
    pub span: Span,
}

/// `global @name [{ insts }]`; the last instruction is the initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDecl {
    pub name: String,
    pub body: Option<Vec<InstDecl>>,
    pub span: Span,
}

/// `func @name { insts }`
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub body: Vec<InstDecl>,
    pub span: Span,
}

/// `[%r =] op [: type] [loc "f":l:c] [scope N]`
#[derive(Debug, Clone, PartialEq)]
pub struct InstDecl {
    pub result: Option<String>,
    pub op: OpDecl,
    pub ty: Option<Type>,
    pub loc: Option<SourceLoc>,
    pub scope: Option<u32>,
    pub span: Span,
}

/// An opcode with its unresolved operands. Value names omit the `%`.
#[derive(Debug, Clone, PartialEq)]
pub enum OpDecl {
    Argument(u32),
    IntegerLiteral(i128),
    FloatLiteral(f64),
    StringLiteral(StringEncoding, String),
    Metatype,
    Struct(Vec<String>),
    StructExtract(String, u32),
    Enum { case: String, payload: Option<String> },
    Cast(CastKind, String),
    GlobalAddr(String),
    GlobalValue(String),
    Object(Vec<String>),
    AllocStack,
    AllocRef(String),
    RefTailAddr(String),
    IndexAddr(String, String),
    Store { src: String, dest: String },
    Builtin { name: String, operands: Vec<String> },
    Apply { callee: String, args: Vec<String> },
    TupleExtract(String, u32),
    ReleaseValue(String),
    Return(Option<String>),
}

impl OpDecl {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpDecl::Argument(_) => "argument",
            OpDecl::IntegerLiteral(_) => "integer_literal",
            OpDecl::FloatLiteral(_) => "float_literal",
            OpDecl::StringLiteral(..) => "string_literal",
            OpDecl::Metatype => "metatype",
            OpDecl::Struct(_) => "struct",
            OpDecl::StructExtract(..) => "struct_extract",
            OpDecl::Enum { .. } => "enum",
            OpDecl::Cast(kind, _) => kind.mnemonic(),
            OpDecl::GlobalAddr(_) => "global_addr",
            OpDecl::GlobalValue(_) => "global_value",
            OpDecl::Object(_) => "object",
            OpDecl::AllocStack => "alloc_stack",
            OpDecl::AllocRef(_) => "alloc_ref",
            OpDecl::RefTailAddr(_) => "ref_tail_addr",
            OpDecl::IndexAddr(..) => "index_addr",
            OpDecl::Store { .. } => "store",
            OpDecl::Builtin { .. } => "builtin",
            OpDecl::Apply { .. } => "apply",
            OpDecl::TupleExtract(..) => "tuple_extract",
            OpDecl::ReleaseValue(_) => "release_value",
            OpDecl::Return(_) => "return",
        }
    }
}

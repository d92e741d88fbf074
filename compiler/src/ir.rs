// ir.rs — Arena IR for functions carrying encoded tensor operations
//
// A function is a flat arena of instructions plus a body order. Every
// instruction produces at most one value, named by its `InstId`. Erasing an
// instruction removes it from the body but keeps its arena slot, so ids held
// by a rewrite stay meaningful. Global static initializers are materialized
// into the same arena as detached instructions (present in the arena, absent
// from the body).
//
// Preconditions: none (data + mutation primitives).
// Postconditions: operand lists are fixed at construction; only
//   `replace_all_uses` retargets operand edges.
// Failure modes: none; ids are only minted by the owning function.
// Side effects: none.

use std::fmt;

use crate::id::{InstId, ScopeId};

// ── Types ───────────────────────────────────────────────────────────────────

/// The static type of an IR value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// `Builtin.IntN`
    Int(u32),
    /// `Builtin.Word` (pointer-width integer)
    Word,
    /// `Builtin.FPIEEEn`
    Float(u32),
    RawPointer,
    BridgeObject,
    /// A library nominal type such as `Int`, `String`, `Array<Float>` or
    /// `TensorHandle<Float>`.
    Nominal { name: String, args: Vec<Type> },
    /// The type of a type-marker value.
    Metatype(Box<Type>),
    /// `*T`
    Address(Box<Type>),
    Tuple(Vec<Type>),
}

impl Type {
    pub fn unit() -> Type {
        Type::Tuple(Vec::new())
    }

    pub fn nominal(name: &str) -> Type {
        Type::Nominal {
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: &str, args: Vec<Type>) -> Type {
        Type::Nominal {
            name: name.to_string(),
            args,
        }
    }

    pub fn tensor_handle(element: Type) -> Type {
        Type::generic("TensorHandle", vec![element])
    }

    pub fn array(element: Type) -> Type {
        Type::generic("Array", vec![element])
    }

    pub fn is_address(&self) -> bool {
        matches!(self, Type::Address(_))
    }

    pub fn is_builtin(&self) -> bool {
        matches!(
            self,
            Type::Int(_) | Type::Word | Type::Float(_) | Type::RawPointer | Type::BridgeObject
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::Nominal { name, args } if name == "String" && args.is_empty())
    }

    fn single_arg_of(&self, wanted: &str) -> Option<&Type> {
        match self {
            Type::Nominal { name, args } if name == wanted && args.len() == 1 => args.first(),
            _ => None,
        }
    }

    /// `T` for `TensorHandle<T>`.
    pub fn tensor_handle_element(&self) -> Option<&Type> {
        self.single_arg_of("TensorHandle")
    }

    pub fn is_tensor_handle(&self) -> bool {
        self.tensor_handle_element().is_some()
    }

    /// `T` for `Array<T>`.
    pub fn array_element(&self) -> Option<&Type> {
        self.single_arg_of("Array")
    }

    pub fn metatype_instance(&self) -> Option<&Type> {
        match self {
            Type::Metatype(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int(width) => write!(f, "Builtin.Int{width}"),
            Type::Word => write!(f, "Builtin.Word"),
            Type::Float(width) => write!(f, "Builtin.FPIEEE{width}"),
            Type::RawPointer => write!(f, "Builtin.RawPointer"),
            Type::BridgeObject => write!(f, "Builtin.BridgeObject"),
            Type::Nominal { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    write_list(f, args)?;
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::Metatype(inner) => write!(f, "Metatype<{inner}>"),
            Type::Address(inner) => write!(f, "*{inner}"),
            Type::Tuple(elems) => {
                write!(f, "(")?;
                write_list(f, elems)?;
                write!(f, ")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, types: &[Type]) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{ty}")?;
    }
    Ok(())
}

// ── Debug locations ─────────────────────────────────────────────────────────

/// A position in user (or library) source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A lexical debug scope. Scopes created by inlining point at the scope of
/// the call site they were inlined into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub loc: Option<SourceLoc>,
    pub inlined_call_site: Option<ScopeId>,
    /// Location of the function whose body was inlined, when known.
    pub inlined_fn_loc: Option<SourceLoc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugLoc {
    pub loc: Option<SourceLoc>,
    pub scope: Option<ScopeId>,
}

// ── Instructions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Utf8,
    Utf16,
}

/// Single-operand conversions that never change the underlying value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    UncheckedBitwise,
    UncheckedRef,
    Upcast,
    RawPointerToRef,
    AddressToPointer,
}

impl CastKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastKind::UncheckedBitwise => "unchecked_bitwise_cast",
            CastKind::UncheckedRef => "unchecked_ref_cast",
            CastKind::Upcast => "upcast",
            CastKind::RawPointerToRef => "raw_pointer_to_ref",
            CastKind::AddressToPointer => "address_to_pointer",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<CastKind> {
        match s {
            "unchecked_bitwise_cast" => Some(CastKind::UncheckedBitwise),
            "unchecked_ref_cast" => Some(CastKind::UncheckedRef),
            "upcast" => Some(CastKind::Upcast),
            "raw_pointer_to_ref" => Some(CastKind::RawPointerToRef),
            "address_to_pointer" => Some(CastKind::AddressToPointer),
            _ => None,
        }
    }
}

/// The closed instruction set. Integer and float widths come from the
/// instruction's result type.
#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    Argument { index: u32 },
    IntegerLiteral { value: i128 },
    FloatLiteral { value: f64 },
    StringLiteral { value: String, encoding: StringEncoding },
    /// A type marker; the marked type is the instance type of the result.
    Metatype,
    Struct { operands: Vec<InstId> },
    StructExtract { operand: InstId, field: u32 },
    /// Optional/enum injection, with a payload for `some`-like cases.
    Enum { case: String, payload: Option<InstId> },
    Cast { kind: CastKind, operand: InstId },
    GlobalAddr { global: String },
    GlobalValue { global: String },
    /// Static-initializer aggregate; `tail` are its trailing elements.
    Object { tail: Vec<InstId> },
    AllocStack,
    /// Heap buffer with `count` tail elements.
    AllocRef { count: InstId },
    RefTailAddr { operand: InstId },
    IndexAddr { base: InstId, index: InstId },
    Store { src: InstId, dest: InstId },
    /// A primitive call; tensor operations are builtins with encoded names.
    Builtin { name: String, operands: Vec<InstId> },
    Apply { callee: String, args: Vec<InstId> },
    TupleExtract { operand: InstId, index: u32 },
    ReleaseValue { operand: InstId },
    Return { operand: Option<InstId> },
}

impl InstKind {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            InstKind::Argument { .. } => "argument",
            InstKind::IntegerLiteral { .. } => "integer_literal",
            InstKind::FloatLiteral { .. } => "float_literal",
            InstKind::StringLiteral { .. } => "string_literal",
            InstKind::Metatype => "metatype",
            InstKind::Struct { .. } => "struct",
            InstKind::StructExtract { .. } => "struct_extract",
            InstKind::Enum { .. } => "enum",
            InstKind::Cast { kind, .. } => kind.mnemonic(),
            InstKind::GlobalAddr { .. } => "global_addr",
            InstKind::GlobalValue { .. } => "global_value",
            InstKind::Object { .. } => "object",
            InstKind::AllocStack => "alloc_stack",
            InstKind::AllocRef { .. } => "alloc_ref",
            InstKind::RefTailAddr { .. } => "ref_tail_addr",
            InstKind::IndexAddr { .. } => "index_addr",
            InstKind::Store { .. } => "store",
            InstKind::Builtin { .. } => "builtin",
            InstKind::Apply { .. } => "apply",
            InstKind::TupleExtract { .. } => "tuple_extract",
            InstKind::ReleaseValue { .. } => "release_value",
            InstKind::Return { .. } => "return",
        }
    }

    /// Whether the instruction defines a value that may be referenced.
    pub fn has_result(&self) -> bool {
        !matches!(
            self,
            InstKind::Store { .. } | InstKind::ReleaseValue { .. } | InstKind::Return { .. }
        )
    }

    /// Operand values in order. A value used twice appears twice.
    pub fn operands(&self) -> Vec<InstId> {
        match self {
            InstKind::Argument { .. }
            | InstKind::IntegerLiteral { .. }
            | InstKind::FloatLiteral { .. }
            | InstKind::StringLiteral { .. }
            | InstKind::Metatype
            | InstKind::GlobalAddr { .. }
            | InstKind::GlobalValue { .. }
            | InstKind::AllocStack => Vec::new(),
            InstKind::Struct { operands } | InstKind::Builtin { operands, .. } => operands.clone(),
            InstKind::Object { tail } => tail.clone(),
            InstKind::Apply { args, .. } => args.clone(),
            InstKind::StructExtract { operand, .. }
            | InstKind::Cast { operand, .. }
            | InstKind::RefTailAddr { operand }
            | InstKind::TupleExtract { operand, .. }
            | InstKind::ReleaseValue { operand } => vec![*operand],
            InstKind::Enum { payload, .. } => payload.iter().copied().collect(),
            InstKind::AllocRef { count } => vec![*count],
            InstKind::IndexAddr { base, index } => vec![*base, *index],
            InstKind::Store { src, dest } => vec![*src, *dest],
            InstKind::Return { operand } => operand.iter().copied().collect(),
        }
    }

    fn operands_mut(&mut self) -> Vec<&mut InstId> {
        match self {
            InstKind::Argument { .. }
            | InstKind::IntegerLiteral { .. }
            | InstKind::FloatLiteral { .. }
            | InstKind::StringLiteral { .. }
            | InstKind::Metatype
            | InstKind::GlobalAddr { .. }
            | InstKind::GlobalValue { .. }
            | InstKind::AllocStack => Vec::new(),
            InstKind::Struct { operands } | InstKind::Builtin { operands, .. } => {
                operands.iter_mut().collect()
            }
            InstKind::Object { tail } => tail.iter_mut().collect(),
            InstKind::Apply { args, .. } => args.iter_mut().collect(),
            InstKind::StructExtract { operand, .. }
            | InstKind::Cast { operand, .. }
            | InstKind::RefTailAddr { operand }
            | InstKind::TupleExtract { operand, .. }
            | InstKind::ReleaseValue { operand } => vec![operand],
            InstKind::Enum { payload, .. } => payload.iter_mut().collect(),
            InstKind::AllocRef { count } => vec![count],
            InstKind::IndexAddr { base, index } => vec![base, index],
            InstKind::Store { src, dest } => vec![src, dest],
            InstKind::Return { operand } => operand.iter_mut().collect(),
        }
    }
}

/// An arena slot.
#[derive(Debug, Clone)]
pub struct InstData {
    pub kind: InstKind,
    pub ty: Type,
    pub loc: DebugLoc,
}

/// A global variable. `init` is the detached instruction producing its
/// static initializer, if it has one.
#[derive(Debug, Clone)]
pub struct Global {
    pub name: String,
    pub init: Option<InstId>,
}

// ── Function ────────────────────────────────────────────────────────────────

/// A function body in arena form.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    insts: Vec<InstData>,
    attached: Vec<bool>,
    body: Vec<InstId>,
    scopes: Vec<Scope>,
    globals: Vec<Global>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            insts: Vec::new(),
            attached: Vec::new(),
            body: Vec::new(),
            scopes: Vec::new(),
            globals: Vec::new(),
        }
    }

    fn alloc(&mut self, kind: InstKind, ty: Type, loc: DebugLoc, attached: bool) -> InstId {
        let id = InstId(self.insts.len() as u32);
        self.insts.push(InstData { kind, ty, loc });
        self.attached.push(attached);
        id
    }

    /// Append an instruction to the end of the body.
    pub fn push(&mut self, kind: InstKind, ty: Type, loc: DebugLoc) -> InstId {
        let id = self.alloc(kind, ty, loc, true);
        self.body.push(id);
        id
    }

    /// Insert an instruction immediately before `anchor`. Appends when
    /// `anchor` is not in the body.
    pub fn insert_before(
        &mut self,
        anchor: InstId,
        kind: InstKind,
        ty: Type,
        loc: DebugLoc,
    ) -> InstId {
        let id = self.alloc(kind, ty, loc, true);
        match self.body.iter().position(|&b| b == anchor) {
            Some(pos) => self.body.insert(pos, id),
            None => self.body.push(id),
        }
        id
    }

    /// Add an instruction that is not part of the body (global initializers).
    pub fn add_detached(&mut self, kind: InstKind, ty: Type) -> InstId {
        self.alloc(kind, ty, DebugLoc::default(), false)
    }

    /// Copy a detached operand-free instruction into the body before `anchor`,
    /// taking the anchor's location.
    pub fn clone_before(&mut self, source: InstId, anchor: InstId) -> InstId {
        let data = self.inst(source).clone();
        let loc = self.loc(anchor).clone();
        self.insert_before(anchor, data.kind, data.ty, loc)
    }

    pub fn inst(&self, id: InstId) -> &InstData {
        &self.insts[id.index()]
    }

    pub fn kind(&self, id: InstId) -> &InstKind {
        &self.inst(id).kind
    }

    pub fn ty(&self, id: InstId) -> &Type {
        &self.inst(id).ty
    }

    pub fn loc(&self, id: InstId) -> &DebugLoc {
        &self.inst(id).loc
    }

    pub fn is_attached(&self, id: InstId) -> bool {
        self.attached.get(id.index()).copied().unwrap_or(false)
    }

    /// Attached instructions in program order.
    pub fn body(&self) -> &[InstId] {
        &self.body
    }

    pub fn arena_len(&self) -> usize {
        self.insts.len()
    }

    /// Body instructions using `value`, once per use.
    pub fn users(&self, value: InstId) -> Vec<InstId> {
        let mut users = Vec::new();
        for &id in &self.body {
            for op in self.kind(id).operands() {
                if op == value {
                    users.push(id);
                }
            }
        }
        users
    }

    /// The only user of `value` satisfying `pred`, if exactly one exists.
    /// Users not satisfying `pred` are ignored.
    pub fn single_user_where(
        &self,
        value: InstId,
        pred: impl Fn(&InstKind) -> bool,
    ) -> Option<InstId> {
        let mut found = None;
        for user in self.users(value) {
            if pred(self.kind(user)) {
                if found.is_some() {
                    return None;
                }
                found = Some(user);
            }
        }
        found
    }

    /// The user of `value` if it has exactly one use.
    pub fn single_use(&self, value: InstId) -> Option<InstId> {
        match self.users(value).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Retarget every operand edge in the body from `old` to `new`.
    pub fn replace_all_uses(&mut self, old: InstId, new: InstId) {
        for i in 0..self.body.len() {
            let id = self.body[i];
            for op in self.insts[id.index()].kind.operands_mut() {
                if *op == old {
                    *op = new;
                }
            }
        }
    }

    /// Remove an instruction from the body. Its arena slot remains.
    pub fn erase(&mut self, id: InstId) {
        self.body.retain(|&b| b != id);
        if let Some(flag) = self.attached.get_mut(id.index()) {
            *flag = false;
        }
    }

    pub fn add_scope(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.index())
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn add_global(&mut self, global: Global) {
        self.globals.push(global);
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn globals(&self) -> &[Global] {
        &self.globals
    }
}

/// A unit of textual IR: one or more functions.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub functions: Vec<Function>,
}

impl Module {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

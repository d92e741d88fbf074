// diag.rs — Unified diagnostics model
//
// Provides the diagnostic types shared by the textual front end and the
// tensor-op pass. Only phases with context (building, validation, factory
// lowering, decoding) create diagnostics; resolvers never do.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ir::SourceLoc;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0100`).
///
/// Codes are `&'static str` constants defined in the `codes` module. Once
/// assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // ── Textual IR (E00xx) ──
    pub const E0001: DiagCode = DiagCode("E0001"); // syntax error
    pub const E0002: DiagCode = DiagCode("E0002"); // use of undefined value
    pub const E0003: DiagCode = DiagCode("E0003"); // value redefined
    pub const E0004: DiagCode = DiagCode("E0004"); // missing or ill-formed type annotation
    pub const E0005: DiagCode = DiagCode("E0005"); // unknown scope

    // ── Operation structure (E01xx): fatal for the function ──
    pub const E0100: DiagCode = DiagCode("E0100"); // invalid operand class suffix
    pub const E0101: DiagCode = DiagCode("E0101"); // operand count mismatch
    pub const E0102: DiagCode = DiagCode("E0102"); // input operand has unrecognized type

    // ── Attribute constants (E02xx): reported, pass continues ──
    pub const E0200: DiagCode = DiagCode("E0200"); // attribute requires a constant
    pub const E0201: DiagCode = DiagCode("E0201"); // tensor literal / shape arity mismatch
    pub const E0202: DiagCode = DiagCode("E0202"); // tensor shape missing, invalid or non-constant
}

// ── Related location ─────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedLoc {
    pub loc: SourceLoc,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A compiler error. `loc` is the best user-facing location available;
/// generated code may have none.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub loc: Option<SourceLoc>,
    pub message: String,
    pub hint: Option<String>,
    pub related: Vec<RelatedLoc>,
}

impl Diagnostic {
    /// Create an error with no code, hint or related locations.
    pub fn error(loc: Option<SourceLoc>, message: impl Into<String>) -> Self {
        Self {
            code: None,
            loc,
            message: message.into(),
            hint: None,
            related: Vec::new(),
        }
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a related location.
    pub fn with_related(mut self, loc: SourceLoc, label: impl Into<String>) -> Self {
        self.related.push(RelatedLoc {
            loc,
            label: label.into(),
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.loc {
            write!(f, "{}: ", loc)?;
        }
        if let Some(code) = &self.code {
            write!(f, "error[{}]: {}", code, self.message)?;
        } else {
            write!(f, "error: {}", self.message)?;
        }
        for related in &self.related {
            write!(f, "\n  note: {}: {}", related.loc, related.label)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// True if any diagnostic was reported; every diagnostic is an error.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    !diags.is_empty()
}

// id.rs — Stable arena identifiers for the tensor-op IR
//
// Instructions and debug scopes live in per-function arenas that are never
// compacted. An id stays valid for the lifetime of its function, including
// after the instruction it names has been erased from the body order, so
// rewrites can hold ids across replace-all-uses without dangling.

use std::fmt;

/// Stable identifier for an instruction (and the value it produces).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

/// Stable identifier for a debug scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl InstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

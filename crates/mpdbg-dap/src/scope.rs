//! Scope references: `frame_id * 1000 + kind`, kept below the cache id range.
use std::fmt;

use crate::cache::VARREF_COMPLEX_BASE;

const FRAME_STRIDE: i64 = 1000;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ScopeKind {
    Locals = 1,
    Globals = 2,
    /// Dunder-named locals, folded out of the `Locals` listing.
    LocalsSpecial = 3,
    /// Dunder-named globals, folded out of the `Globals` listing.
    GlobalsSpecial = 4,
}

impl ScopeKind {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ScopeKind::Locals),
            2 => Some(ScopeKind::Globals),
            3 => Some(ScopeKind::LocalsSpecial),
            4 => Some(ScopeKind::GlobalsSpecial),
            _ => None,
        }
    }

    pub fn is_global(self) -> bool {
        matches!(self, ScopeKind::Globals | ScopeKind::GlobalsSpecial)
    }

    pub fn is_special(self) -> bool {
        matches!(self, ScopeKind::LocalsSpecial | ScopeKind::GlobalsSpecial)
    }

    /// The kind listing the special bindings of this scope's namespace.
    pub fn special(self) -> Self {
        if self.is_global() {
            ScopeKind::GlobalsSpecial
        } else {
            ScopeKind::LocalsSpecial
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeKind::Locals => "Locals",
            ScopeKind::Globals => "Globals",
            ScopeKind::LocalsSpecial | ScopeKind::GlobalsSpecial => "Special",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ScopeRef {
    pub frame_id: i64,
    pub kind: ScopeKind,
}

impl ScopeRef {
    /// Highest frame id whose scopes still encode below [`VARREF_COMPLEX_BASE`].
    pub const MAX_FRAME_ID: i64 = VARREF_COMPLEX_BASE / FRAME_STRIDE - 1;

    /// Returns `None` when the frame id cannot be encoded without colliding
    /// with cache references.
    pub fn new(frame_id: i64, kind: ScopeKind) -> Option<Self> {
        (0..=Self::MAX_FRAME_ID)
            .contains(&frame_id)
            .then_some(Self { frame_id, kind })
    }

    pub fn encode(self) -> i64 {
        self.frame_id * FRAME_STRIDE + self.kind as i64
    }

    pub fn decode(reference: i64) -> Option<Self> {
        if !(1..VARREF_COMPLEX_BASE).contains(&reference) {
            return None;
        }
        let kind = ScopeKind::from_code(reference % FRAME_STRIDE)?;
        Some(Self {
            frame_id: reference / FRAME_STRIDE,
            kind,
        })
    }

    pub fn special(self) -> Self {
        Self {
            frame_id: self.frame_id,
            kind: self.kind.special(),
        }
    }
}

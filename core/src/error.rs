//! Compiler diagnostics. These are plain values, never control flow: every
//! malformed input is turned into a [`Diagnostic`] and accumulated, never
//! thrown (spec.md §7). An internal invariant violation (a genuine compiler
//! bug, not a user error) still panics — see the design notes in
//! `SPEC_FULL.md` for the boundary between the two.

use crate::util::Pos;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Which pipeline stage produced a diagnostic.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Reserved: the lexer never fails (spec.md §4.1), so this variant is
    /// never actually constructed in normal operation.
    Tokenize,
    Parse,
    Analyze,
    /// Reserved: the emitter only ever runs over an analyzer-accepted
    /// program, so a codegen-phase diagnostic indicates a compiler bug
    /// rather than a user error and should never occur in practice.
    Codegen,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tokenize => "tokenize",
            Self::Parse => "parse",
            Self::Analyze => "analyze",
            Self::Codegen => "codegen",
        };
        write!(f, "{}", s)
    }
}

/// A single compiler diagnostic, carrying the source position it applies to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub phase: Phase,
    pub line: u32,
    pub column: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(phase: Phase, pos: Pos, message: impl Into<String>) -> Self {
        Self {
            phase,
            line: pos.line,
            column: pos.column,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error at {}:{}: {}",
            self.phase, self.line, self.column, self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}

/// An accumulator for diagnostics produced by a single pipeline stage.
/// Mirrors the teacher's `WithSource<E>` collection shape, flattened into the
/// single `Vec<Diagnostic>` that spec.md §6.1 specifies as the public output.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, phase: Phase, pos: Pos, message: impl Into<String>) {
        self.0.push(Diagnostic::new(phase, pos, message));
    }

    pub fn push_hint(
        &mut self,
        phase: Phase,
        pos: Pos,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.0.push(Diagnostic::new(phase, pos, message).with_hint(hint));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

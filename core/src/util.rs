//! Small helpers shared across the whole pipeline.

/// Runs the wrapped expression only when both `debug_assertions` are enabled
/// and the `DEBUG` environment variable is set to `"true"`. Used to trace the
/// value produced by each compiler pipeline stage without pulling in a
/// logging framework for a pure, single-shot compiler call.
///
/// ```
/// use rlang::debug;
/// debug!(println!("hello"));
/// ```
#[macro_export]
macro_rules! debug {
    ($arg:expr) => {
        #[cfg(debug_assertions)]
        {
            if let Ok(debug_val) = std::env::var("DEBUG") {
                if debug_val.to_lowercase().as_str() == "true" {
                    $arg
                }
            }
        }
    };
}

/// A 1-based source position, used by every stage from the lexer onward.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A source span, tracked from the first token of a construct to its last.
/// Diagnostics only ever report the start position (spec.md §6.1), but the
/// end position is kept around for tooling that wants to highlight a whole
/// construct.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    /// Builds a zero-width span at a single position, e.g. for an implicit
    /// node with no real source (a synthesized `init`).
    pub const fn point(pos: Pos) -> Self {
        Self { start: pos, end: pos }
    }

    /// Combines two spans into one that covers both.
    pub fn to(self, other: Span) -> Span {
        Span { start: self.start, end: other.end }
    }
}

/// Monotonically increasing id, minted once per expression AST node during
/// parsing. `AnalysisResult::expr_info` is keyed on this instead of node
/// identity, since the AST is a plain tree with no stable references (design
/// notes, "Cyclic AST / shared ownership").
pub type ExprId = u32;

#[derive(Debug, Default)]
pub struct ExprIdGen(ExprId);

impl ExprIdGen {
    pub fn next(&mut self) -> ExprId {
        let id = self.0;
        self.0 += 1;
        id
    }
}

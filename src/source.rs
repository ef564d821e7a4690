use std::fmt;
use std::ops::Range;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)] // Default for convenience
pub struct Span {
    pub start: usize, // Byte offset
    pub end: usize,   // Byte offset (exclusive)
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    // Helper to merge two spans (e.g., for parenthesized forms)
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn to_range(self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Where a token or AST node came from.
///
/// `row` is 1-indexed. `col` is the index of the fragment within its line
/// (parentheses and single whitespace characters count as fragments), not a
/// character offset. `span` holds the byte range in the full source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Position {
    pub row: usize,
    pub col: usize,
    pub span: Span,
}

impl Position {
    pub fn new(row: usize, col: usize, span: Span) -> Self {
        Position { row, col, span }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.row, self.col)
    }
}

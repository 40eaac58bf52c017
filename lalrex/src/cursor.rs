use crate::{Position, Span};

/// Tracks the lexer's position in the input.
///
/// The cursor is the only state the lexer needs between calls: it is created
/// per parse, advanced over every matched lexeme and never shared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexerCursor {
    pub pos: Position,
}

impl LexerCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cursor positioned at byte `offset` of `input`.
    pub fn at(input: &str, offset: usize) -> Self {
        Self {
            pos: Position::locate(input, offset),
        }
    }

    /// Byte offset of the cursor.
    #[inline]
    pub fn offset(&self) -> usize {
        self.pos.offset
    }

    /// Advance past `lexeme`, returning the span it covers.
    pub fn advance(&mut self, lexeme: &str) -> Span {
        let start = self.pos;
        for c in lexeme.chars() {
            self.pos.advance(c);
        }
        Span::new(start, self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_returns_covered_span() {
        let mut cursor = LexerCursor::new();
        let span = cursor.advance("ab\n");
        assert_eq!(span.start, Position::new(0, 1, 1));
        assert_eq!(span.end, Position::new(3, 2, 1));
        let span = cursor.advance("cd");
        assert_eq!(span.range(), 3..5);
        assert_eq!(cursor.pos, Position::new(5, 2, 3));
    }

    #[test]
    fn at_locates_offset() {
        let cursor = LexerCursor::at("x\nyz", 3);
        assert_eq!(cursor.offset(), 3);
        assert_eq!(cursor.pos.line, 2);
        assert_eq!(cursor.pos.column, 2);

        let cursor = LexerCursor::at("é", 1);
        assert_eq!(cursor.offset(), 0);
    }
}

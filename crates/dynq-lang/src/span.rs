//! Byte ranges into an expression, for error reporting.

use std::ops::Range;

/// A half-open byte range `start..end` in an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// An empty span at `offset`, used for errors at the end of input.
    pub fn at(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The covered text, or `""` if the span does not fit `source`.
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.start..self.end).unwrap_or_default()
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_text() {
        let source = "#n0 BETWEEN :v0 AND :v1";
        let span = Span::from(4..11);
        assert_eq!(span.text(source), "BETWEEN");
        assert_eq!(span.len(), 7);

        assert!(Span::at(23).is_empty());
        assert_eq!(Span::new(20, 40).text(source), "");
    }
}

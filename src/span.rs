use std::ops::Range;

use miette::SourceSpan;

/// Position relative to start of source.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Idx(pub usize);

/// Holds a view into a source.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Debug)]
pub struct Span {
    start: Idx,
    len: usize,
}

impl Span {
    pub fn new(start: Idx, len: usize) -> Self {
        Span { start, len }
    }

    /// Span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        let start = self.start.0.min(other.start.0);
        let end = self.end().max(other.end());
        Span::new(Idx(start), end - start)
    }

    /// Move the span forward, used to turn a line-relative span into a source-relative one.
    pub fn shifted(self, by: usize) -> Span {
        Span::new(Idx(self.start.0 + by), self.len)
    }

    pub fn offs(&self) -> usize {
        self.start.0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn end(&self) -> usize {
        self.start.0 + self.len
    }

    pub fn as_range(&self) -> Range<usize> {
        self.offs()..self.end()
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_shift() {
        let a = Span::new(Idx(2), 3);
        let b = Span::new(Idx(8), 2);
        assert_eq!(a.to(b), Span::new(Idx(2), 8));
        assert_eq!(b.to(a), Span::new(Idx(2), 8));
        assert_eq!(a.shifted(10).as_range(), 12..15);
    }
}

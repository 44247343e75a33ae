//! Index of disjoint address intervals.

use std::collections::BTreeMap;
use std::fmt;

/// A half-open `[start, end)` range of addresses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Span {
    fn contains(self, addr: usize) -> bool {
        addr >= self.start && addr < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}..{:#x}]", self.start, self.end)
    }
}

/// Backing buffer extents seen so far during a scan.
///
/// The spans are pairwise disjoint and keyed by start address. Inserting a span that overlaps
/// known spans merges all of them into a single span covering the union. Buffers are seen in
/// no particular address order, so both operations are logarithmic in the number of spans.
#[derive(Clone, Debug, Default)]
pub(crate) struct SpanIndex {
    // start -> end
    spans: BTreeMap<usize, usize>,
}

impl SpanIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records `[start, start + len)` and returns the previously known spans it absorbed.
    ///
    /// The returned index is empty if the new span did not touch any known span.
    /// A zero-length span is ignored.
    pub(crate) fn insert(&mut self, start: usize, len: usize) -> Self {
        if len == 0 {
            return Self::new();
        }

        let mut merged = Span {
            start,
            end: start
                .checked_add(len)
                .expect("span extends past the end of the address space"),
        };

        // Touching endpoints count as overlap, so adjacent spans merge into one. Only the last
        // span starting before the new one can reach into it from below.
        let below = self
            .spans
            .range(..start)
            .next_back()
            .filter(|&(_, &known_end)| known_end >= start);

        let absorbed: BTreeMap<usize, usize> = below
            .into_iter()
            .chain(self.spans.range(start..=merged.end))
            .map(|(&known_start, &known_end)| (known_start, known_end))
            .collect();

        for (&known_start, &known_end) in &absorbed {
            self.spans.remove(&known_start);
            merged.start = merged.start.min(known_start);
            merged.end = merged.end.max(known_end);
        }

        self.spans.insert(merged.start, merged.end);

        Self { spans: absorbed }
    }

    /// Whether `addr` lies inside any known span.
    pub(crate) fn contains(&self, addr: usize) -> bool {
        self.spans
            .range(..=addr)
            .next_back()
            .is_some_and(|(&start, &end)| Span { start, end }.contains(addr))
    }

    pub(crate) fn len(&self) -> usize {
        self.spans.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = Span> {
        self.spans.iter().map(|(&start, &end)| Span { start, end })
    }
}

impl fmt::Display for SpanIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;

        for (index, span) in self.iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            write!(f, "{span}")?;
        }

        write!(f, "}}")
    }
}

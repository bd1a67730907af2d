//! Cursor scan protocol
//!
//! Engines walk their cursor from the first key and hand each raw
//! `(key, bytes)` pair to a visitor from this module. The visitor answers
//! with [`ControlFlow`] so the engine knows when to stop advancing.
//!
//! Two visitors exist:
//! - [`Slice`]: index-bounded slices for `keys` and `iterate`
//! - [`Filter`]: predicate filtering with early stop

use crate::error::{CairnError, Result};
use crate::record::{self, Record};
use std::ops::{ControlFlow, Range};

/// Resolve optional slice bounds against a snapshot entry count
///
/// `start` defaults to 0 and `end` to `count`. Fails with `OutOfRange`
/// when `end > count` or `start > end`.
pub fn resolve_slice(
    start: Option<usize>,
    end: Option<usize>,
    count: usize,
) -> Result<Range<usize>> {
    let start = start.unwrap_or(0);
    let end = end.unwrap_or(count);
    if end > count || start > end {
        return Err(CairnError::OutOfRange { start, end, count });
    }
    Ok(start..end)
}

/// One entry captured by a slice scan
///
/// The raw bytes are copied while the cursor sits on the entry, so
/// entries can be fetched in any order after the scan is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    raw: Vec<u8>,
}

impl Entry {
    pub fn new(key: Vec<u8>, raw: Vec<u8>) -> Self {
        Self { key, raw }
    }

    /// Decode the record for this entry
    pub fn fetch(&self) -> Result<Record> {
        record::decode(&self.raw)
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.key, self.raw)
    }
}

/// Entries returned by `iterate`, in engine key order
#[derive(Debug)]
pub struct Entries {
    inner: std::vec::IntoIter<Entry>,
}

impl Entries {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            inner: entries.into_iter(),
        }
    }
}

impl Iterator for Entries {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Entries {}

impl DoubleEndedIterator for Entries {
    fn next_back(&mut self) -> Option<Entry> {
        self.inner.next_back()
    }
}

/// Upper bound on slots reserved up front; an `end` may exceed the store
const PREALLOC_LIMIT: usize = 1024;

/// Visitor collecting entries whose position falls in a range
pub struct Slice<T> {
    range: Range<usize>,
    index: usize,
    out: Vec<T>,
    capture: fn(&[u8], &[u8]) -> T,
}

impl Slice<Vec<u8>> {
    /// Collect keys only
    pub fn keys(range: Range<usize>) -> Self {
        Self::new(range, |key, _| key.to_vec())
    }
}

impl Slice<Entry> {
    /// Collect keys and raw record bytes
    pub fn entries(range: Range<usize>) -> Self {
        Self::new(range, |key, raw| Entry::new(key.to_vec(), raw.to_vec()))
    }
}

impl<T> Slice<T> {
    fn new(range: Range<usize>, capture: fn(&[u8], &[u8]) -> T) -> Self {
        Self {
            out: Vec::with_capacity(range.len().min(PREALLOC_LIMIT)),
            range,
            index: 0,
            capture,
        }
    }

    pub fn visit(&mut self, key: &[u8], raw: &[u8]) -> ControlFlow<()> {
        if self.index >= self.range.end {
            return ControlFlow::Break(());
        }
        if self.index >= self.range.start {
            self.out.push((self.capture)(key, raw));
        }
        self.index += 1;
        if self.index >= self.range.end {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    /// Entries walked so far, skipped ones included
    pub fn visited(&self) -> usize {
        self.index
    }

    pub fn into_inner(self) -> Vec<T> {
        self.out
    }
}

/// Per-call context handed to filter predicates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterContext {
    /// Zero-based position of the current entry in key order
    pub index: usize,
    /// Set to `true` to end the scan after the current entry
    pub stop: bool,
}

/// One accepted filter entry
#[derive(Debug, Clone, PartialEq)]
pub struct FilterMatch {
    pub key: Vec<u8>,
    /// Present only when the filter was run with values
    pub record: Option<Record>,
}

/// Visitor running a predicate over each entry
pub struct Filter<F> {
    include_values: bool,
    predicate: F,
    ctx: FilterContext,
    matches: Vec<FilterMatch>,
}

impl<F> Filter<F>
where
    F: FnMut(&[u8], Option<&Record>, &mut FilterContext) -> bool,
{
    pub fn new(include_values: bool, predicate: F) -> Self {
        Self {
            include_values,
            predicate,
            ctx: FilterContext::default(),
            matches: Vec::new(),
        }
    }

    pub fn visit(&mut self, key: &[u8], raw: &[u8]) -> Result<ControlFlow<()>> {
        let record = if self.include_values {
            Some(record::decode(raw)?)
        } else {
            None
        };

        if (self.predicate)(key, record.as_ref(), &mut self.ctx) {
            self.matches.push(FilterMatch {
                key: key.to_vec(),
                record,
            });
        }

        self.ctx.index += 1;
        Ok(if self.ctx.stop {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        })
    }

    pub fn visited(&self) -> usize {
        self.ctx.index
    }

    pub fn into_matches(self) -> Vec<FilterMatch> {
        self.matches
    }
}

//! The contracts this crate consumes from the index it aggregates over.
//!
//! The inverted index, codecs and query execution live elsewhere; the
//! counting engines only ever see per-segment doc-values cursors and the
//! per-segment bitsets of matching documents harvested by a collector.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use self::hits::{FacetHits, MatchingDocs};
use crate::{DocumentId, Result};

mod hits;

/// The kinds of doc-values the facet engines read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocValuesType {
    SortedSet,
    Binary,
}

impl fmt::Display for DocValuesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SortedSet => f.write_str("sorted-set"),
            Self::Binary => f.write_str("binary"),
        }
    }
}

/// A per-segment dictionary-coded set of labels, with a per-document
/// cursor over the ordinals of that dictionary.
///
/// Ordinals are dense, start at zero and follow the lexicographic order of
/// the UTF-8 label bytes. The cursor is stateful: position it with
/// [`advance_exact`](Self::advance_exact), then drain the current
/// document's ordinals with [`next_ord`](Self::next_ord).
pub trait SortedSetDocValues {
    /// The number of unique labels in this segment's dictionary.
    fn value_count(&self) -> u64;

    /// The label bytes of the given ordinal.
    fn lookup_ord(&mut self, ord: u32) -> Result<Vec<u8>>;

    /// The ordinal of the given label bytes, or `None` if absent.
    fn lookup_term(&mut self, key: &[u8]) -> Result<Option<u32>>;

    /// Positions the cursor on `doc`, returns whether the document has a
    /// value. Targets must be non-decreasing across calls.
    fn advance_exact(&mut self, doc: DocumentId) -> Result<bool>;

    /// The next ordinal of the current document, ascending, or `None`
    /// once the document is exhausted.
    fn next_ord(&mut self) -> Result<Option<u32>>;
}

/// A [`SortedSetDocValues`] with an empty dictionary and no documents,
/// standing in for segments that never indexed the field.
#[derive(Debug, Default)]
pub struct EmptySortedSet;

impl SortedSetDocValues for EmptySortedSet {
    fn value_count(&self) -> u64 {
        0
    }

    fn lookup_ord(&mut self, ord: u32) -> Result<Vec<u8>> {
        unreachable!("ordinal {ord} looked up in an empty dictionary")
    }

    fn lookup_term(&mut self, _key: &[u8]) -> Result<Option<u32>> {
        Ok(None)
    }

    fn advance_exact(&mut self, _doc: DocumentId) -> Result<bool> {
        Ok(false)
    }

    fn next_ord(&mut self) -> Result<Option<u32>> {
        Ok(None)
    }
}

/// A per-segment, per-document opaque byte payload.
pub trait BinaryDocValues {
    /// Positions the cursor on `doc`, returns whether the document has a
    /// value. Targets must be non-decreasing across calls.
    fn advance_exact(&mut self, doc: DocumentId) -> Result<bool>;

    /// The payload of the current document. It is illegal to call this
    /// after `advance_exact` returned `false`.
    fn binary_value(&self) -> Result<&[u8]>;
}

/// One segment of an index, able to open fresh doc-values cursors.
pub trait LeafReader: Send + Sync {
    /// One past the highest document id of this segment.
    fn max_doc(&self) -> u32;

    /// Opens a sorted-set cursor for `field`, `None` when the field has no
    /// sorted-set doc-values in this segment.
    fn sorted_set_doc_values(&self, field: &str) -> Result<Option<Box<dyn SortedSetDocValues + '_>>>;

    /// Opens a binary cursor for `field`, `None` when the field has no
    /// binary doc-values in this segment.
    fn binary_doc_values(&self, field: &str) -> Result<Option<Box<dyn BinaryDocValues + '_>>>;

    /// The doc-values kind `field` was indexed with, if any. Only used to
    /// produce precise error messages.
    fn doc_values_type(&self, field: &str) -> Option<DocValuesType>;
}

/// A segment and its position within the owning reader.
#[derive(Clone)]
pub struct SegmentContext {
    /// The index of this segment in [`IndexReader::segments`].
    pub ord: usize,
    /// The number of documents in the segments preceding this one.
    pub doc_base: DocumentId,
    pub reader: Arc<dyn LeafReader>,
}

impl fmt::Debug for SegmentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentContext")
            .field("ord", &self.ord)
            .field("doc_base", &self.doc_base)
            .field("max_doc", &self.reader.max_doc())
            .finish()
    }
}

/// Identifies a reader instance for the lifetime of the process.
///
/// Reader states and hit lists both remember the key of the reader they
/// were built from, which lets the engines reject mismatched pairs eagerly
/// instead of silently producing wrong counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderKey(u64);

/// An ordered collection of segments behaving as a single point-in-time
/// view over an index.
#[derive(Debug)]
pub struct IndexReader {
    key: ReaderKey,
    segments: Vec<SegmentContext>,
}

impl IndexReader {
    pub fn new(readers: Vec<Arc<dyn LeafReader>>) -> IndexReader {
        static NEXT_READER_KEY: AtomicU64 = AtomicU64::new(0);

        let mut doc_base = 0;
        let mut segments = Vec::with_capacity(readers.len());
        for (ord, reader) in readers.into_iter().enumerate() {
            let max_doc = reader.max_doc();
            segments.push(SegmentContext { ord, doc_base, reader });
            doc_base += max_doc;
        }

        let key = ReaderKey(NEXT_READER_KEY.fetch_add(1, Ordering::Relaxed));
        IndexReader { key, segments }
    }

    pub fn key(&self) -> ReaderKey {
        self.key
    }

    pub fn segments(&self) -> &[SegmentContext] {
        &self.segments
    }

    /// The total number of documents across all segments.
    pub fn max_doc(&self) -> u32 {
        self.segments.iter().map(|segment| segment.reader.max_doc()).sum()
    }
}

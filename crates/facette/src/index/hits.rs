//! The collector contract: per-segment bitsets of matching documents.

use roaring::RoaringBitmap;

use super::{IndexReader, ReaderKey, SegmentContext};
use crate::{Result, UserError};

/// The matching documents of one segment, as harvested by a collector.
#[derive(Debug, Clone)]
pub struct MatchingDocs {
    pub context: SegmentContext,
    /// Segment-local ids of the matching documents.
    pub docs: RoaringBitmap,
    pub total_hits: u64,
}

impl MatchingDocs {
    pub fn new(context: SegmentContext, docs: RoaringBitmap) -> MatchingDocs {
        let total_hits = docs.len();
        MatchingDocs { context, docs, total_hits }
    }
}

/// The full harvest of a query: one [`MatchingDocs`] per visited segment,
/// tagged with the key of the reader the query ran against.
#[derive(Debug, Clone)]
pub struct FacetHits {
    reader_key: ReaderKey,
    segments: Vec<MatchingDocs>,
}

impl FacetHits {
    pub fn new(reader: &IndexReader, segments: Vec<MatchingDocs>) -> FacetHits {
        FacetHits { reader_key: reader.key(), segments }
    }

    /// Hits matching every document of the reader.
    pub fn match_all(reader: &IndexReader) -> FacetHits {
        let segments = reader
            .segments()
            .iter()
            .map(|context| {
                let max_doc = context.reader.max_doc();
                MatchingDocs::new(context.clone(), (0..max_doc).collect())
            })
            .collect();
        FacetHits { reader_key: reader.key(), segments }
    }

    pub fn reader_key(&self) -> ReaderKey {
        self.reader_key
    }

    pub fn segments(&self) -> &[MatchingDocs] {
        &self.segments
    }

    /// The number of matching documents across all segments.
    pub fn total_hits(&self) -> u64 {
        self.segments.iter().map(|segment| segment.total_hits).sum()
    }

    pub(crate) fn check_reader(&self, expected: ReaderKey) -> Result<()> {
        if self.reader_key != expected {
            return Err(UserError::ReaderMismatch.into());
        }
        Ok(())
    }
}

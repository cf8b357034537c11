//! The range-on-range counting engine.
//!
//! Documents carry one or more packed boxes; the engine counts, for every
//! query range, the documents owning at least one box in the requested
//! relation with it. All comparisons happen on the packed bytes, whose
//! unsigned order matches the numeric order of every supported type.

use super::{DoubleRange, FloatRange, IntRange, LongRange, QueryType};
use crate::index::{BinaryDocValues, FacetHits, MatchingDocs};
use crate::result::TopEntries;
use crate::{DocumentId, FacetResult, InternalError, LabelAndValue, Result, UserError};

/// Per-query, per-range counts over one range-valued field.
pub struct RangeOnRangeFacetCounts {
    field: String,
    query_type: QueryType,
    labels: Vec<String>,
    packed_ranges: Vec<Vec<u8>>,
    dims: usize,
    encoded_value_bytes: usize,
    counts: Vec<u32>,
    tot_count: u64,
}

impl RangeOnRangeFacetCounts {
    /// Counts hits against `i64` query ranges.
    pub fn new_long(
        field: impl Into<String>,
        hits: &FacetHits,
        query_type: QueryType,
        fast_match: Option<&FacetHits>,
        ranges: Vec<LongRange>,
    ) -> Result<RangeOnRangeFacetCounts> {
        let items = encode_ranges(&ranges, |range| (range.label.clone(), range.dims()))?;
        Self::new_inner(field.into(), hits, query_type, fast_match, LongRange::ENCODED_VALUE_BYTES, items)
    }

    /// Counts hits against `i32` query ranges.
    pub fn new_int(
        field: impl Into<String>,
        hits: &FacetHits,
        query_type: QueryType,
        fast_match: Option<&FacetHits>,
        ranges: Vec<IntRange>,
    ) -> Result<RangeOnRangeFacetCounts> {
        let items = encode_ranges(&ranges, |range| (range.label.clone(), range.dims()))?;
        Self::new_inner(field.into(), hits, query_type, fast_match, IntRange::ENCODED_VALUE_BYTES, items)
    }

    /// Counts hits against `f64` query ranges.
    pub fn new_double(
        field: impl Into<String>,
        hits: &FacetHits,
        query_type: QueryType,
        fast_match: Option<&FacetHits>,
        ranges: Vec<DoubleRange>,
    ) -> Result<RangeOnRangeFacetCounts> {
        let items = encode_ranges(&ranges, |range| (range.label.clone(), range.dims()))?;
        Self::new_inner(field.into(), hits, query_type, fast_match, DoubleRange::ENCODED_VALUE_BYTES, items)
    }

    /// Counts hits against `f32` query ranges.
    pub fn new_float(
        field: impl Into<String>,
        hits: &FacetHits,
        query_type: QueryType,
        fast_match: Option<&FacetHits>,
        ranges: Vec<FloatRange>,
    ) -> Result<RangeOnRangeFacetCounts> {
        let items = encode_ranges(&ranges, |range| (range.label.clone(), range.dims()))?;
        Self::new_inner(field.into(), hits, query_type, fast_match, FloatRange::ENCODED_VALUE_BYTES, items)
    }

    fn new_inner(
        field: String,
        hits: &FacetHits,
        query_type: QueryType,
        fast_match: Option<&FacetHits>,
        encoded_value_bytes: usize,
        items: Vec<(String, Vec<u8>, usize)>,
    ) -> Result<RangeOnRangeFacetCounts> {
        if let Some(fast_match) = fast_match {
            if fast_match.reader_key() != hits.reader_key() {
                return Err(UserError::ReaderMismatch.into());
            }
        }

        let dims = items.first().map(|(_, _, dims)| *dims).unwrap_or(0);
        let mut labels = Vec::with_capacity(items.len());
        let mut packed_ranges = Vec::with_capacity(items.len());
        for (label, packed, _) in items {
            labels.push(label);
            packed_ranges.push(packed);
        }

        let mut this = RangeOnRangeFacetCounts {
            field,
            query_type,
            counts: vec![0; labels.len()],
            labels,
            packed_ranges,
            dims,
            encoded_value_bytes,
            tot_count: 0,
        };
        for matching in hits.segments() {
            this.count_segment(matching, fast_match)?;
        }
        Ok(this)
    }

    fn count_segment(
        &mut self,
        matching: &MatchingDocs,
        fast_match: Option<&FacetHits>,
    ) -> Result<()> {
        if self.packed_ranges.is_empty() {
            return Ok(());
        }
        let Some(mut dv) = matching.context.reader.binary_doc_values(&self.field)? else {
            return Ok(());
        };

        self.tot_count += matching.total_hits;
        let mut missing: u64 = 0;

        // Documents ruled out by the fast-match approximation cannot
        // match any range, account them as missing right away.
        let intersected;
        let docs = match fast_match {
            Some(fast_match) => {
                match fast_match
                    .segments()
                    .iter()
                    .find(|fast| fast.context.ord == matching.context.ord)
                {
                    Some(fast) => {
                        intersected = &matching.docs & &fast.docs;
                        missing += matching.docs.len() - intersected.len();
                        &intersected
                    }
                    None => {
                        self.tot_count -= matching.total_hits;
                        return Ok(());
                    }
                }
            }
            None => &matching.docs,
        };

        for doc in docs {
            if !self.count_doc(dv.as_mut(), doc)? {
                missing += 1;
            }
        }
        self.tot_count -= missing;
        Ok(())
    }

    /// Counts one document, returns whether any range matched it.
    fn count_doc(&mut self, dv: &mut dyn BinaryDocValues, doc: DocumentId) -> Result<bool> {
        if !dv.advance_exact(doc)? {
            return Ok(false);
        }
        let packed = dv.binary_value()?;
        let box_bytes = 2 * self.dims * self.encoded_value_bytes;
        if packed.len() % box_bytes != 0 {
            return Err(InternalError::InvalidRangePayload {
                field: self.field.clone(),
                reason: "the payload does not hold a whole number of boxes",
            }
            .into());
        }

        let mut matched_any = false;
        for (index, query) in self.packed_ranges.iter().enumerate() {
            let matches = packed.chunks_exact(box_bytes).any(|doc_box| {
                relation_matches(self.query_type, query, doc_box, self.dims, self.encoded_value_bytes)
            });
            if matches {
                self.counts[index] += 1;
                matched_any = true;
            }
        }
        Ok(matched_any)
    }

    /// The number of documents matching at least one range.
    pub fn total_count(&self) -> u64 {
        self.tot_count
    }

    /// The top `top_n` ranges by count descending, ties by label
    /// ascending. Ranges that matched nothing are not reported.
    pub fn top_children(&self, top_n: usize, dim: &str) -> Result<FacetResult> {
        if top_n == 0 {
            return Err(UserError::InvalidTopN(top_n).into());
        }
        self.check_dim(dim)?;

        let mut top = TopEntries::new(top_n);
        let mut child_count = 0;
        for (label, &count) in self.labels.iter().zip(&self.counts) {
            if count > 0 {
                child_count += 1;
                top.push(u64::from(count), label.clone());
            }
        }

        let label_values = top
            .into_sorted()
            .into_iter()
            .map(|(value, label)| LabelAndValue { label, value })
            .collect();
        Ok(FacetResult {
            dim: dim.to_string(),
            path: Vec::new(),
            value: self.tot_count,
            child_count,
            label_values,
        })
    }

    /// Every range with its count, zeros included, in the order the
    /// ranges were supplied.
    pub fn all_children(&self, dim: &str) -> Result<FacetResult> {
        self.check_dim(dim)?;

        let label_values: Vec<LabelAndValue> = self
            .labels
            .iter()
            .zip(&self.counts)
            .map(|(label, &count)| LabelAndValue { label: label.clone(), value: u64::from(count) })
            .collect();
        let child_count = self.counts.iter().filter(|&&count| count > 0).count() as u32;
        Ok(FacetResult {
            dim: dim.to_string(),
            path: Vec::new(),
            value: self.tot_count,
            child_count,
            label_values,
        })
    }

    /// The single-dimension variant of [`top_children`](Self::top_children).
    pub fn all_dims(&self, top_n: usize) -> Result<Vec<FacetResult>> {
        let field = self.field.clone();
        Ok(vec![self.top_children(top_n, &field)?])
    }

    fn check_dim(&self, dim: &str) -> Result<()> {
        if dim != self.field {
            return Err(UserError::UnexpectedDimension {
                dim: dim.to_string(),
                field: self.field.clone(),
            }
            .into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for RangeOnRangeFacetCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeOnRangeFacetCounts")
            .field("field", &self.field)
            .field("query_type", &self.query_type)
            .field("ranges", &self.labels.len())
            .field("tot_count", &self.tot_count)
            .finish()
    }
}

fn encode_ranges<R>(
    ranges: &[R],
    parts: impl Fn(&R) -> (String, usize),
) -> Result<Vec<(String, Vec<u8>, usize)>>
where
    R: RangeEncode,
{
    let mut items = Vec::with_capacity(ranges.len());
    let mut expected_dims = None;
    for range in ranges {
        let (label, dims) = parts(range);
        match expected_dims {
            None => expected_dims = Some(dims),
            Some(expected) if expected != dims => {
                return Err(UserError::DimensionMismatch { expected, actual: dims }.into());
            }
            Some(_) => (),
        }
        let mut packed = Vec::new();
        range.encode_packed(&mut packed);
        items.push((label, packed, dims));
    }
    Ok(items)
}

trait RangeEncode {
    fn encode_packed(&self, buf: &mut Vec<u8>);
}

impl RangeEncode for LongRange {
    fn encode_packed(&self, buf: &mut Vec<u8>) {
        self.encode_into(buf)
    }
}

impl RangeEncode for IntRange {
    fn encode_packed(&self, buf: &mut Vec<u8>) {
        self.encode_into(buf)
    }
}

impl RangeEncode for DoubleRange {
    fn encode_packed(&self, buf: &mut Vec<u8>) {
        self.encode_into(buf)
    }
}

impl RangeEncode for FloatRange {
    fn encode_packed(&self, buf: &mut Vec<u8>) {
        self.encode_into(buf)
    }
}

fn relation_matches(
    query_type: QueryType,
    query: &[u8],
    doc_box: &[u8],
    dims: usize,
    encoded_value_bytes: usize,
) -> bool {
    match query_type {
        QueryType::Intersects => intersects(query, doc_box, dims, encoded_value_bytes),
        QueryType::Contains => contains(query, doc_box, dims, encoded_value_bytes),
        QueryType::Within => within(query, doc_box, dims, encoded_value_bytes),
        QueryType::Crosses => {
            intersects(query, doc_box, dims, encoded_value_bytes)
                && !within(query, doc_box, dims, encoded_value_bytes)
                && !contains(query, doc_box, dims, encoded_value_bytes)
        }
    }
}

fn dim_slices(packed: &[u8], dim: usize, dims: usize, bytes: usize) -> (&[u8], &[u8]) {
    let min_at = dim * bytes;
    let max_at = (dims + dim) * bytes;
    (&packed[min_at..min_at + bytes], &packed[max_at..max_at + bytes])
}

fn intersects(query: &[u8], doc_box: &[u8], dims: usize, bytes: usize) -> bool {
    for dim in 0..dims {
        let (query_min, query_max) = dim_slices(query, dim, dims, bytes);
        let (doc_min, doc_max) = dim_slices(doc_box, dim, dims, bytes);
        if query_min > doc_max || doc_min > query_max {
            return false;
        }
    }
    true
}

/// The document box contains the query box.
fn contains(query: &[u8], doc_box: &[u8], dims: usize, bytes: usize) -> bool {
    for dim in 0..dims {
        let (query_min, query_max) = dim_slices(query, dim, dims, bytes);
        let (doc_min, doc_max) = dim_slices(doc_box, dim, dims, bytes);
        if doc_min > query_min || query_max > doc_max {
            return false;
        }
    }
    true
}

/// The document box lies within the query box.
fn within(query: &[u8], doc_box: &[u8], dims: usize, bytes: usize) -> bool {
    for dim in 0..dims {
        let (query_min, query_max) = dim_slices(query, dim, dims, bytes);
        let (doc_min, doc_max) = dim_slices(doc_box, dim, dims, bytes);
        if query_min > doc_min || doc_max > query_max {
            return false;
        }
    }
    true
}

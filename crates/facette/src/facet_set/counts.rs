//! The facet-set counting engine.
//!
//! Walks the binary doc-values of a field whose payload holds one or more
//! packed tuples per document, runs every matcher over every tuple and
//! accumulates per-matcher counts.

use serde::Serialize;
use smallvec::{smallvec, SmallVec};

use super::{read_dims_header, FacetSetMatcher, BYTES_PER_DIM};
use crate::index::{FacetHits, MatchingDocs};
use crate::value_encoding::sortable_bytes_into_i64;
use crate::{FacetResult, InternalError, LabelAndValue, Result, UserError};

/// Whether tuples are decoded into longs once per tuple, or matched
/// directly on their packed bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CountMode {
    #[default]
    DecodedLongs,
    PackedBytes,
}

/// Per-query, per-matcher counts over one facet-set field.
pub struct MatchingFacetSetsCounts {
    field: String,
    matchers: Vec<Box<dyn FacetSetMatcher>>,
    counts: Vec<u32>,
    tot_count: u64,
    dims: usize,
}

impl MatchingFacetSetsCounts {
    /// Counts the given hits. All matchers must agree on the tuple width,
    /// which must also be the width the field was indexed with.
    pub fn new(
        field: impl Into<String>,
        hits: &FacetHits,
        mode: CountMode,
        matchers: Vec<Box<dyn FacetSetMatcher>>,
    ) -> Result<MatchingFacetSetsCounts> {
        let Some(first) = matchers.first() else {
            return Err(UserError::NoFacetSetMatchers.into());
        };
        let dims = first.dims();
        for matcher in &matchers {
            if matcher.dims() != dims {
                return Err(UserError::DimensionMismatch { expected: dims, actual: matcher.dims() }
                    .into());
            }
        }

        let mut this = MatchingFacetSetsCounts {
            field: field.into(),
            counts: vec![0; matchers.len()],
            matchers,
            tot_count: 0,
            dims,
        };
        let mut payload_dims = None;
        for matching in hits.segments() {
            this.count_segment(matching, mode, &mut payload_dims)?;
        }
        Ok(this)
    }

    fn count_segment(
        &mut self,
        matching: &MatchingDocs,
        mode: CountMode,
        payload_dims: &mut Option<usize>,
    ) -> Result<()> {
        // A field without binary doc-values counts nothing, it is not an
        // error.
        let Some(mut dv) = matching.context.reader.binary_doc_values(&self.field)? else {
            return Ok(());
        };

        let mut decoded: SmallVec<[i64; 4]> = smallvec![0; self.dims];
        for doc in &matching.docs {
            if !dv.advance_exact(doc)? {
                continue;
            }
            let payload = dv.binary_value()?;
            let num_dims = self.check_payload_dims(payload, payload_dims)?;
            let tuple_bytes = num_dims * BYTES_PER_DIM;
            let body = &payload[BYTES_PER_DIM..];
            if body.len() % tuple_bytes != 0 {
                return Err(InternalError::InvalidFacetSetPayload {
                    field: self.field.clone(),
                    reason: "the payload ends in the middle of a tuple",
                }
                .into());
            }

            let mut doc_matched = false;
            for tuple in body.chunks_exact(tuple_bytes) {
                match mode {
                    CountMode::DecodedLongs => {
                        for (slot, chunk) in decoded.iter_mut().zip(tuple.chunks_exact(BYTES_PER_DIM))
                        {
                            *slot = sortable_bytes_into_i64(chunk);
                        }
                        for (index, matcher) in self.matchers.iter().enumerate() {
                            if matcher.matches(&decoded) {
                                self.counts[index] += 1;
                                doc_matched = true;
                            }
                        }
                    }
                    CountMode::PackedBytes => {
                        for (index, matcher) in self.matchers.iter().enumerate() {
                            if matcher.matches_packed(tuple) {
                                self.counts[index] += 1;
                                doc_matched = true;
                            }
                        }
                    }
                }
            }
            if doc_matched {
                self.tot_count += 1;
            }
        }
        Ok(())
    }

    /// All documents of a field share their tuple width: the first payload
    /// pins it, later payloads must agree, and so must the matchers.
    fn check_payload_dims(&self, payload: &[u8], payload_dims: &mut Option<usize>) -> Result<usize> {
        let corrupt = |reason| InternalError::InvalidFacetSetPayload {
            field: self.field.clone(),
            reason,
        };

        let header = read_dims_header(payload)
            .ok_or_else(|| corrupt("the payload is shorter than its dimension header"))?;
        let num_dims =
            usize::try_from(header).map_err(|_| corrupt("the dimension count is negative"))?;
        if num_dims == 0 {
            return Err(corrupt("the dimension count is zero").into());
        }
        match payload_dims {
            Some(expected) if *expected != num_dims => {
                Err(corrupt("documents disagree on the dimension count").into())
            }
            Some(_) => Ok(num_dims),
            None => {
                if num_dims != self.dims {
                    return Err(UserError::DimensionMismatch {
                        expected: self.dims,
                        actual: num_dims,
                    }
                    .into());
                }
                *payload_dims = Some(num_dims);
                Ok(num_dims)
            }
        }
    }

    /// The number of documents with at least one matching tuple.
    pub fn total_count(&self) -> u64 {
        self.tot_count
    }

    /// Every matcher with a non-zero count, in matcher registration
    /// order. `top_n` is validated but does not bound the output, the
    /// top-k semantics of facet-set buckets are unresolved upstream.
    pub fn top_children(&self, top_n: usize, dim: &str) -> Result<FacetResult> {
        if top_n == 0 {
            return Err(UserError::InvalidTopN(top_n).into());
        }
        self.check_dim(dim)?;

        let label_values: Vec<LabelAndValue> = self
            .matchers
            .iter()
            .zip(&self.counts)
            .filter(|(_, &count)| count > 0)
            .map(|(matcher, &count)| LabelAndValue {
                label: matcher.label().to_string(),
                value: u64::from(count),
            })
            .collect();

        Ok(FacetResult {
            dim: dim.to_string(),
            path: Vec::new(),
            value: self.tot_count,
            child_count: label_values.len() as u32,
            label_values,
        })
    }

    /// The single-dimension variant of [`top_children`](Self::top_children):
    /// the field is the only dimension this engine answers for.
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

impl std::fmt::Debug for MatchingFacetSetsCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchingFacetSetsCounts")
            .field("field", &self.field)
            .field("matchers", &self.matchers.len())
            .field("dims", &self.dims)
            .field("tot_count", &self.tot_count)
            .finish()
    }
}

//! Matchers deciding which logical buckets a facet-set tuple belongs to.

use super::{FacetSet, BYTES_PER_DIM};
use crate::range::{normalize_f32, normalize_f64, normalize_i32, normalize_i64};
use crate::value_encoding::{f32_to_sortable_i32, f64_to_sortable_i64, i64_into_sortable_bytes};
use crate::Result;

/// Decides whether one tuple belongs to the bucket this matcher names.
///
/// Both decision operations require a tuple of exactly
/// [`dims`](Self::dims) dimensions, anything else is a caller bug.
pub trait FacetSetMatcher {
    fn label(&self) -> &str;

    fn dims(&self) -> usize;

    /// Decides over the decoded sortable-long view of a tuple.
    fn matches(&self, dim_values: &[i64]) -> bool;

    /// Decides directly over one packed tuple, `dims` sortable longs.
    fn matches_packed(&self, packed: &[u8]) -> bool;
}

/// Matches tuples equal to one specific facet set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactFacetSetMatcher {
    label: String,
    values: Vec<i64>,
    packed: Vec<u8>,
}

impl ExactFacetSetMatcher {
    pub fn new(label: impl Into<String>, set: &dyn FacetSet) -> ExactFacetSetMatcher {
        let mut packed = Vec::with_capacity(set.size_packed_bytes());
        set.pack_values(&mut packed);
        ExactFacetSetMatcher { label: label.into(), values: set.comparable_values(), packed }
    }
}

impl FacetSetMatcher for ExactFacetSetMatcher {
    fn label(&self) -> &str {
        &self.label
    }

    fn dims(&self) -> usize {
        self.values.len()
    }

    fn matches(&self, dim_values: &[i64]) -> bool {
        assert_eq!(dim_values.len(), self.values.len(), "tuple width mismatch");
        dim_values == self.values
    }

    fn matches_packed(&self, packed: &[u8]) -> bool {
        assert_eq!(packed.len(), self.packed.len(), "tuple width mismatch");
        packed == self.packed
    }
}

/// One dimension's inclusive bounds in the sortable-long space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimRange {
    pub lower: i64,
    pub upper: i64,
}

impl DimRange {
    /// Bounds over `i64` values.
    pub fn long(min: i64, min_inclusive: bool, max: i64, max_inclusive: bool) -> Result<DimRange> {
        let (lower, upper) = normalize_i64(min, min_inclusive, max, max_inclusive)?;
        Ok(DimRange { lower, upper })
    }

    /// Bounds over `i32` values, widened into the long space.
    pub fn int(min: i32, min_inclusive: bool, max: i32, max_inclusive: bool) -> Result<DimRange> {
        let (lower, upper) = normalize_i32(min, min_inclusive, max, max_inclusive)?;
        Ok(DimRange { lower: i64::from(lower), upper: i64::from(upper) })
    }

    /// Bounds over `f64` values, in sortable-bits form.
    pub fn double(min: f64, min_inclusive: bool, max: f64, max_inclusive: bool) -> Result<DimRange> {
        let (lower, upper) = normalize_f64(min, min_inclusive, max, max_inclusive)?;
        Ok(DimRange { lower: f64_to_sortable_i64(lower), upper: f64_to_sortable_i64(upper) })
    }

    /// Bounds over `f32` values, in sortable-bits form widened into the
    /// long space.
    pub fn float(min: f32, min_inclusive: bool, max: f32, max_inclusive: bool) -> Result<DimRange> {
        let (lower, upper) = normalize_f32(min, min_inclusive, max, max_inclusive)?;
        Ok(DimRange {
            lower: i64::from(f32_to_sortable_i32(lower)),
            upper: i64::from(f32_to_sortable_i32(upper)),
        })
    }
}

/// Matches tuples falling inside a hyper-rectangle, one [`DimRange`] per
/// dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeFacetSetMatcher {
    label: String,
    lower: Vec<i64>,
    upper: Vec<i64>,
    packed_lower: Vec<u8>,
    packed_upper: Vec<u8>,
}

impl RangeFacetSetMatcher {
    pub fn new(label: impl Into<String>, ranges: Vec<DimRange>) -> RangeFacetSetMatcher {
        let mut packed_lower = vec![0; ranges.len() * BYTES_PER_DIM];
        let mut packed_upper = vec![0; ranges.len() * BYTES_PER_DIM];
        for (dim, range) in ranges.iter().enumerate() {
            let at = dim * BYTES_PER_DIM;
            i64_into_sortable_bytes(range.lower, &mut packed_lower[at..at + BYTES_PER_DIM]);
            i64_into_sortable_bytes(range.upper, &mut packed_upper[at..at + BYTES_PER_DIM]);
        }
        RangeFacetSetMatcher {
            label: label.into(),
            lower: ranges.iter().map(|range| range.lower).collect(),
            upper: ranges.iter().map(|range| range.upper).collect(),
            packed_lower,
            packed_upper,
        }
    }
}

impl FacetSetMatcher for RangeFacetSetMatcher {
    fn label(&self) -> &str {
        &self.label
    }

    fn dims(&self) -> usize {
        self.lower.len()
    }

    fn matches(&self, dim_values: &[i64]) -> bool {
        assert_eq!(dim_values.len(), self.lower.len(), "tuple width mismatch");
        dim_values
            .iter()
            .zip(&self.lower)
            .zip(&self.upper)
            .all(|((value, lower), upper)| lower <= value && value <= upper)
    }

    fn matches_packed(&self, packed: &[u8]) -> bool {
        assert_eq!(packed.len(), self.packed_lower.len(), "tuple width mismatch");
        for dim in 0..self.lower.len() {
            let at = dim * BYTES_PER_DIM;
            let value = &packed[at..at + BYTES_PER_DIM];
            if value < &self.packed_lower[at..at + BYTES_PER_DIM]
                || value > &self.packed_upper[at..at + BYTES_PER_DIM]
            {
                return false;
            }
        }
        true
    }
}

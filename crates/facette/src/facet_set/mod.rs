//! Facet-set primitives.
//!
//! A facet set is an N-tuple of typed numeric values attached to a
//! document. All dimensional types reduce to the sortable `i64` space,
//! which is the canonical comparison form: matchers only ever see the
//! comparable values or their packed byte form.

use crate::value_encoding::{
    f32_to_sortable_i32, f64_to_sortable_i64, i64_into_sortable_bytes, sortable_bytes_into_i64,
};
use crate::{Result, UserError};

pub use self::counts::{CountMode, MatchingFacetSetsCounts};
pub use self::matchers::{DimRange, ExactFacetSetMatcher, FacetSetMatcher, RangeFacetSetMatcher};

mod counts;
mod matchers;

/// The packed size of one dimension value.
pub(crate) const BYTES_PER_DIM: usize = 8;

/// An N-tuple of typed dimension values.
pub trait FacetSet {
    /// The tuple width.
    fn dims(&self) -> usize;

    /// The sortable-long view of the tuple.
    fn comparable_values(&self) -> Vec<i64>;

    /// Appends the packed byte form to `buf`, returns the number of bytes
    /// written.
    fn pack_values(&self, buf: &mut Vec<u8>) -> usize {
        let values = self.comparable_values();
        let mut scratch = [0; BYTES_PER_DIM];
        for value in &values {
            i64_into_sortable_bytes(*value, &mut scratch);
            buf.extend_from_slice(&scratch);
        }
        values.len() * BYTES_PER_DIM
    }

    /// The number of bytes [`pack_values`](Self::pack_values) writes.
    fn size_packed_bytes(&self) -> usize {
        self.dims() * BYTES_PER_DIM
    }
}

/// A facet set over `i64` dimension values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongFacetSet {
    values: Vec<i64>,
}

impl LongFacetSet {
    pub fn new(values: Vec<i64>) -> LongFacetSet {
        LongFacetSet { values }
    }
}

impl FacetSet for LongFacetSet {
    fn dims(&self) -> usize {
        self.values.len()
    }

    fn comparable_values(&self) -> Vec<i64> {
        self.values.clone()
    }
}

/// A facet set over `i32` dimension values, widened into the long space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntFacetSet {
    values: Vec<i32>,
}

impl IntFacetSet {
    pub fn new(values: Vec<i32>) -> IntFacetSet {
        IntFacetSet { values }
    }
}

impl FacetSet for IntFacetSet {
    fn dims(&self) -> usize {
        self.values.len()
    }

    fn comparable_values(&self) -> Vec<i64> {
        self.values.iter().copied().map(i64::from).collect()
    }
}

/// A facet set over `f64` dimension values, in sortable-bits form.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleFacetSet {
    values: Vec<f64>,
}

impl DoubleFacetSet {
    pub fn new(values: Vec<f64>) -> DoubleFacetSet {
        DoubleFacetSet { values }
    }
}

impl FacetSet for DoubleFacetSet {
    fn dims(&self) -> usize {
        self.values.len()
    }

    fn comparable_values(&self) -> Vec<i64> {
        self.values.iter().copied().map(f64_to_sortable_i64).collect()
    }
}

/// A facet set over `f32` dimension values, in sortable-bits form widened
/// into the long space.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatFacetSet {
    values: Vec<f32>,
}

impl FloatFacetSet {
    pub fn new(values: Vec<f32>) -> FloatFacetSet {
        FloatFacetSet { values }
    }
}

impl FacetSet for FloatFacetSet {
    fn dims(&self) -> usize {
        self.values.len()
    }

    fn comparable_values(&self) -> Vec<i64> {
        self.values.iter().map(|value| i64::from(f32_to_sortable_i32(*value))).collect()
    }
}

/// Packs facet sets into the binary doc-value payload: the shared
/// dimension count as a sortable long, then one packed tuple per set.
pub fn pack_facet_sets(sets: &[&dyn FacetSet]) -> Result<Vec<u8>> {
    let Some(first) = sets.first() else {
        return Err(UserError::EmptyFacetSets.into());
    };
    let dims = first.dims();

    let mut buf = Vec::with_capacity(BYTES_PER_DIM + sets.len() * dims * BYTES_PER_DIM);
    let mut scratch = [0; BYTES_PER_DIM];
    i64_into_sortable_bytes(dims as i64, &mut scratch);
    buf.extend_from_slice(&scratch);

    for set in sets {
        if set.dims() != dims {
            return Err(UserError::DimensionMismatch { expected: dims, actual: set.dims() }.into());
        }
        set.pack_values(&mut buf);
    }
    Ok(buf)
}

/// Reads the dimension count header of a packed payload.
pub(crate) fn read_dims_header(payload: &[u8]) -> Option<i64> {
    (payload.len() >= BYTES_PER_DIM).then(|| sortable_bytes_into_i64(&payload[..BYTES_PER_DIM]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, UserError};

    #[test]
    fn all_types_reduce_to_the_long_space() {
        assert_eq!(LongFacetSet::new(vec![1, -2]).comparable_values(), vec![1, -2]);
        assert_eq!(IntFacetSet::new(vec![7, -7]).comparable_values(), vec![7, -7]);

        let doubles = DoubleFacetSet::new(vec![1.5, -1.5]).comparable_values();
        assert!(doubles[0] > doubles[1]);
        let floats = FloatFacetSet::new(vec![0.5, -0.5]).comparable_values();
        assert!(floats[0] > floats[1]);
    }

    #[test]
    fn payload_layout_starts_with_the_dimension_count() {
        let sets = [LongFacetSet::new(vec![1, 2, 3]), LongFacetSet::new(vec![4, 5, 6])];
        let refs: Vec<&dyn FacetSet> = sets.iter().map(|set| set as &dyn FacetSet).collect();
        let payload = pack_facet_sets(&refs).unwrap();

        assert_eq!(payload.len(), BYTES_PER_DIM + 2 * 3 * BYTES_PER_DIM);
        assert_eq!(read_dims_header(&payload), Some(3));
        assert_eq!(sortable_bytes_into_i64(&payload[BYTES_PER_DIM..2 * BYTES_PER_DIM]), 1);
    }

    #[test]
    fn mismatched_tuple_widths_are_rejected() {
        let narrow = LongFacetSet::new(vec![1]);
        let wide = LongFacetSet::new(vec![1, 2]);
        let error = pack_facet_sets(&[&narrow, &wide]).unwrap_err();
        assert!(matches!(
            error,
            Error::UserError(UserError::DimensionMismatch { expected: 1, actual: 2 })
        ));
        assert!(matches!(
            pack_facet_sets(&[]).unwrap_err(),
            Error::UserError(UserError::EmptyFacetSets)
        ));
    }
}

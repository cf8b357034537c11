//! Range primitives.
//!
//! A range is a named multi-dimensional box, both bounds inclusive after
//! construction: exclusive bounds are normalised away by nudging the
//! value one step inward, and a range that ends up empty is rejected at
//! construction, it could never match anything.

use serde::Serialize;

pub use self::counts::RangeOnRangeFacetCounts;
use crate::value_encoding::{
    f32_to_sortable_i32, f64_to_sortable_i64, i32_into_sortable_bytes, i64_into_sortable_bytes,
};
use crate::{Result, UserError};

mod counts;

/// The relation a document box must have with a query box to be counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryType {
    /// The boxes overlap on every dimension.
    Intersects,
    /// The document box contains the query box.
    Contains,
    /// The document box lies within the query box.
    Within,
    /// The boxes intersect without either containing the other.
    Crosses,
}

pub(crate) fn normalize_i64(
    min: i64,
    min_inclusive: bool,
    max: i64,
    max_inclusive: bool,
) -> Result<(i64, i64)> {
    let min = if min_inclusive {
        min
    } else {
        min.checked_add(1)
            .ok_or_else(|| UserError::RangeBoundOverflow { value: min.to_string() })?
    };
    let max = if max_inclusive {
        max
    } else {
        max.checked_sub(1)
            .ok_or_else(|| UserError::RangeBoundOverflow { value: max.to_string() })?
    };
    if min > max {
        return Err(UserError::EmptyRange { min: min.to_string(), max: max.to_string() }.into());
    }
    Ok((min, max))
}

pub(crate) fn normalize_i32(
    min: i32,
    min_inclusive: bool,
    max: i32,
    max_inclusive: bool,
) -> Result<(i32, i32)> {
    let min = if min_inclusive {
        min
    } else {
        min.checked_add(1)
            .ok_or_else(|| UserError::RangeBoundOverflow { value: min.to_string() })?
    };
    let max = if max_inclusive {
        max
    } else {
        max.checked_sub(1)
            .ok_or_else(|| UserError::RangeBoundOverflow { value: max.to_string() })?
    };
    if min > max {
        return Err(UserError::EmptyRange { min: min.to_string(), max: max.to_string() }.into());
    }
    Ok((min, max))
}

/// Exclusive bounds move one ULP inward; `next_down` and "next toward
/// negative infinity" agree on every non-NaN value, including `-0.0`.
pub(crate) fn normalize_f64(
    min: f64,
    min_inclusive: bool,
    max: f64,
    max_inclusive: bool,
) -> Result<(f64, f64)> {
    if min.is_nan() || max.is_nan() {
        return Err(UserError::NanRangeBound.into());
    }
    let min = if min_inclusive { min } else { min.next_up() };
    let max = if max_inclusive { max } else { max.next_down() };
    if min > max {
        return Err(UserError::EmptyRange { min: min.to_string(), max: max.to_string() }.into());
    }
    Ok((min, max))
}

pub(crate) fn normalize_f32(
    min: f32,
    min_inclusive: bool,
    max: f32,
    max_inclusive: bool,
) -> Result<(f32, f32)> {
    if min.is_nan() || max.is_nan() {
        return Err(UserError::NanRangeBound.into());
    }
    let min = if min_inclusive { min } else { min.next_up() };
    let max = if max_inclusive { max } else { max.next_down() };
    if min > max {
        return Err(UserError::EmptyRange { min: min.to_string(), max: max.to_string() }.into());
    }
    Ok((min, max))
}

macro_rules! check_parallel_bounds {
    ($min:expr, $max:expr) => {
        if $min.len() != $max.len() {
            return Err(UserError::DimensionMismatch {
                expected: $min.len(),
                actual: $max.len(),
            }
            .into());
        }
        if $min.is_empty() {
            return Err(UserError::DimensionMismatch { expected: 1, actual: 0 }.into());
        }
    };
}

/// A named box over `i64` dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LongRange {
    pub label: String,
    min: Vec<i64>,
    max: Vec<i64>,
}

impl LongRange {
    pub(crate) const ENCODED_VALUE_BYTES: usize = 8;

    /// A single-dimension range.
    pub fn new(
        label: impl Into<String>,
        min: i64,
        min_inclusive: bool,
        max: i64,
        max_inclusive: bool,
    ) -> Result<LongRange> {
        LongRange::new_multi(label, vec![min], min_inclusive, vec![max], max_inclusive)
    }

    /// A multi-dimensional range over parallel bound arrays.
    pub fn new_multi(
        label: impl Into<String>,
        min: Vec<i64>,
        min_inclusive: bool,
        max: Vec<i64>,
        max_inclusive: bool,
    ) -> Result<LongRange> {
        check_parallel_bounds!(min, max);
        let mut norm_min = Vec::with_capacity(min.len());
        let mut norm_max = Vec::with_capacity(max.len());
        for (min, max) in min.into_iter().zip(max) {
            let (min, max) = normalize_i64(min, min_inclusive, max, max_inclusive)?;
            norm_min.push(min);
            norm_max.push(max);
        }
        Ok(LongRange { label: label.into(), min: norm_min, max: norm_max })
    }

    pub fn dims(&self) -> usize {
        self.min.len()
    }

    /// The normalised, inclusive minima.
    pub fn min(&self) -> &[i64] {
        &self.min
    }

    /// The normalised, inclusive maxima.
    pub fn max(&self) -> &[i64] {
        &self.max
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        let mut scratch = [0; 8];
        for value in self.min.iter().chain(&self.max) {
            i64_into_sortable_bytes(*value, &mut scratch);
            buf.extend_from_slice(&scratch);
        }
    }
}

/// A named box over `i32` dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntRange {
    pub label: String,
    min: Vec<i32>,
    max: Vec<i32>,
}

impl IntRange {
    pub(crate) const ENCODED_VALUE_BYTES: usize = 4;

    pub fn new(
        label: impl Into<String>,
        min: i32,
        min_inclusive: bool,
        max: i32,
        max_inclusive: bool,
    ) -> Result<IntRange> {
        IntRange::new_multi(label, vec![min], min_inclusive, vec![max], max_inclusive)
    }

    pub fn new_multi(
        label: impl Into<String>,
        min: Vec<i32>,
        min_inclusive: bool,
        max: Vec<i32>,
        max_inclusive: bool,
    ) -> Result<IntRange> {
        check_parallel_bounds!(min, max);
        let mut norm_min = Vec::with_capacity(min.len());
        let mut norm_max = Vec::with_capacity(max.len());
        for (min, max) in min.into_iter().zip(max) {
            let (min, max) = normalize_i32(min, min_inclusive, max, max_inclusive)?;
            norm_min.push(min);
            norm_max.push(max);
        }
        Ok(IntRange { label: label.into(), min: norm_min, max: norm_max })
    }

    pub fn dims(&self) -> usize {
        self.min.len()
    }

    pub fn min(&self) -> &[i32] {
        &self.min
    }

    pub fn max(&self) -> &[i32] {
        &self.max
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        let mut scratch = [0; 4];
        for value in self.min.iter().chain(&self.max) {
            i32_into_sortable_bytes(*value, &mut scratch);
            buf.extend_from_slice(&scratch);
        }
    }
}

/// A named box over `f64` dimensions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoubleRange {
    pub label: String,
    min: Vec<f64>,
    max: Vec<f64>,
}

impl DoubleRange {
    pub(crate) const ENCODED_VALUE_BYTES: usize = 8;

    pub fn new(
        label: impl Into<String>,
        min: f64,
        min_inclusive: bool,
        max: f64,
        max_inclusive: bool,
    ) -> Result<DoubleRange> {
        DoubleRange::new_multi(label, vec![min], min_inclusive, vec![max], max_inclusive)
    }

    pub fn new_multi(
        label: impl Into<String>,
        min: Vec<f64>,
        min_inclusive: bool,
        max: Vec<f64>,
        max_inclusive: bool,
    ) -> Result<DoubleRange> {
        check_parallel_bounds!(min, max);
        let mut norm_min = Vec::with_capacity(min.len());
        let mut norm_max = Vec::with_capacity(max.len());
        for (min, max) in min.into_iter().zip(max) {
            let (min, max) = normalize_f64(min, min_inclusive, max, max_inclusive)?;
            norm_min.push(min);
            norm_max.push(max);
        }
        Ok(DoubleRange { label: label.into(), min: norm_min, max: norm_max })
    }

    pub fn dims(&self) -> usize {
        self.min.len()
    }

    pub fn min(&self) -> &[f64] {
        &self.min
    }

    pub fn max(&self) -> &[f64] {
        &self.max
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        let mut scratch = [0; 8];
        for value in self.min.iter().chain(&self.max) {
            i64_into_sortable_bytes(f64_to_sortable_i64(*value), &mut scratch);
            buf.extend_from_slice(&scratch);
        }
    }
}

/// A named box over `f32` dimensions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloatRange {
    pub label: String,
    min: Vec<f32>,
    max: Vec<f32>,
}

impl FloatRange {
    pub(crate) const ENCODED_VALUE_BYTES: usize = 4;

    pub fn new(
        label: impl Into<String>,
        min: f32,
        min_inclusive: bool,
        max: f32,
        max_inclusive: bool,
    ) -> Result<FloatRange> {
        FloatRange::new_multi(label, vec![min], min_inclusive, vec![max], max_inclusive)
    }

    pub fn new_multi(
        label: impl Into<String>,
        min: Vec<f32>,
        min_inclusive: bool,
        max: Vec<f32>,
        max_inclusive: bool,
    ) -> Result<FloatRange> {
        check_parallel_bounds!(min, max);
        let mut norm_min = Vec::with_capacity(min.len());
        let mut norm_max = Vec::with_capacity(max.len());
        for (min, max) in min.into_iter().zip(max) {
            let (min, max) = normalize_f32(min, min_inclusive, max, max_inclusive)?;
            norm_min.push(min);
            norm_max.push(max);
        }
        Ok(FloatRange { label: label.into(), min: norm_min, max: norm_max })
    }

    pub fn dims(&self) -> usize {
        self.min.len()
    }

    pub fn min(&self) -> &[f32] {
        &self.min
    }

    pub fn max(&self) -> &[f32] {
        &self.max
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        let mut scratch = [0; 4];
        for value in self.min.iter().chain(&self.max) {
            i32_into_sortable_bytes(f32_to_sortable_i32(*value), &mut scratch);
            buf.extend_from_slice(&scratch);
        }
    }
}

macro_rules! pack_boxes {
    ($name:ident, $range:ty) => {
        /// Packs document boxes into the binary doc-value payload: per
        /// box, every dimension minimum then every dimension maximum.
        pub fn $name(boxes: &[$range]) -> Result<Vec<u8>> {
            let Some(first) = boxes.first() else {
                return Err(UserError::DimensionMismatch { expected: 1, actual: 0 }.into());
            };
            let dims = first.dims();
            let mut buf = Vec::new();
            for item in boxes {
                if item.dims() != dims {
                    return Err(UserError::DimensionMismatch {
                        expected: dims,
                        actual: item.dims(),
                    }
                    .into());
                }
                item.encode_into(&mut buf);
            }
            Ok(buf)
        }
    };
}

pack_boxes!(pack_long_boxes, LongRange);
pack_boxes!(pack_int_boxes, IntRange);
pack_boxes!(pack_double_boxes, DoubleRange);
pack_boxes!(pack_float_boxes, FloatRange);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, UserError};

    #[test]
    fn exclusive_bounds_normalise_to_inclusive_ones() {
        let range = LongRange::new("r", 0, false, 10, false).unwrap();
        assert_eq!((range.min(), range.max()), (&[1][..], &[9][..]));

        let same = LongRange::new("r", 1, true, 9, true).unwrap();
        assert_eq!((range.min(), range.max()), (same.min(), same.max()));

        let range = DoubleRange::new("r", 1.0, false, 2.0, false).unwrap();
        assert_eq!(range.min()[0], 1.0f64.next_up());
        assert_eq!(range.max()[0], 2.0f64.next_down());
    }

    #[test]
    fn empty_ranges_are_rejected() {
        assert!(matches!(
            LongRange::new("r", 5, true, 4, true).unwrap_err(),
            Error::UserError(UserError::EmptyRange { .. })
        ));
        // A single excluded point is empty too.
        assert!(matches!(
            LongRange::new("r", 5, false, 5, false).unwrap_err(),
            Error::UserError(UserError::EmptyRange { .. })
        ));
        assert!(matches!(
            DoubleRange::new("r", 1.0, false, 1.0, true).unwrap_err(),
            Error::UserError(UserError::EmptyRange { .. })
        ));
    }

    #[test]
    fn bounds_at_the_type_limits_fail_loudly() {
        assert!(matches!(
            LongRange::new("r", i64::MAX, false, i64::MAX, true).unwrap_err(),
            Error::UserError(UserError::RangeBoundOverflow { .. })
        ));
        assert!(matches!(
            IntRange::new("r", 0, true, i32::MIN, false).unwrap_err(),
            Error::UserError(UserError::RangeBoundOverflow { .. })
        ));
    }

    #[test]
    fn nan_bounds_are_rejected() {
        assert!(matches!(
            DoubleRange::new("r", f64::NAN, true, 1.0, true).unwrap_err(),
            Error::UserError(UserError::NanRangeBound)
        ));
        assert!(matches!(
            FloatRange::new("r", 0.0, true, f32::NAN, false).unwrap_err(),
            Error::UserError(UserError::NanRangeBound)
        ));
    }

    #[test]
    fn parallel_bound_arrays_must_align() {
        assert!(matches!(
            LongRange::new_multi("r", vec![0, 0], true, vec![1], true).unwrap_err(),
            Error::UserError(UserError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn packed_boxes_compare_like_their_values() {
        let small = LongRange::new("small", -10, true, 5, true).unwrap();
        let large = LongRange::new("large", 6, true, 1000, true).unwrap();
        let mut packed_small = Vec::new();
        let mut packed_large = Vec::new();
        small.encode_into(&mut packed_small);
        large.encode_into(&mut packed_large);
        // min of `small` sorts under min of `large`, unsigned, despite the
        // negative value.
        assert!(packed_small[..8] < packed_large[..8]);
    }
}

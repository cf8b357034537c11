//! Sortable encodings for the numeric facet payloads.
//!
//! Every dimensional type reduces to a signed integer space whose unsigned
//! big-endian byte form compares like the original numbers. Floats and
//! doubles first go through the IEEE 754 bit trick that flips negative
//! values, then share the integer byte encoding.

use byteorder::{BigEndian, ByteOrder};

/// Converts an `f64` to a sortable `i64`. The IEEE 754 bit layout is
/// reordered so that comparing the results as `i64` matches comparing the
/// original doubles, with NaN greater than positive infinity.
pub fn f64_to_sortable_i64(value: f64) -> i64 {
    sortable_f64_bits(value.to_bits() as i64)
}

/// Inverse of [`f64_to_sortable_i64`].
pub fn sortable_i64_to_f64(sortable: i64) -> f64 {
    f64::from_bits(sortable_f64_bits(sortable) as u64)
}

/// Converts IEEE 754 double bits to sortable order, or back. The operation
/// is an involution.
pub fn sortable_f64_bits(bits: i64) -> i64 {
    bits ^ ((bits >> 63) & 0x7fff_ffff_ffff_ffff)
}

/// Converts an `f32` to a sortable `i32`, see [`f64_to_sortable_i64`].
pub fn f32_to_sortable_i32(value: f32) -> i32 {
    sortable_f32_bits(value.to_bits() as i32)
}

/// Inverse of [`f32_to_sortable_i32`].
pub fn sortable_i32_to_f32(sortable: i32) -> f32 {
    f32::from_bits(sortable_f32_bits(sortable) as u32)
}

/// Converts IEEE 754 float bits to sortable order, or back.
pub fn sortable_f32_bits(bits: i32) -> i32 {
    bits ^ ((bits >> 31) & 0x7fff_ffff)
}

/// Writes an `i64` as 8 bytes whose unsigned lexicographic order matches
/// the signed numeric order (sign bit flipped, big-endian).
pub fn i64_into_sortable_bytes(value: i64, buf: &mut [u8]) {
    BigEndian::write_u64(buf, (value as u64) ^ (1 << 63));
}

/// Inverse of [`i64_into_sortable_bytes`].
pub fn sortable_bytes_into_i64(buf: &[u8]) -> i64 {
    (BigEndian::read_u64(buf) ^ (1 << 63)) as i64
}

/// Writes an `i32` as 4 bytes whose unsigned lexicographic order matches
/// the signed numeric order.
pub fn i32_into_sortable_bytes(value: i32, buf: &mut [u8]) {
    BigEndian::write_u32(buf, (value as u32) ^ (1 << 31));
}

/// Inverse of [`i32_into_sortable_bytes`].
pub fn sortable_bytes_into_i32(buf: &[u8]) -> i32 {
    (BigEndian::read_u32(buf) ^ (1 << 31)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sortable_i64_bytes_order_matches_numeric_order() {
        let values = [i64::MIN, -1_000_000, -1, 0, 1, 42, 1_000_000, i64::MAX];
        let mut encoded: Vec<[u8; 8]> = Vec::new();
        for value in values {
            let mut buf = [0; 8];
            i64_into_sortable_bytes(value, &mut buf);
            assert_eq!(sortable_bytes_into_i64(&buf), value);
            encoded.push(buf);
        }
        for window in encoded.windows(2) {
            assert!(window[0] < window[1]);
        }
    }

    #[test]
    fn sortable_i32_bytes_order_matches_numeric_order() {
        let values = [i32::MIN, -7, 0, 3, i32::MAX];
        let mut encoded: Vec<[u8; 4]> = Vec::new();
        for value in values {
            let mut buf = [0; 4];
            i32_into_sortable_bytes(value, &mut buf);
            assert_eq!(sortable_bytes_into_i32(&buf), value);
            encoded.push(buf);
        }
        for window in encoded.windows(2) {
            assert!(window[0] < window[1]);
        }
    }

    #[test]
    fn sortable_f64_order_matches_numeric_order() {
        let values = [
            f64::NEG_INFINITY,
            f64::MIN,
            -1.5,
            -f64::MIN_POSITIVE,
            -0.0,
            0.0,
            f64::MIN_POSITIVE,
            1.5,
            f64::MAX,
            f64::INFINITY,
        ];
        for window in values.windows(2) {
            let (left, right) = (f64_to_sortable_i64(window[0]), f64_to_sortable_i64(window[1]));
            assert!(left <= right, "{} should sort before {}", window[0], window[1]);
        }
        // NaN sorts above everything.
        assert!(f64_to_sortable_i64(f64::NAN) > f64_to_sortable_i64(f64::INFINITY));
        for value in values {
            assert_eq!(sortable_i64_to_f64(f64_to_sortable_i64(value)).to_bits(), value.to_bits());
        }
    }

    #[test]
    fn sortable_f32_order_matches_numeric_order() {
        let values = [f32::NEG_INFINITY, -2.5f32, -0.0, 0.0, 0.1, f32::MAX, f32::INFINITY];
        for window in values.windows(2) {
            let (left, right) = (f32_to_sortable_i32(window[0]), f32_to_sortable_i32(window[1]));
            assert!(left <= right);
        }
        for value in values {
            assert_eq!(sortable_i32_to_f32(f32_to_sortable_i32(value)).to_bits(), value.to_bits());
        }
    }
}

//! Monotone, fixed-width hexadecimal encoding of a bounded decimal number,
//! per spec §6: "Numeric endpoints are encoded to a fixed-width hexadecimal
//! string covering the range `[-5×10^9, +5×10^9]` with 6 decimal digits of
//! precision; the encoding is monotonic so that byte-wise comparison equals
//! numeric comparison."
//!
//! This is the runtime half of the external collaborator's contract: the
//! rule compiler encodes pattern endpoints the same way (out of scope here),
//! and `ByteMachine::transition_on` must encode the live event value the
//! identical way so the two sides compare byte-for-byte.

use crate::error::{Error, Result};

pub(crate) const ENCODED_LEN: usize = 14;
const LOWER_BOUND: f64 = -5_000_000_000.0;
const UPPER_BOUND: f64 = 5_000_000_000.0;
const SCALE: f64 = 1_000_000.0; // six decimal digits of precision
const OFFSET: f64 = 5_000_000_000.0;
const PRECISION_EPSILON: f64 = 1e-6;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

fn to_fixed_hex(scaled: u64) -> [u8; ENCODED_LEN] {
    let mut out = [b'0'; ENCODED_LEN];
    let mut v = scaled;
    for slot in out.iter_mut().rev() {
        *slot = HEX_DIGITS[(v & 0xF) as usize];
        v >>= 4;
    }
    out
}

/// Encode a number at pattern-compile time. Rejects values outside the
/// encodable range or that need more than six digits of fractional
/// precision (spec §7 class 3 errors).
pub fn encode_strict(value: f64) -> Result<[u8; ENCODED_LEN]> {
    if !(LOWER_BOUND..=UPPER_BOUND).contains(&value) {
        return Err(Error::NumericOutOfRange { value });
    }
    let scaled = (value + OFFSET) * SCALE;
    if (scaled - scaled.round()).abs() > PRECISION_EPSILON {
        return Err(Error::ExcessPrecision { value });
    }
    Ok(to_fixed_hex(scaled.round() as u64))
}

/// Encode a number parsed from a live event value. Per spec §4.1/§7.3 a
/// value that can't be represented numerically is simply treated as a
/// non-numeric string rather than erroring, so this returns `None` instead
/// of `Result`.
pub(crate) fn encode_lossy(value: f64) -> Option<[u8; ENCODED_LEN]> {
    if !(LOWER_BOUND..=UPPER_BOUND).contains(&value) || !value.is_finite() {
        return None;
    }
    let scaled = (value + OFFSET) * SCALE;
    Some(to_fixed_hex(scaled.round() as u64))
}

/// Parse a stringified JSON value (no surrounding quotes) as a float,
/// mirroring the "attempt to parse value as a float" step of §4.1.
pub(crate) fn parse_event_value(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_ordering_matches_numeric_ordering() {
        let values = [-5_000_000_000.0, -1.5, -1.0, 0.0, 0.5, 1.0, 42.125, 5_000_000_000.0];
        let mut encoded: Vec<[u8; ENCODED_LEN]> =
            values.iter().map(|&v| encode_strict(v).unwrap()).collect();
        let sorted = {
            let mut e = encoded.clone();
            e.sort();
            e
        };
        assert_eq!(encoded, sorted, "encodings must already be in ascending order");
        encoded.dedup();
        assert_eq!(encoded.len(), values.len(), "distinct inputs must yield distinct encodings");
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(
            encode_strict(6_000_000_000.0),
            Err(Error::NumericOutOfRange { .. })
        ));
        assert!(matches!(
            encode_strict(-6_000_000_000.0),
            Err(Error::NumericOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_excess_precision() {
        assert!(matches!(
            encode_strict(1.123_456_789),
            Err(Error::ExcessPrecision { .. })
        ));
        assert!(encode_strict(1.123_456).is_ok());
    }

    #[test]
    fn lossy_runtime_encoding_agrees_with_strict() {
        assert_eq!(encode_lossy(42.125), encode_strict(42.125).ok());
        assert_eq!(encode_lossy(f64::NAN), None);
        assert_eq!(encode_lossy(1e18), None);
    }
}

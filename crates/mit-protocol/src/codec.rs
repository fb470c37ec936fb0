//! Fixed-point quantization between a bounded real range and an unsigned
//! N-bit code, the numeric basis of every MIT payload field.

use crate::error::{ProtocolError, Result};
use serde::Serialize;

/// A `[min, max]` span mapped onto `bits`-wide unsigned codes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct QuantizationRange {
    min: f64,
    max: f64,
    bits: u8,
}

impl QuantizationRange {
    pub const MAX_BITS: u8 = 16;

    pub fn new(min: f64, max: f64, bits: u8) -> Result<Self> {
        let invalid = |reason| ProtocolError::InvalidRange {
            min,
            max,
            bits,
            reason,
        };
        if !min.is_finite() || !max.is_finite() {
            return Err(invalid("bounds must be finite"));
        }
        if max <= min {
            return Err(invalid("max must be greater than min"));
        }
        if bits == 0 || bits > Self::MAX_BITS {
            return Err(invalid("bit width must be within 1..=16"));
        }
        Ok(Self { min, max, bits })
    }

    /// Caller guarantees `min < max` and `bits` in `1..=16`.
    pub(crate) const fn new_unchecked(min: f64, max: f64, bits: u8) -> Self {
        Self { min, max, bits }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Largest code, `2^bits - 1`.
    pub fn max_code(&self) -> u32 {
        (1u32 << self.bits) - 1
    }

    /// Width of one quantization step; the worst-case round-trip error.
    pub fn step(&self) -> f64 {
        self.span() / f64::from(self.max_code())
    }
}

/// Quantize `x`, saturating silently at the range bounds. NaN maps to `min`.
///
/// Evaluated as `trunc((x - min) * (2^bits - 1) / (max - min) + 0.5)`, which is
/// round-half-up on the non-negative offset. The operation order matters for
/// bit-exactness: `0.0` in `[-3.14, 3.14]` lands on 32767, not 32768.
pub fn encode(x: f64, range: QuantizationRange) -> u32 {
    let max_code = range.max_code();
    let x = if x.is_nan() {
        range.min
    } else {
        x.clamp(range.min, range.max)
    };
    let scaled = (x - range.min) * f64::from(max_code) / range.span() + 0.5;
    (scaled as u32).min(max_code)
}

/// Map a code back onto the range: `v * (max - min) / (2^bits - 1) + min`.
pub fn decode(v: u32, range: QuantizationRange) -> f64 {
    f64::from(v) * range.span() / f64::from(range.max_code()) + range.min
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(min: f64, max: f64, bits: u8) -> QuantizationRange {
        QuantizationRange::new(min, max, bits).unwrap()
    }

    fn sweep(r: QuantizationRange, n: usize) -> impl Iterator<Item = f64> {
        (0..=n).map(move |i| r.min() + r.span() * (i as f64) / (n as f64))
    }

    #[test]
    fn test_rejects_invalid_ranges() {
        assert!(QuantizationRange::new(1.0, 1.0, 12).is_err());
        assert!(QuantizationRange::new(2.0, -2.0, 12).is_err());
        assert!(QuantizationRange::new(-1.0, 1.0, 0).is_err());
        assert!(QuantizationRange::new(-1.0, 1.0, 17).is_err());
        assert!(QuantizationRange::new(f64::NEG_INFINITY, 1.0, 12).is_err());
        assert!(QuantizationRange::new(-1.0, 1.0, 16).is_ok());
    }

    #[test]
    fn test_round_trip_within_one_step() {
        let ranges = [
            range(-3.14, 3.14, 16),
            range(-45.0, 45.0, 12),
            range(0.0, 500.0, 12),
            range(0.0, 5.0, 12),
            range(-18.0, 18.0, 12),
            range(-12.5, 12.5, 16),
        ];
        for r in ranges {
            for x in sweep(r, 2_000) {
                let back = decode(encode(x, r), r);
                assert!(
                    (back - x).abs() <= r.step(),
                    "x={x} back={back} step={} bits={}",
                    r.step(),
                    r.bits()
                );
            }
        }
    }

    #[test]
    fn test_saturates_outside_range() {
        let r = range(-18.0, 18.0, 12);
        assert_eq!(encode(-18.0001, r), encode(-18.0, r));
        assert_eq!(encode(-1e9, r), 0);
        assert_eq!(encode(f64::NEG_INFINITY, r), 0);
        assert_eq!(encode(18.5, r), encode(18.0, r));
        assert_eq!(encode(1e9, r), 4095);
        assert_eq!(encode(f64::INFINITY, r), 4095);
    }

    #[test]
    fn test_nan_encodes_as_min() {
        let r = range(-45.0, 45.0, 12);
        assert_eq!(encode(f64::NAN, r), 0);
    }

    #[test]
    fn test_codes_stay_within_width() {
        for bits in 1..=16u8 {
            let r = range(-1.0, 1.0, bits);
            assert_eq!(encode(1.0, r), r.max_code());
            assert_eq!(encode(-1.0, r), 0);
        }
    }

    #[test]
    fn test_encode_and_decode_are_monotonic() {
        let r = range(-3.14, 3.14, 16);
        let mut last = 0u32;
        for x in sweep(r, 5_000) {
            let code = encode(x, r);
            assert!(code >= last, "encode not monotonic at x={x}");
            last = code;
        }

        let r = range(-45.0, 45.0, 12);
        let mut prev = f64::NEG_INFINITY;
        for code in 0..=r.max_code() {
            let v = decode(code, r);
            assert!(v >= prev, "decode not monotonic at code={code}");
            prev = v;
        }
    }

    #[test]
    fn test_midpoint_codes_match_wire_values() {
        assert_eq!(encode(0.0, range(-3.14, 3.14, 16)), 0x7FFF);
        assert_eq!(encode(0.0, range(-45.0, 45.0, 12)), 0x800);
        assert_eq!(encode(0.0, range(-18.0, 18.0, 12)), 0x800);
        assert_eq!(encode(0.5, range(0.0, 500.0, 12)), 4);
        assert_eq!(encode(0.3, range(0.0, 5.0, 12)), 246);
    }

    #[test]
    fn test_decode_endpoints() {
        let r = range(-18.0, 18.0, 12);
        assert_eq!(decode(0, r), -18.0);
        assert!((decode(4095, r) - 18.0).abs() < 1e-12);
    }
}

use crate::codec::QuantizationRange;
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const POS_BITS: u8 = 16;
pub const VEL_BITS: u8 = 12;
pub const KP_BITS: u8 = 12;
pub const KD_BITS: u8 = 12;
pub const TOR_BITS: u8 = 12;

/// Quantization ranges of the five MIT fields.
///
/// The same shape serves as a device's capability profile and as the bounds
/// used to encode outbound commands; the two need not agree.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MitLimits {
    pub pos: QuantizationRange,
    pub vel: QuantizationRange,
    pub kp: QuantizationRange,
    pub kd: QuantizationRange,
    pub tor: QuantizationRange,
}

impl MitLimits {
    /// rad, rad/s, Nm/rad, Nm·s/rad, Nm
    #[allow(clippy::approx_constant)]
    pub const DEFAULT: MitLimits = MitLimits {
        pos: QuantizationRange::new_unchecked(-3.14, 3.14, POS_BITS),
        vel: QuantizationRange::new_unchecked(-45.0, 45.0, VEL_BITS),
        kp: QuantizationRange::new_unchecked(0.0, 500.0, KP_BITS),
        kd: QuantizationRange::new_unchecked(0.0, 5.0, KD_BITS),
        tor: QuantizationRange::new_unchecked(-18.0, 18.0, TOR_BITS),
    };

    /// Apply the `Some` entries of `cfg` on top of `self`.
    pub fn overridden_by(&self, cfg: &LimitsConfig) -> Result<Self> {
        let pick = |cur: QuantizationRange, over: Option<(f64, f64)>| match over {
            Some((lo, hi)) => QuantizationRange::new(lo, hi, cur.bits()),
            None => Ok(cur),
        };
        Ok(Self {
            pos: pick(self.pos, cfg.pos)?,
            vel: pick(self.vel, cfg.vel)?,
            kp: pick(self.kp, cfg.kp)?,
            kd: pick(self.kd, cfg.kd)?,
            tor: pick(self.tor, cfg.tor)?,
        })
    }
}

impl Default for MitLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Serialized form of a limits override: `(min, max)` per field.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LimitsConfig {
    #[serde(default)]
    pub pos: Option<(f64, f64)>,
    #[serde(default)]
    pub vel: Option<(f64, f64)>,
    #[serde(default)]
    pub kp: Option<(f64, f64)>,
    #[serde(default)]
    pub kd: Option<(f64, f64)>,
    #[serde(default)]
    pub tor: Option<(f64, f64)>,
}

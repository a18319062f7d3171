use serde::{Deserialize, Serialize};

use crate::event::types::Kart;

/// A time is usable for ranking only when it is finite and strictly positive.
pub fn is_valid_time(t: f64) -> bool {
    t.is_finite() && t > 0.0
}

/// Turns a raw stopwatch reading into the time used for ranking.
pub trait TimeCorrection {
    fn correct(&self, raw: f64, kart: Kart) -> f64;
}

/// Corrected time equals the raw reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCorrection;

impl TimeCorrection for IdentityCorrection {
    fn correct(&self, raw: f64, _kart: Kart) -> f64 {
        raw
    }
}

/// Adds a fixed number of seconds per displacement class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KartOffsetCorrection {
    pub cc390: f64,
    pub cc270: f64,
}

impl TimeCorrection for KartOffsetCorrection {
    fn correct(&self, raw: f64, kart: Kart) -> f64 {
        match kart {
            Kart::Cc390 => raw + self.cc390,
            Kart::Cc270 => raw + self.cc270,
        }
    }
}

/// Correction selected in the config file.
///
/// Example YAML:
/// ```yaml
/// correction:
///   kind: kart_offset
///   cc390: 0.0
///   cc270: -1.25
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectionConfig {
    #[default]
    Identity,
    KartOffset {
        #[serde(default)]
        cc390: f64,
        #[serde(default)]
        cc270: f64,
    },
}

impl CorrectionConfig {
    pub fn build(&self) -> Box<dyn TimeCorrection> {
        match self {
            CorrectionConfig::Identity => Box::new(IdentityCorrection),
            CorrectionConfig::KartOffset { cc390, cc270 } => Box::new(KartOffsetCorrection {
                cc390: *cc390,
                cc270: *cc270,
            }),
        }
    }
}

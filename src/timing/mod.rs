pub mod correction;
pub mod types;

pub use correction::{
    is_valid_time, CorrectionConfig, IdentityCorrection, KartOffsetCorrection, TimeCorrection,
};
pub use types::{TimeAttackSession, TimedEntry};

use serde::{Deserialize, Serialize};

use super::correction::{is_valid_time, TimeCorrection};
use crate::event::types::Pilot;

/// One stopwatch reading for a pilot in a Time Attack session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedEntry {
    pub pilot_id: String,
    pub source_session: String,
    pub raw_time: Option<f64>,
    pub corrected_time: Option<f64>,
}

impl TimedEntry {
    /// Build an entry from a raw reading. Unusable readings are kept for the
    /// record but carry no corrected time.
    pub fn record(
        session_id: &str,
        pilot: &Pilot,
        raw: f64,
        correction: &dyn TimeCorrection,
    ) -> Self {
        let (raw_time, corrected_time) = if is_valid_time(raw) {
            let corrected = correction.correct(raw, pilot.kart);
            (Some(raw), Some(corrected).filter(|t| is_valid_time(*t)))
        } else {
            (Some(raw).filter(|t| t.is_finite()), None)
        };

        Self {
            pilot_id: pilot.id.clone(),
            source_session: session_id.to_string(),
            raw_time,
            corrected_time,
        }
    }

    /// Corrected time when it is usable for ranking
    pub fn valid_time(&self) -> Option<f64> {
        self.corrected_time.filter(|t| is_valid_time(*t))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeAttackSession {
    pub session_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub times: Vec<TimedEntry>,
}

impl TimeAttackSession {
    pub fn new(session_id: &str, name: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            name: name.to_string(),
            times: Vec::new(),
        }
    }

    /// Replace the pilot's entry in this session (one entry per pilot per session).
    pub fn with_entry(&self, entry: TimedEntry) -> Self {
        let mut times: Vec<TimedEntry> = self
            .times
            .iter()
            .filter(|t| t.pilot_id != entry.pilot_id)
            .cloned()
            .collect();
        times.push(entry);
        Self {
            session_id: self.session_id.clone(),
            name: self.name.clone(),
            times,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::{Kart, Level};
    use crate::timing::{IdentityCorrection, KartOffsetCorrection};

    fn pilot(kart: Kart) -> Pilot {
        Pilot {
            id: "p1".to_string(),
            number: 11,
            full_name: "Luis Vega".to_string(),
            level: Level::Amateur,
            kart,
        }
    }

    #[test]
    fn test_record_valid_reading() {
        let entry = TimedEntry::record("ta-1", &pilot(Kart::Cc390), 51.2, &IdentityCorrection);
        assert_eq!(entry.source_session, "ta-1");
        assert_eq!(entry.raw_time, Some(51.2));
        assert_eq!(entry.valid_time(), Some(51.2));
    }

    #[test]
    fn test_record_zero_reading_has_no_corrected_time() {
        let entry = TimedEntry::record("ta-1", &pilot(Kart::Cc390), 0.0, &IdentityCorrection);
        assert_eq!(entry.raw_time, Some(0.0));
        assert_eq!(entry.corrected_time, None);
        assert_eq!(entry.valid_time(), None);
    }

    #[test]
    fn test_record_nan_reading_drops_raw() {
        let entry = TimedEntry::record("ta-1", &pilot(Kart::Cc270), f64::NAN, &IdentityCorrection);
        assert_eq!(entry.raw_time, None);
        assert_eq!(entry.corrected_time, None);
    }

    #[test]
    fn test_record_applies_correction() {
        let correction = KartOffsetCorrection {
            cc390: 0.0,
            cc270: -2.0,
        };
        let entry = TimedEntry::record("ta-1", &pilot(Kart::Cc270), 52.0, &correction);
        assert_eq!(entry.raw_time, Some(52.0));
        assert_eq!(entry.valid_time(), Some(50.0));
    }

    #[test]
    fn test_correction_below_zero_is_invalid() {
        let correction = KartOffsetCorrection {
            cc390: -60.0,
            cc270: 0.0,
        };
        let entry = TimedEntry::record("ta-1", &pilot(Kart::Cc390), 52.0, &correction);
        assert_eq!(entry.corrected_time, None);
    }

    #[test]
    fn test_with_entry_replaces_previous_reading() {
        let p = pilot(Kart::Cc390);
        let session = TimeAttackSession::new("ta-1", "Morning")
            .with_entry(TimedEntry::record("ta-1", &p, 53.0, &IdentityCorrection))
            .with_entry(TimedEntry::record("ta-1", &p, 51.0, &IdentityCorrection));
        assert_eq!(session.times.len(), 1);
        assert_eq!(session.times[0].valid_time(), Some(51.0));
    }

    #[test]
    fn test_timed_entry_json_field_names() {
        let entry = TimedEntry::record("ta-1", &pilot(Kart::Cc390), 51.2, &IdentityCorrection);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["pilotId"], "p1");
        assert_eq!(json["sourceSession"], "ta-1");
        assert_eq!(json["rawTime"], 51.2);
        assert_eq!(json["correctedTime"], 51.2);
    }
}

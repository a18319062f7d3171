use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::event::types::Pilot;
use crate::qualy::QualyRecord;
use crate::timing::{is_valid_time, TimeAttackSession};

/// Which timing source supplied a pilot's combined time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StandingSource {
    #[serde(rename = "TA")]
    TimeAttack,
    #[serde(rename = "QUALY")]
    Qualy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedStanding {
    pub pilot_id: String,
    pub number: u32,
    pub full_name: String,
    pub final_time: f64,
    pub source: StandingSource,
    pub best_time_attack: Option<f64>,
    pub best_qualy: Option<f64>,
}

/// Keep the smaller of the current best and a candidate time.
fn fold_best(best: &mut HashMap<String, f64>, pilot_id: &str, time: f64) {
    if !is_valid_time(time) {
        return;
    }
    best.entry(pilot_id.to_string())
        .and_modify(|b| {
            if time < *b {
                *b = time;
            }
        })
        .or_insert(time);
}

/// Best valid corrected Time Attack time per pilot, across all sessions
pub fn best_time_attack(sessions: &[TimeAttackSession]) -> HashMap<String, f64> {
    let mut best = HashMap::new();
    for session in sessions {
        for entry in &session.times {
            if let Some(t) = entry.valid_time() {
                fold_best(&mut best, &entry.pilot_id, t);
            }
        }
    }
    best
}

/// Best valid qualifying time per pilot
pub fn best_qualy(records: &[QualyRecord]) -> HashMap<String, f64> {
    let mut best = HashMap::new();
    for record in records {
        if let Some(t) = record.qualy_time {
            fold_best(&mut best, &record.pilot_id, t);
        }
    }
    best
}

/// Ascending by time, then pilot number, then id so that every pair resolves.
pub fn compare_standings(a: &CombinedStanding, b: &CombinedStanding) -> Ordering {
    a.final_time
        .total_cmp(&b.final_time)
        .then_with(|| a.number.cmp(&b.number))
        .then_with(|| a.pilot_id.cmp(&b.pilot_id))
}

/// Merge Time Attack and Qualy bests into one ranking.
///
/// Pilots with no valid time from either source are left out. When both
/// sources exist the faster one wins; an exact tie is credited to Time Attack.
pub fn build_combined_standings(
    pilots: &[Pilot],
    time_attack: &[TimeAttackSession],
    qualy: &[QualyRecord],
) -> Vec<CombinedStanding> {
    let ta = best_time_attack(time_attack);
    let q = best_qualy(qualy);

    let mut standings: Vec<CombinedStanding> = pilots
        .iter()
        .filter_map(|pilot| {
            let best_ta = ta.get(&pilot.id).copied();
            let best_q = q.get(&pilot.id).copied();
            let (final_time, source) = match (best_ta, best_q) {
                (Some(t), Some(qt)) if t <= qt => (t, StandingSource::TimeAttack),
                (Some(_), Some(qt)) => (qt, StandingSource::Qualy),
                (Some(t), None) => (t, StandingSource::TimeAttack),
                (None, Some(qt)) => (qt, StandingSource::Qualy),
                (None, None) => return None,
            };
            Some(CombinedStanding {
                pilot_id: pilot.id.clone(),
                number: pilot.number,
                full_name: pilot.full_name.clone(),
                final_time,
                source,
                best_time_attack: best_ta,
                best_qualy: best_q,
            })
        })
        .collect();

    standings.sort_by(compare_standings);

    debug!(
        "Combined standings: {} ranked of {} pilots",
        standings.len(),
        pilots.len()
    );

    standings
}

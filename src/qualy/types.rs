use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timing::is_valid_time;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualyAssignment {
    pub pilot_id: String,
    pub qualy_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualySession {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub assignments: Vec<QualyAssignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Completed,
}

impl QualySession {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            closed: false,
            assignments: Vec::new(),
        }
    }

    /// Completed once every assigned pilot has a valid time. An empty session is pending.
    pub fn status(&self) -> SessionStatus {
        let all_timed = self
            .assignments
            .iter()
            .all(|a| a.qualy_time.is_some_and(is_valid_time));
        if !self.assignments.is_empty() && all_timed {
            SessionStatus::Completed
        } else {
            SessionStatus::Pending
        }
    }

    pub fn contains(&self, pilot_id: &str) -> bool {
        self.assignments.iter().any(|a| a.pilot_id == pilot_id)
    }

    pub fn time_of(&self, pilot_id: &str) -> Option<f64> {
        self.assignments
            .iter()
            .find(|a| a.pilot_id == pilot_id)
            .and_then(|a| a.qualy_time)
    }
}

/// One pilot's qualifying outcome as consumed by the combined standings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualyRecord {
    pub pilot_id: String,
    /// 1-based session index
    pub group: u32,
    pub qualy_time: Option<f64>,
}

/// Flatten sessions into per-pilot records, in session order.
pub fn qualy_records(sessions: &[QualySession]) -> Vec<QualyRecord> {
    sessions
        .iter()
        .enumerate()
        .flat_map(|(i, session)| {
            session.assignments.iter().map(move |a| QualyRecord {
                pilot_id: a.pilot_id.clone(),
                group: i as u32 + 1,
                qualy_time: a.qualy_time,
            })
        })
        .collect()
}

/// Ordering used to fill sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignMode {
    Level,
    Kart,
    Random,
}

impl AssignMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "level" => Some(AssignMode::Level),
            "kart" => Some(AssignMode::Kart),
            "random" => Some(AssignMode::Random),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignError {
    #[error("qualy session '{session}' is closed")]
    Closed { session: String },
    #[error("qualy session '{session}' is full")]
    Full { session: String },
    #[error("unknown qualy session '{0}'")]
    UnknownSession(String),
    #[error("pilot '{0}' is not assigned to session '{1}'")]
    NotAssigned(String, String),
}

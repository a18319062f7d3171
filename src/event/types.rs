use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::grid::Race;
use crate::qualy::QualySession;
use crate::scoring::RaceComputedResult;
use crate::timing::TimeAttackSession;

/// Current persisted schema version. Older documents go through `event::migrate`.
pub const EVENT_VERSION: u32 = 2;

/// Engine displacement class of a pilot's kart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kart {
    #[serde(rename = "390cc")]
    Cc390,
    #[serde(rename = "270cc")]
    Cc270,
}

impl Kart {
    /// The other displacement class
    pub fn opposite(self) -> Self {
        match self {
            Kart::Cc390 => Kart::Cc270,
            Kart::Cc270 => Kart::Cc390,
        }
    }

    /// Sort priority used by kart-ordered modes (390cc first)
    pub fn priority(self) -> u8 {
        match self {
            Kart::Cc390 => 0,
            Kart::Cc270 => 1,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "390cc" | "390" => Some(Kart::Cc390),
            "270cc" | "270" => Some(Kart::Cc270),
            _ => None,
        }
    }
}

impl fmt::Display for Kart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kart::Cc390 => write!(f, "390cc"),
            Kart::Cc270 => write!(f, "270cc"),
        }
    }
}

/// Skill tier of a pilot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Pro,
    Amateur,
    Principiante,
}

impl Level {
    /// Sort priority used by level-ordered modes (PRO first)
    pub fn priority(self) -> u8 {
        match self {
            Level::Pro => 0,
            Level::Amateur => 1,
            Level::Principiante => 2,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRO" => Some(Level::Pro),
            "AMATEUR" => Some(Level::Amateur),
            "PRINCIPIANTE" => Some(Level::Principiante),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Pro => write!(f, "PRO"),
            Level::Amateur => write!(f, "AMATEUR"),
            Level::Principiante => write!(f, "PRINCIPIANTE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pilot {
    pub id: String,
    pub number: u32,
    pub full_name: String,
    pub level: Level,
    pub kart: Kart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub pilot_ids: Vec<String>,
}

/// Operator-entered finishing positions for one race, keyed by pilot id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishSheet {
    pub race: u32,
    #[serde(default)]
    pub positions: BTreeMap<String, u32>,
}

/// Complete persisted state of one championship event.
///
/// Every engine artifact is stored as produced; a new computation replaces the
/// previous artifact wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventState {
    pub version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pilots: Vec<Pilot>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub time_attack: Vec<TimeAttackSession>,
    #[serde(default)]
    pub qualy: Vec<QualySession>,
    #[serde(default)]
    pub grid: Vec<Race>,
    #[serde(default)]
    pub finishes: Vec<FinishSheet>,
    #[serde(default)]
    pub results: Vec<RaceComputedResult>,
}

impl Default for EventState {
    fn default() -> Self {
        Self::new("")
    }
}

impl EventState {
    pub fn new(name: &str) -> Self {
        Self {
            version: EVENT_VERSION,
            name: name.to_string(),
            pilots: Vec::new(),
            teams: Vec::new(),
            time_attack: Vec::new(),
            qualy: Vec::new(),
            grid: Vec::new(),
            finishes: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn pilot(&self, pilot_id: &str) -> Option<&Pilot> {
        self.pilots.iter().find(|p| p.id == pilot_id)
    }

    /// Pilot id -> team name, for pilots that belong to a team
    pub fn team_membership(&self) -> HashMap<String, String> {
        team_membership(&self.teams)
    }

    pub fn result(&self, race: u32) -> Option<&RaceComputedResult> {
        self.results.iter().find(|r| r.race == race)
    }

    pub fn finish_sheet(&self, race: u32) -> Option<&FinishSheet> {
        self.finishes.iter().find(|f| f.race == race)
    }
}

/// Index pilots by id.
pub fn pilot_index(pilots: &[Pilot]) -> HashMap<&str, &Pilot> {
    pilots.iter().map(|p| (p.id.as_str(), p)).collect()
}

/// Resolve pilot id -> team name. A pilot listed in several teams keeps the first.
pub fn team_membership(teams: &[Team]) -> HashMap<String, String> {
    let mut membership = HashMap::new();
    for team in teams {
        for pilot_id in &team.pilot_ids {
            membership
                .entry(pilot_id.clone())
                .or_insert_with(|| team.name.clone());
        }
    }
    membership
}

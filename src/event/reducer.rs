use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::fmt::Display;
use thiserror::Error;

use super::types::{EventState, FinishSheet, Pilot};
use crate::grid::{partition_grid, validate_grid, GridConfig, GridInputs, GridPlan, Race};
use crate::qualy::{self, qualy_records, AssignError, AssignMode, QualySession};
use crate::scoring::{
    score_race_at, validate_finishing_positions, validate_scoring, ResultsError, ScoringConfig,
};
use crate::standings::{best_qualy, build_combined_standings};
use crate::teams::deal_teams;
use crate::timing::{CorrectionConfig, TimeAttackSession, TimeCorrection, TimedEntry};

fn join<E: Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    #[error("invalid configuration: {}", join(.0))]
    Config(Vec<String>),
    #[error("invalid finishing positions: {}", join(.0))]
    Results(Vec<ResultsError>),
    #[error(transparent)]
    Assign(#[from] AssignError),
    #[error("unknown pilot '{0}'")]
    UnknownPilot(String),
    #[error("pilot '{0}' already exists")]
    DuplicatePilot(String),
    #[error("qualy session '{0}' already exists")]
    DuplicateSession(String),
    #[error("race {0} is not on the grid")]
    UnknownRace(u32),
    #[error("no grid has been generated")]
    NoGrid,
    #[error("race {0} has no finishing positions entered")]
    NoFinishes(u32),
    #[error("{0}")]
    Teams(String),
}

/// Validated settings the reducer computes with.
pub struct EngineContext {
    pub plan: GridPlan,
    pub scoring: ScoringConfig,
    pub max_participants: usize,
    pub correction: Box<dyn TimeCorrection>,
}

impl EngineContext {
    /// Validate grid and scoring settings together, reporting every problem.
    pub fn new(
        grid: &GridConfig,
        scoring: ScoringConfig,
        max_participants: usize,
        correction: &CorrectionConfig,
    ) -> Result<Self, EventError> {
        let mut errors = Vec::new();
        let plan = validate_grid(grid)
            .map_err(|errs| errors.extend(errs.iter().map(|e| e.to_string())))
            .ok();
        if let Err(errs) = validate_scoring(&scoring) {
            errors.extend(errs);
        }
        if max_participants == 0 {
            errors.push("qualy.max_participants: must be positive".to_string());
        }

        match plan {
            Some(plan) if errors.is_empty() => Ok(Self {
                plan,
                scoring,
                max_participants,
                correction: correction.build(),
            }),
            _ => Err(EventError::Config(errors)),
        }
    }
}

/// Operator actions on an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddPilot(Pilot),
    /// Deal the current combined standings into teams with these names
    SetTeams { names: Vec<String> },
    RecordTimeAttack {
        session_id: String,
        pilot_id: String,
        raw_time: f64,
    },
    AddQualySession { id: String, name: String },
    AssignQualy { mode: AssignMode, seed: u64 },
    /// Explicit `session id -> pilot ids` layout for open sessions
    AssignQualyLayout(BTreeMap<String, Vec<String>>),
    AssignQualyPilot { session_id: String, pilot_id: String },
    RecordQualyTime {
        session_id: String,
        pilot_id: String,
        time: Option<f64>,
    },
    CloseQualySession(String),
    ReopenQualySession(String),
    GenerateGrid { seed: u64 },
    EnterFinishingPositions {
        race: u32,
        positions: BTreeMap<String, u32>,
    },
    CalculateRace { race: u32, at: DateTime<Utc> },
}

fn grid_race(state: &EventState, race: u32) -> Result<&Race, EventError> {
    if state.grid.is_empty() {
        return Err(EventError::NoGrid);
    }
    state
        .grid
        .iter()
        .find(|r| r.race == race)
        .ok_or(EventError::UnknownRace(race))
}

fn require_pilot<'a>(state: &'a EventState, pilot_id: &str) -> Result<&'a Pilot, EventError> {
    state
        .pilot(pilot_id)
        .ok_or_else(|| EventError::UnknownPilot(pilot_id.to_string()))
}

fn with_qualy(state: &EventState, qualy: Vec<QualySession>) -> EventState {
    EventState {
        qualy,
        ..state.clone()
    }
}

/// Apply one command to a snapshot, producing the next snapshot.
///
/// The input state is never modified. Commands that draw random numbers are
/// seeded, so replaying a command on the same snapshot gives the same result.
pub fn apply(
    state: &EventState,
    command: Command,
    ctx: &EngineContext,
) -> Result<EventState, EventError> {
    debug!("Applying {:?}", command);

    match command {
        Command::AddPilot(pilot) => {
            if state.pilot(&pilot.id).is_some() {
                return Err(EventError::DuplicatePilot(pilot.id));
            }
            let mut next = state.clone();
            next.pilots.push(pilot);
            Ok(next)
        }

        Command::SetTeams { names } => {
            let records = qualy_records(&state.qualy);
            let standings = build_combined_standings(&state.pilots, &state.time_attack, &records);
            let teams =
                deal_teams(&standings, &names).map_err(|e| EventError::Teams(e.to_string()))?;
            Ok(EventState {
                teams,
                ..state.clone()
            })
        }

        Command::RecordTimeAttack {
            session_id,
            pilot_id,
            raw_time,
        } => {
            let pilot = require_pilot(state, &pilot_id)?;
            let entry = TimedEntry::record(&session_id, pilot, raw_time, ctx.correction.as_ref());

            let mut next = state.clone();
            match next
                .time_attack
                .iter_mut()
                .find(|s| s.session_id == session_id)
            {
                Some(session) => *session = session.with_entry(entry),
                None => {
                    let session = TimeAttackSession::new(&session_id, &session_id);
                    next.time_attack.push(session.with_entry(entry));
                }
            }
            Ok(next)
        }

        Command::AddQualySession { id, name } => {
            if state.qualy.iter().any(|s| s.id == id) {
                return Err(EventError::DuplicateSession(id));
            }
            let mut next = state.clone();
            next.qualy.push(QualySession::new(&id, &name));
            Ok(next)
        }

        Command::AssignQualy { mode, seed } => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let sessions = qualy::assign_by_mode(
                &state.qualy,
                &state.pilots,
                mode,
                ctx.max_participants,
                &mut rng,
            )?;
            Ok(with_qualy(state, sessions))
        }

        Command::AssignQualyLayout(layout) => {
            if let Some(unknown) = layout
                .values()
                .flatten()
                .find(|id| state.pilot(id).is_none())
            {
                return Err(EventError::UnknownPilot(unknown.clone()));
            }
            let sessions = qualy::assign_manual(&state.qualy, &layout, ctx.max_participants)?;
            Ok(with_qualy(state, sessions))
        }

        Command::AssignQualyPilot {
            session_id,
            pilot_id,
        } => {
            require_pilot(state, &pilot_id)?;
            let sessions =
                qualy::assign_pilot(&state.qualy, &session_id, &pilot_id, ctx.max_participants)?;
            Ok(with_qualy(state, sessions))
        }

        Command::RecordQualyTime {
            session_id,
            pilot_id,
            time,
        } => {
            let sessions = qualy::record_time(&state.qualy, &session_id, &pilot_id, time)?;
            Ok(with_qualy(state, sessions))
        }

        Command::CloseQualySession(session_id) => {
            let sessions = qualy::set_closed(&state.qualy, &session_id, true)?;
            Ok(with_qualy(state, sessions))
        }

        Command::ReopenQualySession(session_id) => {
            let sessions = qualy::set_closed(&state.qualy, &session_id, false)?;
            Ok(with_qualy(state, sessions))
        }

        Command::GenerateGrid { seed } => {
            let records = qualy_records(&state.qualy);
            let standings = build_combined_standings(&state.pilots, &state.time_attack, &records);
            let qualy_times = best_qualy(&records);
            let teams = state.team_membership();
            let inputs = GridInputs {
                standings: &standings,
                pilots: &state.pilots,
                teams: &teams,
                qualy_times: &qualy_times,
            };
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let grid = partition_grid(&inputs, &ctx.plan, &mut rng);

            if !state.finishes.is_empty() || !state.results.is_empty() {
                info!("New grid generated; previous finishes and results discarded");
            }
            Ok(EventState {
                grid,
                finishes: Vec::new(),
                results: Vec::new(),
                ..state.clone()
            })
        }

        Command::EnterFinishingPositions { race, positions } => {
            let grid = grid_race(state, race)?;
            validate_finishing_positions(grid, &positions).map_err(EventError::Results)?;

            let mut next = state.clone();
            next.finishes.retain(|f| f.race != race);
            next.finishes.push(FinishSheet { race, positions });
            next.finishes.sort_by_key(|f| f.race);
            // A stored result for this race no longer matches its positions
            next.results.retain(|r| r.race != race);
            Ok(next)
        }

        Command::CalculateRace { race, at } => {
            let grid = grid_race(state, race)?;
            let sheet = state.finish_sheet(race).ok_or(EventError::NoFinishes(race))?;
            let finishes = validate_finishing_positions(grid, &sheet.positions)
                .map_err(EventError::Results)?;
            let result = score_race_at(race, &finishes, &ctx.scoring, at);

            let mut next = state.clone();
            next.results.retain(|r| r.race != race);
            next.results.push(result);
            next.results.sort_by_key(|r| r.race);
            Ok(next)
        }
    }
}

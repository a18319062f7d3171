use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashSet};

use super::types::{AssignError, AssignMode, QualyAssignment, QualySession};
use crate::event::types::Pilot;
use crate::timing::is_valid_time;

/// Rebuild a session's assignment list, keeping times of pilots that stay in it.
fn with_pilots(session: &QualySession, pilot_ids: &[&str]) -> QualySession {
    QualySession {
        id: session.id.clone(),
        name: session.name.clone(),
        closed: session.closed,
        assignments: pilot_ids
            .iter()
            .map(|id| QualyAssignment {
                pilot_id: id.to_string(),
                qualy_time: session.time_of(id),
            })
            .collect(),
    }
}

fn find_session<'a>(
    sessions: &'a [QualySession],
    session_id: &str,
) -> Result<&'a QualySession, AssignError> {
    sessions
        .iter()
        .find(|s| s.id == session_id)
        .ok_or_else(|| AssignError::UnknownSession(session_id.to_string()))
}

/// Pilots in closed sessions keep their place and are never redistributed.
fn pinned_pilots(sessions: &[QualySession]) -> HashSet<&str> {
    sessions
        .iter()
        .filter(|s| s.closed)
        .flat_map(|s| s.assignments.iter().map(|a| a.pilot_id.as_str()))
        .collect()
}

fn ordered_pool<'a, R: Rng + ?Sized>(
    pilots: &'a [Pilot],
    pinned: &HashSet<&str>,
    mode: AssignMode,
    rng: &mut R,
) -> Vec<&'a Pilot> {
    let mut pool: Vec<&Pilot> = pilots
        .iter()
        .filter(|p| !pinned.contains(p.id.as_str()))
        .collect();
    pool.sort_by_key(|p| p.number);
    match mode {
        AssignMode::Level => pool.sort_by_key(|p| p.level.priority()),
        AssignMode::Kart => pool.sort_by_key(|p| p.kart.priority()),
        AssignMode::Random => pool.shuffle(rng),
    }
    pool
}

/// Re-partition every open session from scratch.
///
/// The pool is ordered by `mode`, capped at `max_participants` per open
/// session, and dealt as `index % open_sessions`. A recorded time survives
/// only if the pilot lands back in the same session.
pub fn assign_by_mode<R: Rng + ?Sized>(
    sessions: &[QualySession],
    pilots: &[Pilot],
    mode: AssignMode,
    max_participants: usize,
    rng: &mut R,
) -> Result<Vec<QualySession>, AssignError> {
    let open: Vec<usize> = (0..sessions.len()).filter(|&i| !sessions[i].closed).collect();
    if open.is_empty() {
        return match sessions.first() {
            Some(s) => Err(AssignError::Closed {
                session: s.id.clone(),
            }),
            None => Ok(Vec::new()),
        };
    }

    let pinned = pinned_pilots(sessions);
    let mut pool = ordered_pool(pilots, &pinned, mode, rng);
    let capacity = max_participants * open.len();
    if pool.len() > capacity {
        warn!(
            "Qualy capacity {} reached, {} pilots left unassigned",
            capacity,
            pool.len() - capacity
        );
        pool.truncate(capacity);
    }

    let mut dealt: Vec<Vec<&str>> = vec![Vec::new(); open.len()];
    for (i, pilot) in pool.iter().enumerate() {
        dealt[i % open.len()].push(pilot.id.as_str());
    }

    debug!(
        "Assigned {} pilots to {} open qualy sessions ({:?})",
        pool.len(),
        open.len(),
        mode
    );

    let mut next = sessions.to_vec();
    for (slot, &index) in open.iter().enumerate() {
        next[index] = with_pilots(&sessions[index], &dealt[slot]);
    }
    Ok(next)
}

/// Apply an explicit `session id -> pilot ids` layout.
///
/// Sessions are read in their stored order and a pilot listed twice stays
/// where it was claimed first. Open sessions not in the map end up empty.
pub fn assign_manual(
    sessions: &[QualySession],
    layout: &BTreeMap<String, Vec<String>>,
    max_participants: usize,
) -> Result<Vec<QualySession>, AssignError> {
    for session_id in layout.keys() {
        let session = find_session(sessions, session_id)?;
        if session.closed {
            return Err(AssignError::Closed {
                session: session_id.clone(),
            });
        }
    }

    let mut claimed = pinned_pilots(sessions);
    let mut next = Vec::with_capacity(sessions.len());
    for session in sessions {
        if session.closed {
            next.push(session.clone());
            continue;
        }
        let mut ids: Vec<&str> = Vec::new();
        for pilot_id in layout.get(&session.id).into_iter().flatten() {
            if claimed.insert(pilot_id.as_str()) {
                ids.push(pilot_id.as_str());
            }
        }
        if ids.len() > max_participants {
            return Err(AssignError::Full {
                session: session.id.clone(),
            });
        }
        next.push(with_pilots(session, &ids));
    }
    Ok(next)
}

/// Move a single pilot into a session.
pub fn assign_pilot(
    sessions: &[QualySession],
    session_id: &str,
    pilot_id: &str,
    max_participants: usize,
) -> Result<Vec<QualySession>, AssignError> {
    let target = find_session(sessions, session_id)?;
    if target.closed {
        return Err(AssignError::Closed {
            session: session_id.to_string(),
        });
    }
    if target.contains(pilot_id) {
        return Ok(sessions.to_vec());
    }
    if target.assignments.len() >= max_participants {
        return Err(AssignError::Full {
            session: session_id.to_string(),
        });
    }
    if let Some(locked) = sessions.iter().find(|s| s.closed && s.contains(pilot_id)) {
        return Err(AssignError::Closed {
            session: locked.id.clone(),
        });
    }

    Ok(sessions
        .iter()
        .map(|s| {
            let mut ids: Vec<&str> = s
                .assignments
                .iter()
                .map(|a| a.pilot_id.as_str())
                .filter(|id| *id != pilot_id)
                .collect();
            if s.id == session_id {
                ids.push(pilot_id);
            }
            with_pilots(s, &ids)
        })
        .collect())
}

/// Set or clear a pilot's time in an open session. Unusable times are stored as missing.
pub fn record_time(
    sessions: &[QualySession],
    session_id: &str,
    pilot_id: &str,
    time: Option<f64>,
) -> Result<Vec<QualySession>, AssignError> {
    let target = find_session(sessions, session_id)?;
    if target.closed {
        return Err(AssignError::Closed {
            session: session_id.to_string(),
        });
    }
    if !target.contains(pilot_id) {
        return Err(AssignError::NotAssigned(
            pilot_id.to_string(),
            session_id.to_string(),
        ));
    }

    let time = time.filter(|t| is_valid_time(*t));
    Ok(sessions
        .iter()
        .map(|s| {
            let mut s = s.clone();
            if s.id == session_id {
                for a in s.assignments.iter_mut().filter(|a| a.pilot_id == pilot_id) {
                    a.qualy_time = time;
                }
            }
            s
        })
        .collect())
}

/// Open or close a session.
pub fn set_closed(
    sessions: &[QualySession],
    session_id: &str,
    closed: bool,
) -> Result<Vec<QualySession>, AssignError> {
    find_session(sessions, session_id)?;
    Ok(sessions
        .iter()
        .map(|s| {
            let mut s = s.clone();
            if s.id == session_id {
                s.closed = closed;
            }
            s
        })
        .collect())
}

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};

use super::types::{EventState, EVENT_VERSION};

/// Convert any supported persisted document into the current `EventState`.
///
/// Version 1 documents (or documents without a version) stored race grids
/// under `races` with a flat `pilots` list per group, each pilot carrying its
/// `kart`, and qualy sessions as `pilotIds` plus a `times` map. Both are
/// rewritten into the current shape before deserializing.
pub fn migrate(mut doc: Value) -> Result<EventState> {
    let version = doc.get("version").and_then(Value::as_u64).unwrap_or(1);

    if version > EVENT_VERSION as u64 {
        bail!("Unsupported event file version: {}", version);
    }

    if version < 2 {
        let obj = doc
            .as_object_mut()
            .context("Event file must be a JSON object")?;
        migrate_v1(obj)?;
        log::info!("Migrated event file from version {} to {}", version, EVENT_VERSION);
    }

    serde_json::from_value(doc).context("Failed to parse event file")
}

fn migrate_v1(obj: &mut Map<String, Value>) -> Result<()> {
    if let Some(races) = obj.remove("races") {
        let races = races.as_array().context("'races' must be an array")?;
        let grid = races
            .iter()
            .map(migrate_race)
            .collect::<Result<Vec<_>>>()?;
        obj.insert("grid".to_string(), Value::Array(grid));
    }

    if let Some(Value::Array(sessions)) = obj.get_mut("qualy") {
        for session in sessions.iter_mut() {
            migrate_session(session)?;
        }
    }

    obj.insert("version".to_string(), json!(EVENT_VERSION));
    Ok(())
}

fn migrate_race(race: &Value) -> Result<Value> {
    let mut race = race.clone();
    let groups = race
        .get_mut("groups")
        .and_then(Value::as_array_mut)
        .context("Legacy race without 'groups'")?;

    for group in groups.iter_mut() {
        let obj = group
            .as_object_mut()
            .context("Legacy group must be an object")?;
        let Some(pilots) = obj.remove("pilots") else {
            continue;
        };
        let pilots = match pilots {
            Value::Array(p) => p,
            _ => bail!("Legacy group 'pilots' must be an array"),
        };

        let mut cc390 = Vec::new();
        let mut cc270 = Vec::new();
        for mut pilot in pilots {
            let kart = pilot
                .as_object_mut()
                .and_then(|p| p.remove("kart"))
                .and_then(|k| k.as_str().map(str::to_string))
                .context("Legacy grid pilot without 'kart'")?;
            match kart.as_str() {
                "390cc" => cc390.push(pilot),
                "270cc" => cc270.push(pilot),
                other => bail!("Unknown kart '{}' in legacy grid", other),
            }
        }
        obj.insert("390cc".to_string(), Value::Array(cc390));
        obj.insert("270cc".to_string(), Value::Array(cc270));
    }

    Ok(race)
}

fn migrate_session(session: &mut Value) -> Result<()> {
    let obj = session
        .as_object_mut()
        .context("Legacy qualy session must be an object")?;
    if obj.contains_key("assignments") {
        return Ok(());
    }

    let pilot_ids = match obj.remove("pilotIds") {
        Some(Value::Array(ids)) => ids,
        Some(_) => bail!("Legacy qualy 'pilotIds' must be an array"),
        None => Vec::new(),
    };
    let times = match obj.remove("times") {
        Some(Value::Object(t)) => t,
        _ => Map::new(),
    };

    let assignments: Vec<Value> = pilot_ids
        .iter()
        .filter_map(Value::as_str)
        .map(|id| {
            let time = times.get(id).cloned().unwrap_or(Value::Null);
            json!({ "pilotId": id, "qualyTime": time })
        })
        .collect();
    obj.insert("assignments".to_string(), Value::Array(assignments));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::Kart;

    #[test]
    fn test_current_version_passes_through() {
        let state = EventState::new("Copa");
        let doc = serde_json::to_value(&state).unwrap();
        assert_eq!(migrate(doc).unwrap(), state);
    }

    #[test]
    fn test_future_version_rejected() {
        let doc = json!({ "version": 99 });
        let err = migrate(doc).unwrap_err();
        assert!(err.to_string().contains("Unsupported event file version"));
    }

    #[test]
    fn test_v1_grid_split_by_kart() {
        let doc = json!({
            "name": "Copa",
            "races": [{
                "race": 1,
                "startTime": "10:00",
                "groups": [{
                    "group": 1,
                    "pilots": [
                        { "pilotId": "a", "number": 1, "fullName": "A", "finalTime": 50.0,
                          "source": "TA", "standingPosition": 1, "qualyTime": null,
                          "startPosition": 1, "kart": "390cc" },
                        { "pilotId": "b", "number": 2, "fullName": "B", "finalTime": 50.5,
                          "source": "QUALY", "standingPosition": 2, "qualyTime": 50.5,
                          "startPosition": 2, "kart": "270cc" }
                    ]
                }]
            }]
        });

        let state = migrate(doc).unwrap();
        assert_eq!(state.version, EVENT_VERSION);
        assert_eq!(state.grid.len(), 1);
        let group = &state.grid[0].groups[0];
        assert_eq!(group.cc390.len(), 1);
        assert_eq!(group.cc270[0].pilot_id, "b");
        assert_eq!(state.grid[0].locate("a"), Some((1, Kart::Cc390)));
    }

    #[test]
    fn test_v1_qualy_sessions_become_assignments() {
        let doc = json!({
            "version": 1,
            "qualy": [{
                "id": "q1",
                "name": "Qualy 1",
                "pilotIds": ["a", "b"],
                "times": { "a": 49.8 }
            }]
        });

        let state = migrate(doc).unwrap();
        let session = &state.qualy[0];
        assert_eq!(session.assignments.len(), 2);
        assert_eq!(session.time_of("a"), Some(49.8));
        assert_eq!(session.time_of("b"), None);
        assert!(!session.closed);
    }

    #[test]
    fn test_v1_unknown_kart_rejected() {
        let doc = json!({
            "races": [{ "race": 1, "startTime": "10:00",
                "groups": [{ "group": 1, "pilots": [{ "pilotId": "a", "kart": "125cc" }] }] }]
        });
        assert!(migrate(doc).is_err());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(migrate(json!([1, 2, 3])).is_err());
    }
}

use std::io::IsTerminal;
use owo_colors::OwoColorize;
use serde::Serialize;
use terminal_size::{Width, terminal_size};

use crate::event::{pilot_index, Kart, Pilot};
use crate::grid::Race;
use crate::qualy::{QualySession, SessionStatus};
use crate::scoring::RaceComputedResult;
use crate::standings::{CombinedStanding, IndividualStandingRow, StandingSource, TeamStandingRow};

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate a name to fit available width, accounting for Unicode
fn truncate_name(name: &str, max_width: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_width {
        name.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

/// Fit a name into what is left of the terminal after `fixed_width` columns
fn fit_name(name: &str, fixed_width: usize, term_width: Option<usize>) -> String {
    match term_width {
        Some(width) if width > fixed_width + 10 => truncate_name(name, width - fixed_width),
        // Very narrow terminal
        Some(_) => truncate_name(name, 20),
        None => name.to_string(),
    }
}

/// Format a lap time in seconds: "52.345", or "1:02.345" past a minute
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "-".to_string();
    }
    let millis = (seconds * 1000.0).round() as i64;
    let minutes = millis / 60_000;
    let rest = millis % 60_000;
    if minutes > 0 {
        format!("{}:{:02}.{:03}", minutes, rest / 1000, rest % 1000)
    } else {
        format!("{}.{:03}", rest / 1000, rest % 1000)
    }
}

fn format_opt_time(seconds: Option<f64>) -> String {
    seconds.map_or_else(|| "-".to_string(), format_time)
}

fn source_label(source: StandingSource) -> &'static str {
    match source {
        StandingSource::TimeAttack => "TA",
        StandingSource::Qualy => "QUALY",
    }
}

/// Pretty JSON for `--format json`
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| anyhow::anyhow!("Failed to serialize output: {}", e))
}

/// Format combined standings as a table: Pos, Number, Name, Time, Source
pub fn format_standings_table(standings: &[CombinedStanding], use_colors: bool) -> String {
    if standings.is_empty() {
        return "No timed pilots yet.".to_string();
    }

    let term_width = get_terminal_width();
    // pos(4) + number(5) + time(10) + source(6) + separators
    let fixed_width = 4 + 5 + 10 + 6 + 8;

    standings
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            let pos = format!("{:>3}.", idx + 1);
            let number = format!("#{:<3}", s.number);
            let time = format!("{:>10}", format_time(s.final_time));
            let name = fit_name(&s.full_name, fixed_width, term_width);
            let source = source_label(s.source);
            if use_colors {
                format!(
                    "{} {}  {}  {}  {}",
                    pos.dimmed(),
                    number.cyan(),
                    time.bold(),
                    source.dimmed(),
                    name
                )
            } else {
                format!("{} {}  {}  {}  {}", pos, number, time, source, name)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format combined standings as tab-separated values
/// Columns: position, number, pilot_id, name, final_time, source, best_ta, best_qualy
pub fn format_standings_tsv(standings: &[CombinedStanding]) -> String {
    standings
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                idx + 1,
                s.number,
                s.pilot_id,
                s.full_name,
                s.final_time,
                source_label(s.source),
                s.best_time_attack.map_or(String::new(), |t| t.to_string()),
                s.best_qualy.map_or(String::new(), |t| t.to_string()),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format race grids: one block per race, one sub-block per group in start order
pub fn format_grid_table(races: &[Race], use_colors: bool) -> String {
    if races.is_empty() {
        return "No grid generated.".to_string();
    }

    let term_width = get_terminal_width();
    // indent(4) + start(4) + kart(6) + number(5) + qualy(10) + separators
    let fixed_width = 4 + 4 + 6 + 5 + 10 + 8;
    let mut lines = Vec::new();

    for race in races {
        let header = format!("Race {} - {}", race.race, race.start_time);
        lines.push(if use_colors {
            header.bold().to_string()
        } else {
            header
        });

        for group in &race.groups {
            let header = format!("  Group {} ({} pilots)", group.group, group.len());
            lines.push(if use_colors {
                header.yellow().to_string()
            } else {
                header
            });

            for (kart, pilot) in group.start_order() {
                let start = format!("{:>3}.", pilot.start_position);
                let number = format!("#{:<3}", pilot.number);
                let qualy = format!("{:>10}", format_opt_time(pilot.qualy_time));
                let name = fit_name(&pilot.full_name, fixed_width, term_width);
                if use_colors {
                    let kart = match kart {
                        Kart::Cc390 => kart.to_string().red().to_string(),
                        Kart::Cc270 => kart.to_string().blue().to_string(),
                    };
                    lines.push(format!(
                        "    {} {}  {}  {}  {}",
                        start.dimmed(),
                        kart,
                        number.cyan(),
                        qualy,
                        name
                    ));
                } else {
                    lines.push(format!(
                        "    {} {}  {}  {}  {}",
                        start, kart, number, qualy, name
                    ));
                }
            }
        }
    }

    lines.join("\n")
}

/// Format race grids as tab-separated values
/// Columns: race, start_time, group, kart, start_position, number, pilot_id, name, qualy_time
pub fn format_grid_tsv(races: &[Race]) -> String {
    let mut lines = Vec::new();
    for race in races {
        for group in &race.groups {
            for (kart, p) in group.start_order() {
                lines.push(format!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    race.race,
                    race.start_time,
                    group.group,
                    kart,
                    p.start_position,
                    p.number,
                    p.pilot_id,
                    p.full_name,
                    p.qualy_time.map_or(String::new(), |t| t.to_string()),
                ));
            }
        }
    }
    lines.join("\n")
}

/// Format one scored race: header with winner, then one line per finisher
pub fn format_race_result(result: &RaceComputedResult, pilots: &[Pilot], use_colors: bool) -> String {
    let index = pilot_index(pilots);
    let name_of = |id: &str| {
        index
            .get(id)
            .map_or_else(|| id.to_string(), |p| p.full_name.clone())
    };

    let winner = match (&result.general_winner_pilot_id, result.winning_category) {
        (Some(id), Some(cat)) => format!("winner {} ({})", name_of(id), cat),
        _ => "no finishers".to_string(),
    };
    let header = format!("Race {} - {}", result.race, winner);
    let mut lines = vec![if use_colors {
        header.bold().to_string()
    } else {
        header
    }];

    let term_width = get_terminal_width();
    // pos(4) + kart(6) + cat pos(4) + points breakdown(22) + separators
    let fixed_width = 4 + 6 + 4 + 22 + 8;

    for e in &result.entries {
        let pos = format!("{:>3}.", e.final_position);
        let cat_pos = format!("({})", e.category_position);
        let breakdown = format!(
            "{:>3} = {}+{}+{}",
            e.final_points, e.base_points, e.collective_bonus, e.individual_bonus
        );
        let name = fit_name(&name_of(&e.pilot_id), fixed_width, term_width);
        if use_colors {
            lines.push(format!(
                "{} {} {:>4}  {}  {}",
                pos.dimmed(),
                e.category,
                cat_pos.dimmed(),
                breakdown.bold(),
                name
            ));
        } else {
            lines.push(format!(
                "{} {} {:>4}  {}  {}",
                pos, e.category, cat_pos, breakdown, name
            ));
        }
    }

    lines.join("\n")
}

/// Format one scored race as tab-separated values
/// Columns: race, final_position, pilot_id, category, category_position, base, collective, individual, final
pub fn format_race_result_tsv(result: &RaceComputedResult) -> String {
    result
        .entries
        .iter()
        .map(|e| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                e.race,
                e.final_position,
                e.pilot_id,
                e.category,
                e.category_position,
                e.base_points,
                e.collective_bonus,
                e.individual_bonus,
                e.final_points
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format the individual championship: Pos, Number, Points per race, Total, Name
pub fn format_individual_table(rows: &[IndividualStandingRow], use_colors: bool) -> String {
    if rows.is_empty() {
        return "No races scored yet.".to_string();
    }

    let term_width = get_terminal_width();
    let races = rows.first().map_or(0, |r| r.race_points.len());
    let fixed_width = 4 + 5 + races * 5 + 6 + 10;

    rows.iter()
        .map(|row| {
            let pos = format!("{:>3}.", row.position);
            let number = row
                .number
                .map_or_else(|| "#?  ".to_string(), |n| format!("#{:<3}", n));
            let per_race = row
                .race_points
                .iter()
                .map(|p| format!("{:>4}", p))
                .collect::<Vec<_>>()
                .join(" ");
            let total = format!("{:>5}", row.total_points);
            let name = fit_name(
                row.full_name.as_deref().unwrap_or(&row.pilot_id),
                fixed_width,
                term_width,
            );
            let category = row.category.map_or_else(|| "-".to_string(), |k| k.to_string());
            if use_colors {
                format!(
                    "{} {}  {}  {}  {:<5}  {}",
                    pos.dimmed(),
                    number.cyan(),
                    per_race.dimmed(),
                    total.bold(),
                    category,
                    name
                )
            } else {
                format!(
                    "{} {}  {}  {}  {:<5}  {}",
                    pos, number, per_race, total, category, name
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format the individual championship as tab-separated values
/// Columns: position, pilot_id, number, name, category, total, then one column per race
pub fn format_individual_tsv(rows: &[IndividualStandingRow]) -> String {
    rows.iter()
        .map(|row| {
            let mut cols = vec![
                row.position.to_string(),
                row.pilot_id.clone(),
                row.number.map_or(String::new(), |n| n.to_string()),
                row.full_name.clone().unwrap_or_default(),
                row.category.map_or(String::new(), |k| k.to_string()),
                row.total_points.to_string(),
            ];
            cols.extend(row.race_points.iter().map(|p| p.to_string()));
            cols.join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format the team championship with members listed under each team
pub fn format_team_table(rows: &[TeamStandingRow], use_colors: bool) -> String {
    if rows.is_empty() {
        return "No teams defined.".to_string();
    }

    let mut lines = Vec::new();
    for row in rows {
        let pos = format!("{:>3}.", row.position);
        let total = format!("{:>5}", row.total_points);
        if use_colors {
            lines.push(format!("{} {}  {}", pos.dimmed(), total.bold(), row.team_name.yellow()));
        } else {
            lines.push(format!("{} {}  {}", pos, total, row.team_name));
        }
        for m in &row.members {
            lines.push(format!(
                "         {:>5}  {}",
                m.total_points,
                m.full_name.as_deref().unwrap_or(&m.pilot_id)
            ));
        }
    }
    lines.join("\n")
}

/// Format the team championship as tab-separated values
/// Columns: position, team_id, team_name, total, member count
pub fn format_team_tsv(rows: &[TeamStandingRow]) -> String {
    rows.iter()
        .map(|row| {
            format!(
                "{}\t{}\t{}\t{}\t{}",
                row.position,
                row.team_id,
                row.team_name,
                row.total_points,
                row.members.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format qualy sessions with their status and assigned pilots
pub fn format_qualy_status(sessions: &[QualySession], pilots: &[Pilot], use_colors: bool) -> String {
    if sessions.is_empty() {
        return "No qualy sessions.".to_string();
    }

    let index = pilot_index(pilots);
    let mut lines = Vec::new();
    for session in sessions {
        let status = match session.status() {
            SessionStatus::Completed => "completed",
            SessionStatus::Pending => "pending",
        };
        let lock = if session.closed { ", closed" } else { "" };
        let header = format!(
            "{} ({} pilots, {}{})",
            session.name,
            session.assignments.len(),
            status,
            lock
        );
        lines.push(if use_colors {
            header.bold().to_string()
        } else {
            header
        });

        for a in &session.assignments {
            let (number, name) = index
                .get(a.pilot_id.as_str())
                .map_or(("#?  ".to_string(), a.pilot_id.clone()), |p| {
                    (format!("#{:<3}", p.number), p.full_name.clone())
                });
            lines.push(format!(
                "  {}  {:>10}  {}",
                number,
                format_opt_time(a.qualy_time),
                name
            ));
        }
    }
    lines.join("\n")
}

/// Format qualy sessions as tab-separated values
/// Columns: session_id, status, closed, pilot_id, qualy_time
pub fn format_qualy_tsv(sessions: &[QualySession]) -> String {
    let mut lines = Vec::new();
    for session in sessions {
        let status = match session.status() {
            SessionStatus::Completed => "completed",
            SessionStatus::Pending => "pending",
        };
        for a in &session.assignments {
            lines.push(format!(
                "{}\t{}\t{}\t{}\t{}",
                session.id,
                status,
                session.closed,
                a.pilot_id,
                a.qualy_time.map_or(String::new(), |t| t.to_string())
            ));
        }
    }
    lines.join("\n")
}

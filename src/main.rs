use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use grid_marshal::event::{
    apply, get_event_path, load_event, save_event, Command, EngineContext, EventError, EventState,
    Kart, Level, Pilot,
};
use grid_marshal::output;
use grid_marshal::qualy::{qualy_records, AssignMode};
use grid_marshal::scoring::RaceComputedResult;
use grid_marshal::standings::{build_combined_standings, individual_standings, team_standings};

const EXIT_SUCCESS: i32 = 0;
const EXIT_CONFIG: i32 = 4;
const EXIT_INPUT: i32 = 5;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum Format {
    Table,
    Tsv,
    Json,
}

#[derive(Subcommand, Debug)]
enum PilotCommands {
    /// Register a pilot
    Add {
        id: String,
        #[arg(long)]
        number: u32,
        #[arg(long)]
        name: String,
        /// PRO, AMATEUR or PRINCIPIANTE
        #[arg(long)]
        level: String,
        /// 390cc or 270cc
        #[arg(long)]
        kart: String,
    },
    /// List registered pilots
    List,
}

#[derive(Subcommand, Debug)]
enum TeamCommands {
    /// Deal the combined standings into teams, round-robin
    Generate {
        /// Team names, in dealing order
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Team championship
    Standings,
}

#[derive(Subcommand, Debug)]
enum QualyCommands {
    /// Create an empty qualy session
    Add {
        id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Fill open sessions by mode (level, kart or random)
    Assign {
        #[arg(long, default_value = "level")]
        mode: String,
        /// Seed for random mode; drawn at random when omitted
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Set open sessions explicitly, as session=pilot,pilot,... entries
    Layout {
        #[arg(required = true)]
        entries: Vec<String>,
    },
    /// Move one pilot into a session
    AssignPilot { session: String, pilot: String },
    /// Record a qualy time; omit the time to clear it
    Time {
        session: String,
        pilot: String,
        time: Option<f64>,
    },
    Close { session: String },
    Reopen { session: String },
    /// Sessions with their assignments and status
    Status,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
        /// Ask for each grid setting interactively
        #[arg(long)]
        wizard: bool,
    },
    #[command(subcommand)]
    Pilot(PilotCommands),
    /// Record a Time Attack lap
    Ta {
        session: String,
        pilot: String,
        time: f64,
    },
    /// Combined standings (default if no subcommand)
    Standings,
    #[command(subcommand)]
    Teams(TeamCommands),
    #[command(subcommand)]
    Qualy(QualyCommands),
    /// Generate race grids from the combined standings
    Grid {
        /// Seed for random split mode; drawn at random when omitted
        #[arg(long)]
        seed: Option<u64>,
        /// Print the stored grid without regenerating it
        #[arg(long)]
        show: bool,
    },
    /// Enter finishing positions as pilot=position pairs
    Positions {
        #[arg(long)]
        race: u32,
        #[arg(required = true)]
        entries: Vec<String>,
    },
    /// Score a race from its entered positions
    Score {
        #[arg(long)]
        race: u32,
        /// Enter positions first, as pilot=position pairs
        entries: Vec<String>,
    },
    /// Individual championship across all scored races
    Championship,
    /// Rewrite the event file in the current format
    Migrate,
}

#[derive(Parser, Debug)]
#[command(name = "grid-marshal")]
#[command(about = "Karting championship standings, grids and race scoring", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/grid-marshal/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Path to the event file (defaults to ~/.config/grid-marshal/event.json)
    #[arg(short, long, global = true)]
    event: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Table)]
    format: Format,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Print a value in the selected format
fn emit<T: Serialize + ?Sized>(
    format: Format,
    value: &T,
    table: impl FnOnce(bool) -> String,
    tsv: impl FnOnce() -> String,
) -> Result<()> {
    let out = match format {
        Format::Table => table(output::should_use_colors()),
        Format::Tsv => tsv(),
        Format::Json => output::format_json(value)?,
    };
    if !out.is_empty() {
        println!("{}", out);
    }
    Ok(())
}

/// Parse `pilot=position` pairs
fn parse_positions(entries: &[String]) -> Result<BTreeMap<String, u32>> {
    let mut positions = BTreeMap::new();
    for entry in entries {
        let (pilot, position) = entry
            .split_once('=')
            .with_context(|| format!("Expected pilot=position, got '{}'", entry))?;
        let position: u32 = position
            .trim()
            .parse()
            .with_context(|| format!("Invalid position in '{}'", entry))?;
        if positions.insert(pilot.trim().to_string(), position).is_some() {
            bail!("Pilot '{}' entered twice", pilot.trim());
        }
    }
    Ok(positions)
}

/// Parse `session=pilot,pilot` entries
fn parse_layout(entries: &[String]) -> Result<BTreeMap<String, Vec<String>>> {
    let mut layout = BTreeMap::new();
    for entry in entries {
        let (session, pilots) = entry
            .split_once('=')
            .with_context(|| format!("Expected session=pilot,pilot, got '{}'", entry))?;
        let pilots: Vec<String> = pilots
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if layout.insert(session.trim().to_string(), pilots).is_some() {
            bail!("Session '{}' listed twice", session.trim());
        }
    }
    Ok(layout)
}

fn seed_or_random(seed: Option<u64>) -> u64 {
    let seed = seed.unwrap_or_else(rand::random);
    log::info!("Using seed {}", seed);
    seed
}

/// Apply a command and persist the resulting snapshot
fn commit(
    state: &EventState,
    command: Command,
    ctx: &EngineContext,
    path: &Path,
) -> Result<EventState> {
    let next = apply(state, command, ctx)?;
    save_event(path, &next)?;
    Ok(next)
}

fn scored_results(state: &EventState) -> Vec<&RaceComputedResult> {
    state.results.iter().collect()
}

fn run(
    command: Commands,
    state: EventState,
    ctx: &EngineContext,
    path: &Path,
    format: Format,
) -> Result<()> {
    match command {
        Commands::Init { .. } => bail!("init runs before any event is loaded"),

        Commands::Pilot(PilotCommands::Add {
            id,
            number,
            name,
            level,
            kart,
        }) => {
            let level = Level::parse(&level)
                .with_context(|| format!("Unknown level '{}' (PRO, AMATEUR, PRINCIPIANTE)", level))?;
            let kart = Kart::parse(&kart)
                .with_context(|| format!("Unknown kart '{}' (390cc, 270cc)", kart))?;
            let pilot = Pilot {
                id,
                number,
                full_name: name,
                level,
                kart,
            };
            commit(&state, Command::AddPilot(pilot), ctx, path)?;
        }

        Commands::Pilot(PilotCommands::List) => {
            let mut pilots = state.pilots.clone();
            pilots.sort_by_key(|p| p.number);
            emit(
                format,
                &pilots,
                |_| {
                    pilots
                        .iter()
                        .map(|p| format!("#{:<3}  {}  {:<12}  {}", p.number, p.kart, p.level.to_string(), p.full_name))
                        .collect::<Vec<_>>()
                        .join("\n")
                },
                || {
                    pilots
                        .iter()
                        .map(|p| format!("{}\t{}\t{}\t{}\t{}", p.id, p.number, p.full_name, p.level, p.kart))
                        .collect::<Vec<_>>()
                        .join("\n")
                },
            )?;
        }

        Commands::Ta {
            session,
            pilot,
            time,
        } => {
            commit(
                &state,
                Command::RecordTimeAttack {
                    session_id: session,
                    pilot_id: pilot,
                    raw_time: time,
                },
                ctx,
                path,
            )?;
        }

        Commands::Standings => {
            let records = qualy_records(&state.qualy);
            let standings = build_combined_standings(&state.pilots, &state.time_attack, &records);
            emit(
                format,
                &standings,
                |c| output::format_standings_table(&standings, c),
                || output::format_standings_tsv(&standings),
            )?;
        }

        Commands::Teams(TeamCommands::Generate { names }) => {
            let next = commit(&state, Command::SetTeams { names }, ctx, path)?;
            let rows = team_standings(&scored_results(&next), &next.teams, &next.pilots);
            emit(
                format,
                &next.teams,
                |c| output::format_team_table(&rows, c),
                || output::format_team_tsv(&rows),
            )?;
        }

        Commands::Teams(TeamCommands::Standings) => {
            let rows = team_standings(&scored_results(&state), &state.teams, &state.pilots);
            emit(
                format,
                &rows,
                |c| output::format_team_table(&rows, c),
                || output::format_team_tsv(&rows),
            )?;
        }

        Commands::Qualy(qualy) => {
            let command = match qualy {
                QualyCommands::Add { id, name } => Command::AddQualySession {
                    name: name.unwrap_or_else(|| id.clone()),
                    id,
                },
                QualyCommands::Assign { mode, seed } => {
                    let mode = AssignMode::parse(&mode)
                        .with_context(|| format!("Unknown assign mode '{}' (level, kart, random)", mode))?;
                    Command::AssignQualy {
                        mode,
                        seed: seed_or_random(seed),
                    }
                }
                QualyCommands::Layout { entries } => {
                    Command::AssignQualyLayout(parse_layout(&entries)?)
                }
                QualyCommands::AssignPilot { session, pilot } => Command::AssignQualyPilot {
                    session_id: session,
                    pilot_id: pilot,
                },
                QualyCommands::Time {
                    session,
                    pilot,
                    time,
                } => Command::RecordQualyTime {
                    session_id: session,
                    pilot_id: pilot,
                    time,
                },
                QualyCommands::Close { session } => Command::CloseQualySession(session),
                QualyCommands::Reopen { session } => Command::ReopenQualySession(session),
                QualyCommands::Status => {
                    return emit(
                        format,
                        &state.qualy,
                        |c| output::format_qualy_status(&state.qualy, &state.pilots, c),
                        || output::format_qualy_tsv(&state.qualy),
                    );
                }
            };
            let next = commit(&state, command, ctx, path)?;
            emit(
                format,
                &next.qualy,
                |c| output::format_qualy_status(&next.qualy, &next.pilots, c),
                || output::format_qualy_tsv(&next.qualy),
            )?;
        }

        Commands::Grid { seed, show } => {
            let next = if show {
                state
            } else {
                commit(
                    &state,
                    Command::GenerateGrid {
                        seed: seed_or_random(seed),
                    },
                    ctx,
                    path,
                )?
            };
            emit(
                format,
                &next.grid,
                |c| output::format_grid_table(&next.grid, c),
                || output::format_grid_tsv(&next.grid),
            )?;
        }

        Commands::Positions { race, entries } => {
            let positions = parse_positions(&entries)?;
            commit(
                &state,
                Command::EnterFinishingPositions { race, positions },
                ctx,
                path,
            )?;
        }

        Commands::Score { race, entries } => {
            let mut next = state;
            if !entries.is_empty() {
                let positions = parse_positions(&entries)?;
                next = apply(&next, Command::EnterFinishingPositions { race, positions }, ctx)?;
            }
            let next = commit(&next, Command::CalculateRace { race, at: Utc::now() }, ctx, path)?;
            let result = next
                .result(race)
                .with_context(|| format!("Race {} was not scored", race))?;
            emit(
                format,
                result,
                |c| output::format_race_result(result, &next.pilots, c),
                || output::format_race_result_tsv(result),
            )?;
        }

        Commands::Championship => {
            let rows = individual_standings(&scored_results(&state), &state.pilots);
            emit(
                format,
                &rows,
                |c| output::format_individual_table(&rows, c),
                || output::format_individual_tsv(&rows),
            )?;
        }

        Commands::Migrate => {
            save_event(path, &state)?;
            println!("Event file at {} is at version {}", path.display(), state.version);
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Standings);
    let config_path = cli.config.map(PathBuf::from);

    if let Commands::Init { force, wizard } = command {
        let result = if wizard {
            grid_marshal::config::run_init_wizard(config_path, force)
        } else {
            grid_marshal::config::write_default_config(config_path, force)
                .map(|path| println!("Config written to {}", path.display()))
        };
        if let Err(e) = result {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
        std::process::exit(EXIT_SUCCESS);
    }

    // Load config
    let config = match grid_marshal::config::load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(e) = grid_marshal::logging::setup_logging(&config.log_level, cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    // Validate every config section at startup
    let ctx = match config.engine_context() {
        Ok(ctx) => ctx,
        Err(EventError::Config(errors)) => {
            eprintln!("Config errors:");
            for error in errors {
                eprintln!("  - {}", error);
            }
            std::process::exit(EXIT_CONFIG);
        }
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    let event_path = cli.event.map(PathBuf::from).unwrap_or_else(get_event_path);
    let state = match load_event(&event_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Event error: {:#}", e);
            std::process::exit(EXIT_INPUT);
        }
    };
    log::debug!(
        "Loaded event '{}' with {} pilots from {}",
        state.name,
        state.pilots.len(),
        event_path.display()
    );

    if let Err(e) = run(command, state, &ctx, &event_path, cli.format) {
        eprintln!("Error: {:#}", e);
        std::process::exit(EXIT_INPUT);
    }
    std::process::exit(EXIT_SUCCESS);
}

pub mod migrate;
pub mod reducer;
pub mod storage;
pub mod types;

pub use migrate::migrate;
pub use reducer::{apply, Command, EngineContext, EventError};
pub use storage::{get_event_path, load_event, save_event};
pub use types::{
    pilot_index, team_membership, EventState, FinishSheet, Kart, Level, Pilot, Team,
    EVENT_VERSION,
};

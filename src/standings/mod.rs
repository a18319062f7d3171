pub mod aggregate;
pub mod combined;

pub use aggregate::{
    individual_standings, team_standings, IndividualStandingRow, TeamMemberPoints,
    TeamStandingRow,
};
pub use combined::{
    best_qualy, best_time_attack, build_combined_standings, CombinedStanding, StandingSource,
};

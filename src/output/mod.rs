pub mod formatter;

pub use formatter::{
    format_grid_table, format_grid_tsv, format_individual_table, format_individual_tsv,
    format_json, format_qualy_status, format_qualy_tsv, format_race_result,
    format_race_result_tsv, format_standings_table, format_standings_tsv, format_team_table,
    format_team_tsv, format_time, should_use_colors,
};

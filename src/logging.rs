use log::LevelFilter;

/// Parse a config `log_level` value, case-insensitively.
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Install the stderr logger.
///
/// `verbose` forces debug output; otherwise the configured level applies and
/// an unknown level falls back to info.
pub fn setup_logging(level: &str, verbose: bool) -> Result<(), fern::InitError> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        parse_level(level).unwrap_or(LevelFilter::Info)
    };

    fern::Dispatch::new()
        .level(level)
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(std::io::stderr())
        .apply()?;

    Ok(())
}

//! Logger setup: stdout plus a log file under the app data dir.

use std::path::PathBuf;

use crate::paths;

fn format_record(
    out: fern::FormatCallback<'_>,
    message: &std::fmt::Arguments<'_>,
    record: &log::Record<'_>,
) {
    out.finish(format_args!(
        "[{}][{}][{}][{:?}] {}",
        chrono::Local::now().format("%Y-%m-%d"),
        chrono::Local::now().format("%H:%M:%S"),
        record.target(),
        record.level(),
        message
    ))
}

/// Install the global logger. Returns the log file path.
pub fn init_logger() -> Result<PathBuf, fern::InitError> {
    let log_file = paths::log_file_path()
        .unwrap_or_else(|_| PathBuf::from(".").join("logs").join("saywe.log"));
    if let Some(dir) = log_file.parent() {
        std::fs::create_dir_all(dir).ok();
    }

    fern::Dispatch::new()
        .format(format_record)
        .level(log::LevelFilter::Debug)
        // reqwest/hyper connection chatter drowns the player logs
        .level_for("hyper", log::LevelFilter::Info)
        .level_for("reqwest", log::LevelFilter::Info)
        .chain(
            fern::Dispatch::new()
                .filter(|m| !m.target().starts_with("symphonia"))
                .chain(std::io::stdout()),
        )
        .chain(fern::log_file(&log_file)?)
        .apply()?;

    Ok(log_file)
}

//! File logging. stdout belongs to the operator console, so tracing output
//! goes to a daily rolling file (plus os_log on macOS).

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_BASENAME: &str = "obs-director.log";
const LOG_DIR_ENV: &str = "OBS_DIRECTOR_LOG_PATH";
const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Install the global subscriber and return the flush guard together with
/// the directory written to. Keep the guard alive until exit.
pub fn init_logging() -> Result<(WorkerGuard, PathBuf)> {
    let dir = match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => ProjectDirs::from("dev", "obs-director", "director")
            .context("Failed to determine project directories for log path")?
            .data_local_dir()
            .join("logs"),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {:?}", dir))?;
    let pruned = prune_logs(&dir, RETENTION);

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, LOG_FILE_BASENAME));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .boxed();

    #[cfg(target_os = "macos")]
    let layers = vec![
        file,
        tracing_oslog::OsLogger::new("dev.obs-director.director", "default").boxed(),
    ];
    #[cfg(not(target_os = "macos"))]
    let layers = vec![file];

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .init();

    if pruned > 0 {
        tracing::debug!("Removed {} expired log files", pruned);
    }
    Ok((guard, dir))
}

/// Delete our log files older than `max_age`. Returns how many went.
fn prune_logs(dir: &Path, max_age: Duration) -> usize {
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return 0;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(LOG_FILE_BASENAME))
        })
        .filter(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .is_ok_and(|modified| modified < cutoff)
        })
        .filter(|entry| std::fs::remove_file(entry.path()).is_ok())
        .count()
}

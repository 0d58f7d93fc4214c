use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_ENV: &str = "PILOT_LOG";
const DEFAULT_FILTER: &str = "pilot=info";
const LOG_FILE_PREFIX: &str = "pilot.log";

/// Keeps the background log writer alive. Dropping it flushes pending lines.
pub struct Guard(#[allow(dead_code)] Option<WorkerGuard>);

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global tracing subscriber.
///
/// With a `log_dir`, records are written as JSON lines to a daily rolling file
/// inside it; otherwise they go to stderr, which keeps stdout free for the
/// transcript.
///
/// # Errors
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed
pub fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Guard> {
    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter())
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .try_init()?;

            Ok(Guard(Some(guard)))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter())
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()?;

            Ok(Guard(None))
        }
    }
}

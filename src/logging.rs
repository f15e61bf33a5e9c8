use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::{LookupSpan, Registry};
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber. `RUST_LOG` overrides `log_level`.
///
/// Events always go to stderr. With `log_file` they are also appended, as
/// plain text, to that file (or to a timestamped file inside it when it is
/// a directory).
pub fn init(
    log_format: &str,
    log_level: &str,
    log_file: Option<&Path>,
    hostname: &str,
) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(format!("warn,swup={}", log_level)))
        .map_err(|e| anyhow::anyhow!("Failed to initialize log filter: {}", e))?;

    let format = normalize_log_format(log_format);
    let log_path = log_file.map(|p| resolve_log_path(p, hostname));
    let file_layer = log_path
        .as_deref()
        .map(file_layer::<Registry>)
        .transpose()?;

    if format == "json" {
        tracing_subscriber::registry()
            .with(file_layer)
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(file_layer)
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    tracing::debug!(
        log_format = format,
        log_level = log_level,
        log_file = ?log_path,
        "Logging system initialized"
    );

    Ok(())
}

/// Log file name for one run against `hostname` at the current local time.
pub fn log_file_name(hostname: &str) -> String {
    format!(
        "swup_{}_{}.log",
        crate::backup::sanitize_hostname(hostname),
        Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// A directory gets a per-run file inside it; anything else is used as-is.
pub fn resolve_log_path(path: &Path, hostname: &str) -> PathBuf {
    if path.is_dir() {
        path.join(log_file_name(hostname))
    } else {
        path.to_path_buf()
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Plain-text layer appending to `path`.
fn file_layer<S>(path: &Path) -> Result<impl Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file = open_log_file(path)?;
    Ok(tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file)))
}

pub fn normalize_log_format(format: &str) -> &'static str {
    match format.to_lowercase().as_str() {
        "json" => "json",
        "pretty" | "compact" | "text" => "pretty",
        _ => {
            eprintln!(
                "WARN: Invalid log format '{}', defaulting to 'pretty'. Valid options: json, pretty",
                format
            );
            "pretty"
        }
    }
}

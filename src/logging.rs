use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Env var naming a log file; when unset, logs go to stderr.
pub const LOG_FILE_ENV: &str = "CLIENTSYNC_LOG";

/// Where [`init_tracing`] sent the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG` (default `info`). With `CLIENTSYNC_LOG`
/// set, output goes to `{path}.{timestamp}.{pid}` so concurrent runs never
/// share a file; if that file cannot be created, stderr is used instead.
pub fn init_tracing() -> LogTarget {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let requested = std::env::var(LOG_FILE_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(|p| unique_log_path(Path::new(&p)));

    let mut open_error = None;
    let file = requested.as_ref().and_then(|path| {
        std::fs::File::create(path)
            .map_err(|e| open_error = Some((path.clone(), e)))
            .ok()
    });
    let target = match (&file, &requested) {
        (Some(_), Some(path)) => LogTarget::File(path.clone()),
        _ => LogTarget::Stderr,
    };

    let file_layer = file.map(|file| {
        fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
    });
    let stderr_layer = (target == LogTarget::Stderr).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(fmt::time::UtcTime::rfc_3339())
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    if let Some((path, error)) = open_error {
        tracing::warn!(path = %path.display(), error = %error, "Log file unavailable, logging to stderr");
    }
    target
}

fn unique_log_path(base: &Path) -> PathBuf {
    let timestamp = chrono::Utc::now().timestamp();
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{}.{}", timestamp, std::process::id()));
    PathBuf::from(name)
}

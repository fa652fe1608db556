//! `tracing` subscriber setup. Every event the original C++ source logged with
//! `LOG(INFO)`/`LOG(ERROR)` is re-emitted as a structured `tracing` event at the
//! matching module.

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Install the global subscriber. Safe to call once at process startup; calling it
/// a second time in the same process is a no-op failure that is intentionally
/// swallowed (tests may call it repeatedly).
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Human => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

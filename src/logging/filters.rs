use tracing_subscriber::EnvFilter;

use super::LoggingError;

/// Фильтр из `RUST_LOG`, если переменная задана, иначе из `directive`.
pub fn build_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

/// Директива уровня для флагов `--verbose` / `--quiet`. Побеждает quiet.
pub fn level_for(
    verbose: bool,
    quiet: bool,
) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    }
}

// Tracing setup driven by the `[logging]` section.
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `logging.level` when it parses. Returns the
/// directive in effect so startup can log it.
pub fn init_tracing(logging: &LoggingConfig) -> String {
    let directive = filter_directive(&logging.level, std::env::var("RUST_LOG").ok().as_deref());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
    directive
}

/// Builds the filter directive for a configured level.
///
/// At `info` and below, sqlx is held at `warn` so every pooled query does not
/// land in the log.
pub fn filter_directive(level: &str, rust_log: Option<&str>) -> String {
    if let Some(env) = rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        if EnvFilter::try_new(env).is_ok() {
            return env.to_string();
        }
    }

    let level = level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" => format!("{level},sqlx=warn"),
        "" => "info,sqlx=warn".to_string(),
        _ => level,
    }
}

#[cfg(test)]
mod tests {
    use super::filter_directive;

    #[test]
    fn configured_level_quiets_sqlx() {
        assert_eq!(filter_directive("DEBUG", None), "debug,sqlx=warn");
        assert_eq!(filter_directive("info", Some("  ")), "info,sqlx=warn");
        assert_eq!(filter_directive("error", None), "error");
        assert_eq!(filter_directive("off", None), "off");
    }

    #[test]
    fn rust_log_overrides_configured_level() {
        assert_eq!(
            filter_directive("info", Some("autoauth=trace")),
            "autoauth=trace"
        );
        // An unparsable RUST_LOG falls back to the configured level.
        assert_eq!(filter_directive("warn", Some("autoauth=loud")), "warn");
    }
}

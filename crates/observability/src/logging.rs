//! Subscriber installation.

use tracing_subscriber::EnvFilter;

/// Output encoding of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable single-line output for local runs.
    Compact,
}

impl LogFormat {
    /// `"compact"` selects [`LogFormat::Compact`]; anything else is JSON.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("compact") {
            LogFormat::Compact
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directive used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LoggingConfig {
    /// Default config with the format taken from `WARDEN_LOG_FORMAT`.
    pub fn from_env() -> Self {
        let format = std::env::var("WARDEN_LOG_FORMAT")
            .map(|v| LogFormat::from_name(&v))
            .unwrap_or_default();
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    match config.format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Compact => builder.compact().try_init().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!(LogFormat::from_name("COMPACT"), LogFormat::Compact);
        assert_eq!(LogFormat::from_name("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("other"), LogFormat::Json);
    }

    #[test]
    fn repeated_init_is_a_no_op() {
        let config = LoggingConfig::default().with_default_filter("warn");
        init(&config);
        assert!(!init(&config.clone().with_format(LogFormat::Compact)));
    }
}

//! Logging utilities and configuration for the profiler.
//!
//! Profiling a wide table issues several queries per column, so per-query and
//! per-column logging is opt-in through [`LogConfig`]. Run-level events are
//! always emitted through `tracing` at `info`/`warn`.

use tracing::Level;

/// Logging configuration for a profiler.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for profiler components
    pub base_level: Level,
    /// Whether to log computed statistics per column
    pub log_column_details: bool,
    /// Whether to log the generated SQL of each query
    pub log_queries: bool,
    /// Maximum length for logged field values (to prevent huge logs)
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_column_details: false,
            log_queries: false,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_column_details: true,
            log_queries: true,
            max_field_length: 1024,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_column_details: false,
            log_queries: false,
            max_field_length: 128,
        }
    }

    pub fn balanced() -> Self {
        Self::default()
    }
}

/// Debug logging that skips argument evaluation unless the configured base
/// level includes debug.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for conditional per-column logging.
#[macro_export]
macro_rules! log_column {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_column_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for conditional query logging.
#[macro_export]
macro_rules! log_query {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_queries {
            tracing::debug!($($arg)*);
        }
    };
}

/// Truncates a string to the maximum field length (in characters) if needed.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    match value.char_indices().nth(max_length) {
        Some((idx, _)) => format!("{}...(truncated)", &value[..idx]),
        None => value.to_string(),
    }
}

/// Utilities for setting up structured logging.
pub mod setup {
    use tracing::Level;

    /// Configuration for the subscriber installed by [`init_logging`].
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for profiler components specifically
        pub profiler_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                profiler_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                profiler_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                profiler_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_profiler_level(mut self, level: Level) -> Self {
            self.profiler_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},term_profiler={}",
                    self.level.as_str().to_lowercase(),
                    self.profiler_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs a global `tracing` subscriber. `RUST_LOG` takes precedence over
    /// the configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use term_profiler::logging::setup::{LoggingConfig, init_logging};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}

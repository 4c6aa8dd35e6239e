//! Structured logging setup
//!
//! Initializes the `tracing` subscriber once per process. Console output is the
//! default; JSON output is meant for the container, where logs are shipped as-is.
//!
//! # Example
//!
//! ```no_run
//! use analyst::util::logging;
//!
//! // ANALYST_LOG_LEVEL=debug ANALYST_LOG_JSON=true
//! logging::init_from_env();
//!
//! tracing::info!(port = 8000, "Server starting");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Crates whose debug output drowns ours unless RUST_LOG asks for it
const NOISY_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "bollard", "genai"];

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for the analyst target
    pub level: Level,

    /// Emit one JSON object per event
    pub use_json: bool,

    /// Include the module target (e.g., analyst::image) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,

    /// Write to stderr instead of stdout
    pub to_stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
            to_stderr: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with source locations, for the container image
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            to_stderr: false,
        }
    }
}

/// Parses a log level from a string, falling back to INFO
///
/// ```
/// use analyst::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("WARN"), Level::WARN);
/// assert_eq!(parse_level("loud"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn build_filter(level: Level) -> EnvFilter {
    if env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    let mut filter = EnvFilter::new("warn");
    if let Ok(directive) = format!("analyst={}", level).parse() {
        filter = filter.add_directive(directive);
    }
    if let Ok(directive) = format!("tower_http={}", level).parse() {
        filter = filter.add_directive(directive);
    }
    for target in NOISY_TARGETS {
        if let Ok(directive) = format!("{}=warn", target).parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Initializes the logging system; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);

        let layer = fmt::layer()
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location);

        match (config.use_json, config.to_stderr) {
            (true, true) => tracing_subscriber::registry()
                .with(filter)
                .with(layer.json().with_writer(std::io::stderr))
                .init(),
            (true, false) => tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .init(),
            (false, true) => tracing_subscriber::registry()
                .with(filter)
                .with(layer.with_writer(std::io::stderr))
                .init(),
            (false, false) => tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .init(),
        }
    });
}

/// Initializes logging from `ANALYST_LOG_LEVEL` and `ANALYST_LOG_JSON`
pub fn init_from_env() {
    init_logging(LoggingConfig::from_env());
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let level_str = env::var("ANALYST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let use_json = env::var("ANALYST_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        Self {
            level: parse_level(&level_str),
            use_json,
            ..Default::default()
        }
    }
}

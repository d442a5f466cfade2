//! SecureState Logging
//!
//! Structured diagnostic logging for the SecureState CSRF layer, controlled
//! through environment variables and silenced in automated test runs.
//!
//! # Features
//!
//! - **Environment-controlled**: `SECURESTATE_DEBUG=1` enables debug logging
//! - **Test-aware**: `SECURESTATE_ENV=test` suppresses all output
//! - **Structured logging**: key-value fields via [`event`]
//! - **Multiple formats**: JSON (default), pretty, compact
//!
//! # Usage
//!
//! ```rust
//! use securestate_log::{debug, info, warn, error, trace};
//!
//! debug!("Issuing token");
//! info!("Cookie name is {}", "_csrfToken");
//! warn!(target: "securestate::verify", "CSRF token missing.");
//! ```
//!
//! # Environment Variables
//!
//! - `SECURESTATE_DEBUG=1` - Enable debug logging
//! - `SECURESTATE_ENV=test` - Suppress every log line
//! - `SECURESTATE_LOG_LEVEL=debug|info|warn|error` - Set log level
//! - `SECURESTATE_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `SECURESTATE_LOG_COLOR=1|0` - Enable/disable colors

use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::env;
use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

// ============================================================================
// Log Levels
// ============================================================================

/// Log level for SecureState logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    /// Trace level (most verbose)
    Trace = 0,
    /// Debug level
    Debug = 1,
    /// Info level
    Info = 2,
    /// Warning level
    Warn = 3,
    /// Error level (least verbose)
    Error = 4,
    /// Off (no logging)
    Off = 5,
}

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            _ => Level::Off,
        }
    }

    #[cfg(feature = "color")]
    fn colored(&self) -> colored::ColoredString {
        use colored::Colorize;
        match self {
            Level::Trace => "TRACE".magenta(),
            Level::Debug => "DEBUG".blue(),
            Level::Info => "INFO".green(),
            Level::Warn => "WARN".yellow(),
            Level::Error => "ERROR".red().bold(),
            Level::Off => "OFF".white(),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-column human format
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Global Configuration
// ============================================================================

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Set when running under an automated test context.
static SUPPRESSED: AtomicBool = AtomicBool::new(false);

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

/// Logging configuration.
#[derive(Debug)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Whether output is suppressed (test context)
    pub suppressed: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled
    pub color: bool,
    /// Whether to include timestamps
    pub timestamps: bool,
    /// Whether to include the target
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            suppressed: false,
            level: Level::Info,
            format: Format::Json,
            color: false,
            timestamps: true,
            module_path: true,
        }
    }
}

fn flag(value: Option<String>) -> Option<bool> {
    value.map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn names_test_run(value: Option<String>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("test"))
}

/// Whether `SECURESTATE_ENV` names an automated test run.
pub fn is_test_environment() -> bool {
    names_test_run(env::var("SECURESTATE_ENV").ok())
}

impl LogConfig {
    /// Create config from environment variables and publish it to the global flags.
    pub fn from_env() -> Self {
        let config = Self::from_lookup(|name| env::var(name).ok());

        DEBUG_ENABLED.store(config.debug, Ordering::SeqCst);
        SUPPRESSED.store(config.suppressed, Ordering::SeqCst);
        LOG_LEVEL.store(config.level as u8, Ordering::SeqCst);

        config
    }

    /// Build a config from an arbitrary variable source. Touches no global state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let debug = flag(lookup("SECURESTATE_DEBUG")).unwrap_or(false);
        let suppressed = names_test_run(lookup("SECURESTATE_ENV"));

        let level = lookup("SECURESTATE_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("SECURESTATE_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Json);

        let color = flag(lookup("SECURESTATE_LOG_COLOR"))
            .unwrap_or_else(|| lookup("NO_COLOR").is_none() && std::io::stderr().is_terminal());

        Self {
            debug,
            suppressed,
            level,
            format,
            color,
            timestamps: flag(lookup("SECURESTATE_LOG_TIMESTAMPS")).unwrap_or(true),
            module_path: flag(lookup("SECURESTATE_LOG_MODULE")).unwrap_or(true),
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Initialize the logging system eagerly.
///
/// Called implicitly by the first emitted log line.
pub fn init() {
    Lazy::force(&CONFIG);
}

#[inline]
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Whether all output is currently suppressed.
#[inline]
pub fn is_suppressed() -> bool {
    Lazy::force(&CONFIG);
    SUPPRESSED.load(Ordering::Relaxed)
}

/// Check if a log level would be emitted.
#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    if is_suppressed() {
        return false;
    }
    level as u8 >= LOG_LEVEL.load(Ordering::Relaxed) || (level == Level::Debug && is_debug_enabled())
}

pub fn current_level() -> Level {
    Level::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level at runtime.
pub fn set_level(level: Level) {
    Lazy::force(&CONFIG);
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Enable or disable debug mode at runtime.
pub fn set_debug(enabled: bool) {
    Lazy::force(&CONFIG);
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    if enabled && current_level() > Level::Debug {
        set_level(Level::Debug);
    }
}

/// Force suppression on or off, overriding `SECURESTATE_ENV`.
pub fn set_suppressed(suppressed: bool) {
    Lazy::force(&CONFIG);
    SUPPRESSED.store(suppressed, Ordering::SeqCst);
}

pub fn config() -> &'static LogConfig {
    &CONFIG
}

// ============================================================================
// Log Output
// ============================================================================

/// Log a message with the given level.
#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    event(level, target, message, &[]);
}

/// Emit a structured event with key-value fields.
///
/// ```rust
/// use securestate_log::{event, Level};
///
/// event(Level::Warn, "securestate::validate", "token rejected", &[("reason", "Malformed")]);
/// ```
pub fn event(level: Level, target: &str, message: &str, fields: &[(&str, &str)]) {
    if is_level_enabled(level) {
        write_event(level, target, message, fields);
    }
}

/// Like [`event`], but ignores the level filter. Only suppression applies.
///
/// For callers with their own opt-in switch, such as a per-component debug flag.
pub fn event_forced(level: Level, target: &str, message: &str, fields: &[(&str, &str)]) {
    if !is_suppressed() {
        write_event(level, target, message, fields);
    }
}

thread_local! {
    static CAPTURED: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Run `f` and collect the lines it emits on this thread instead of writing them.
///
/// ```rust
/// use securestate_log::{capture, event_forced, Level};
///
/// let ((), lines) = capture(|| event_forced(Level::Debug, "t", "hello", &[]));
/// assert!(lines.len() <= 1);
/// ```
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    let outer = CAPTURED.with(|cell| cell.replace(Some(Vec::new())));
    let result = f();
    let lines = CAPTURED.with(|cell| cell.replace(outer)).unwrap_or_default();
    (result, lines)
}

fn write_event(level: Level, target: &str, message: &str, fields: &[(&str, &str)]) {
    let config = config();
    let line = match config.format {
        Format::Json => render_json(level, target, message, fields),
        Format::Pretty | Format::Compact => Some(render_text(level, target, message, fields, config)),
    };
    let Some(line) = line else {
        return;
    };

    let line = CAPTURED.with(|cell| match cell.borrow_mut().as_mut() {
        Some(lines) => {
            lines.push(line);
            None
        }
        None => Some(line),
    });
    if let Some(line) = line {
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }
}

fn timestamp(format: Format) -> String {
    match format {
        Format::Compact => chrono::Local::now().format("%H:%M:%S").to_string(),
        _ => chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
    }
}

fn level_label(level: Level, format: Format, config: &LogConfig) -> String {
    if format == Format::Compact {
        return level.as_str()[..1].to_string();
    }

    #[cfg(feature = "color")]
    {
        if config.color {
            return format!("{:5}", level.colored());
        }
    }
    #[cfg(not(feature = "color"))]
    let _ = config;
    format!("{:5}", level.as_str())
}

/// Human-readable line for the pretty and compact formats.
fn render_text(
    level: Level,
    target: &str,
    message: &str,
    fields: &[(&str, &str)],
    config: &LogConfig,
) -> String {
    let mut line = String::new();

    if config.timestamps {
        line.push_str(&timestamp(config.format));
        line.push(' ');
    }
    line.push_str(&level_label(level, config.format, config));
    line.push(' ');

    if config.module_path && !target.is_empty() {
        match config.format {
            Format::Compact => line.push_str(&format!("{}: ", target)),
            _ => line.push_str(&format!("[{}] ", target)),
        }
    }

    line.push_str(message);
    for (key, value) in fields {
        line.push_str(&format!(" {}={}", key, value));
    }
    line
}

fn render_json(level: Level, target: &str, message: &str, fields: &[(&str, &str)]) -> Option<String> {
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct LogEntry<'a> {
        timestamp: String,
        level: &'a str,
        target: &'a str,
        message: &'a str,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        fields: BTreeMap<&'a str, &'a str>,
    }

    let entry = LogEntry {
        timestamp: chrono::Utc::now().to_rfc3339(),
        level: level.as_str(),
        target,
        message,
        fields: fields.iter().copied().collect(),
    };

    serde_json::to_string(&entry).ok()
}

// ============================================================================
// Macros
// ============================================================================

#[doc(hidden)]
#[macro_export]
macro_rules! __emit {
    ($level:expr, $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($level) {
            $crate::log($level, $target, &format!($($arg)+));
        }
    };
}

/// Log a trace message.
#[macro_export]
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => { $crate::__emit!($crate::Level::Trace, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Trace, module_path!(), $($arg)+) };
}

/// Log a debug message.
///
/// Emitted when `SECURESTATE_DEBUG=1` or the level is `debug`, unless the
/// process runs in a test context.
///
/// ```rust
/// use securestate_log::debug;
///
/// let token = "abc123";
/// debug!("CSRF token generated: {}", token);
/// debug!(target: "securestate::issue", "reusing cookie token");
/// ```
#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => { $crate::__emit!($crate::Level::Debug, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Debug, module_path!(), $($arg)+) };
}

/// Log an info message.
#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => { $crate::__emit!($crate::Level::Info, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Info, module_path!(), $($arg)+) };
}

/// Log a warning message.
#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => { $crate::__emit!($crate::Level::Warn, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Warn, module_path!(), $($arg)+) };
}

/// Log an error message.
#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => { $crate::__emit!($crate::Level::Error, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Error, module_path!(), $($arg)+) };
}

// ============================================================================
// Tracing Integration
// ============================================================================

#[cfg(feature = "tracing")]
pub mod tracing_compat {
    //! Tracing compatibility layer.
    //!
    //! Builds a subscriber whose filter follows the SecureState log level.

    use super::*;

    pub fn subscriber() -> impl tracing::Subscriber {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{EnvFilter, fmt};

        let config = config();
        let level = if config.suppressed {
            "off".to_string()
        } else {
            current_level().as_str().to_lowercase()
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(config.color))
    }
}

// ============================================================================
// Tests
// ============================================================================

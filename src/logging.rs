//! Structured logging for the bandwidth collector
//!
//! This module provides:
//! - Structured log entries with levels, fields and correlation IDs
//! - Console, JSON and compact output formats
//! - A sweep logger that reports every stage failure with the endpoint,
//!   direction and target involved
//! - A sink logger for payload and response details in debug mode

use crate::error::{AppError, ParseError, ProbeError, Result, SinkError};
use crate::models::{Direction, Endpoint, Measurement, ResolvedConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most detailed
    Trace = 0,
    /// Debug level - probe command lines and sink payloads
    Debug = 1,
    /// Info level - measurement results and sweep summaries
    Info = 2,
    /// Warning level - potentially harmful situations
    Warn = 3,
    /// Error level - a measurement or send was lost, the loop continues
    Error = 4,
    /// Fatal level - startup failures
    Fatal = 5,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",    // White
            LogLevel::Debug => "\x1b[36m",    // Cyan
            LogLevel::Info => "\x1b[32m",     // Green
            LogLevel::Warn => "\x1b[33m",     // Yellow
            LogLevel::Error => "\x1b[31m",    // Red
            LogLevel::Fatal => "\x1b[35m",    // Magenta
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "console" | "text" => Ok(LogFormat::Console),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(AppError::parse(format!("Invalid log format: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp when log entry was created
    pub timestamp: DateTime<Utc>,
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID for tracking related events
    pub correlation_id: Option<String>,
    /// Additional structured fields
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// Shared logging context for session-wide fields
#[derive(Debug, Default)]
struct LogContext {
    /// Global correlation ID for the session
    session_id: Option<String>,
    /// Additional context fields
    context_fields: BTreeMap<String, serde_json::Value>,
}

/// Logger implementation with multiple output formats
#[derive(Debug, Clone)]
pub struct Logger {
    /// Minimum log level to output
    min_level: LogLevel,
    /// Whether to use colored output
    use_color: bool,
    /// Output format
    format: LogFormat,
    /// Logger name
    name: String,
    /// Shared context storage
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    /// Create a new logger
    pub fn new(name: &str) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            format: LogFormat::Console,
            name: name.to_string(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Create a logger with the run configuration
    pub fn with_config(name: &str, config: &ResolvedConfig) -> Self {
        Self {
            min_level: if config.debug { LogLevel::Debug } else { LogLevel::Info },
            use_color: config.enable_color,
            format: config.log_format,
            name: name.to_string(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Create a logger for another component sharing this logger's settings
    /// and session context
    pub fn named(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    /// Set minimum log level
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Set output format
    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    /// Enable or disable colored output
    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    /// Set session correlation ID
    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Add context field for all subsequent log entries
    pub async fn add_context_field<T: Serialize>(&self, key: &str, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key.to_string(), json_value);
        }
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Check if a log level would be output
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    /// Write log entry to output
    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        for (key, value) in &context.context_fields {
            entry.fields.entry(key.clone()).or_insert_with(|| value.clone());
        }
        drop(context);

        let output = self.render(&entry);

        // Write to stderr for errors/warnings, stdout for others
        if entry.level >= LogLevel::Warn {
            let _ = writeln!(io::stderr(), "{}", output);
        } else {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }

    fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.format_console(entry),
            LogFormat::Json => self.format_json(entry),
            LogFormat::Compact => self.format_compact(entry),
        }
    }

    /// Format log entry for console output
    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short = correlation_id.get(..8).unwrap_or(correlation_id);
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let fields_str: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            output.push_str(&format!(" {{{}}}", fields_str.join(", ")));
        }

        output
    }

    /// Format log entry as JSON
    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!("{{\"error\": \"Failed to serialize log entry\", \"message\": \"{}\"}}", entry.message),
        }
    }

    /// Format log entry in compact format
    fn format_compact(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S");
        format!(
            "{} {} {}: {}",
            timestamp,
            entry.level.as_str().chars().next().unwrap_or('?'),
            entry.logger,
            entry.message
        )
    }
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: BTreeMap::new(),
            },
        }
    }

    /// Add a correlation ID
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Add endpoint and direction fields
    pub fn target(self, endpoint: &Endpoint, direction: Direction) -> Self {
        self.field("endpoint", &endpoint.address)
            .field("label", &endpoint.label)
            .field("direction", direction)
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }

    #[cfg(test)]
    fn into_entry(self) -> LogEntry {
        self.entry
    }
}

/// Aggregated numbers for the end-of-sweep log line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepTotals {
    pub endpoints: usize,
    pub recorded: usize,
    pub probe_failures: usize,
    pub parse_failures: usize,
    pub sink_failures: usize,
    pub skipped: usize,
}

/// Logger for the measurement cycle
#[derive(Debug, Clone)]
pub struct SweepLogger {
    logger: Logger,
    probe_port: u16,
    sink_target: String,
}

impl SweepLogger {
    pub fn new(logger: &Logger, config: &ResolvedConfig) -> Self {
        Self {
            logger: logger.named("SWEEP"),
            probe_port: config.probe_port,
            sink_target: config.sink.target().to_string(),
        }
    }

    /// Log the start of a sweep and return its correlation ID
    pub async fn sweep_started(&self, sweep: u64, endpoints: usize) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        self.logger
            .debug(&format!("Starting sweep #{} over {} endpoint(s)", sweep, endpoints))
            .correlation_id(&correlation_id)
            .field("sweep", sweep)
            .field("endpoints", endpoints)
            .log()
            .await;
        correlation_id
    }

    pub async fn sweep_finished(&self, correlation_id: &str, sweep: u64, totals: SweepTotals, elapsed_ms: u128) {
        let level = if totals.recorded == 0 && totals.endpoints > 0 {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };
        self.logger
            .log(
                level,
                &format!(
                    "Sweep #{} finished: {} recorded, {} probe failures, {} parse failures, {} sink failures",
                    sweep, totals.recorded, totals.probe_failures, totals.parse_failures, totals.sink_failures
                ),
            )
            .correlation_id(correlation_id)
            .field("sweep", sweep)
            .field("totals", totals)
            .field("elapsed_ms", elapsed_ms as u64)
            .log()
            .await;
    }

    pub async fn sweep_cancelled(&self, correlation_id: &str, sweep: u64) {
        self.logger
            .warn(&format!("Sweep #{} cancelled", sweep))
            .correlation_id(correlation_id)
            .field("sweep", sweep)
            .log()
            .await;
    }

    pub async fn sleeping(&self, seconds: u64) {
        self.logger
            .debug(&format!("Sleeping {}s until the next sweep", seconds))
            .field("interval_seconds", seconds)
            .log()
            .await;
    }

    pub async fn measurement_recorded(&self, correlation_id: &str, endpoint: &Endpoint, measurement: &Measurement) {
        let direction = measurement.direction;
        let capitalized = match direction {
            Direction::Download => "Download",
            Direction::Upload => "Upload",
        };
        self.logger
            .info(&format!(
                "{} results for endpoint {} [{}] -> {} bps",
                capitalized, endpoint.address, endpoint.label, measurement.bits_per_second
            ))
            .correlation_id(correlation_id)
            .target(endpoint, direction)
            .field("bits_per_second", measurement.bits_per_second)
            .log()
            .await;
    }

    pub async fn probe_failed(
        &self,
        correlation_id: &str,
        endpoint: &Endpoint,
        direction: Direction,
        error: &ProbeError,
        output: &str,
    ) {
        self.logger
            .error(&format!(
                "Error testing to the target server at {}:{}: {}",
                endpoint.address, self.probe_port, error
            ))
            .correlation_id(correlation_id)
            .target(endpoint, direction)
            .field("port", self.probe_port)
            .field("output", output.trim())
            .log()
            .await;
    }

    pub async fn parse_failed(&self, correlation_id: &str, endpoint: &Endpoint, direction: Direction, error: &ParseError) {
        let message = match error {
            ParseError::ProbeReported { .. } => format!(
                "Error testing to the target server at {}:{}, verify the probe server is running and reachable: {}",
                endpoint.address, self.probe_port, error
            ),
            _ => format!(
                "No valid throughput returned from the test to {}:{}, run with --debug for details: {}",
                endpoint.address, self.probe_port, error
            ),
        };
        self.logger
            .error(&message)
            .correlation_id(correlation_id)
            .target(endpoint, direction)
            .field("port", self.probe_port)
            .log()
            .await;
    }

    pub async fn sink_failed(&self, correlation_id: &str, endpoint: &Endpoint, direction: Direction, error: &SinkError) {
        let mut builder = self
            .logger
            .error(&format!(
                "Could not deliver the {} result for {} to {}: {}",
                direction, endpoint.label, self.sink_target, error
            ))
            .correlation_id(correlation_id)
            .target(endpoint, direction)
            .field("sink", &self.sink_target)
            .field("sink_error", error.kind());

        if let SinkError::UnexpectedStatus { status, body } = error {
            builder = builder.field("status", status).field("body", body);
        }

        builder.log().await;
    }

    pub async fn skipped(&self, correlation_id: &str, endpoint: &Endpoint, direction: Direction) {
        self.logger
            .debug(&format!("Skipping {} test for {}: sweep cancelled", direction, endpoint))
            .correlation_id(correlation_id)
            .target(endpoint, direction)
            .log()
            .await;
    }

    pub async fn command(&self, program: &str, args: &[String]) {
        self.logger
            .debug(&format!("[CMD] Running command -> {} {}", program, args.join(" ")))
            .log()
            .await;
    }
}

/// Logger for sink traffic
#[derive(Debug, Clone)]
pub struct SinkLogger {
    logger: Logger,
}

impl SinkLogger {
    pub fn new(logger: &Logger) -> Self {
        Self { logger: logger.named("SINK") }
    }

    pub async fn sending(&self, target: &str, body: &str) {
        self.logger
            .debug(&format!("Sending the following msg to the tsdb: {}", body.trim_end()))
            .field("target", target)
            .log()
            .await;
    }

    pub async fn response(&self, target: &str, status: u16, body: &str) {
        self.logger
            .debug(&format!("Response from {}: {}", target, status))
            .field("status", status)
            .field("body", body)
            .log()
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_logger(format: LogFormat) -> Logger {
        let mut logger = Logger::new("TEST");
        logger.set_color(false);
        logger.set_format(format);
        logger
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_would_log_respects_level() {
        let mut logger = Logger::new("TEST");
        assert!(!logger.would_log(LogLevel::Debug));
        assert!(logger.would_log(LogLevel::Error));
        logger.set_level(LogLevel::Trace);
        assert!(logger.would_log(LogLevel::Trace));
    }

    #[test]
    fn test_debug_config_lowers_level() {
        let config = ResolvedConfig { debug: true, ..Default::default() };
        let logger = Logger::with_config("TEST", &config);
        assert!(logger.would_log(LogLevel::Debug));
    }

    #[test]
    fn test_console_format_includes_fields() {
        let logger = plain_logger(LogFormat::Console);
        let endpoint = Endpoint::new("10.0.0.5", Some("west".to_string()));
        let entry = logger
            .error("probe failed")
            .correlation_id("0123456789abcdef")
            .target(&endpoint, Direction::Upload)
            .into_entry();

        let line = logger.render(&entry);
        assert!(line.contains("ERROR [TEST] probe failed [01234567]"));
        assert!(line.contains("direction=\"upload\""));
        assert!(line.contains("endpoint=\"10.0.0.5\""));
        assert!(line.contains("label=\"west\""));
    }

    #[test]
    fn test_json_format_round_trips() {
        let logger = plain_logger(LogFormat::Json);
        let entry = logger.info("done").field("bits_per_second", 12_345_000i64).into_entry();

        let json: serde_json::Value = serde_json::from_str(&logger.render(&entry)).unwrap();
        assert_eq!(json["message"], "done");
        assert_eq!(json["level"], "Info");
        assert_eq!(json["fields"]["bits_per_second"], 12_345_000);
    }

    #[test]
    fn test_compact_format() {
        let logger = plain_logger(LogFormat::Compact);
        let entry = logger.warn("slow").into_entry();
        assert!(logger.render(&entry).ends_with("W TEST: slow"));
    }

    #[test]
    fn test_named_logger_shares_settings() {
        let logger = plain_logger(LogFormat::Compact);
        let named = logger.named("SINK");
        let entry = named.info("sent").into_entry();
        assert_eq!(entry.logger, "SINK");
        assert!(named.render(&entry).ends_with("I SINK: sent"));
    }

    #[tokio::test]
    async fn test_context_fields_are_shared() {
        let logger = Logger::new("TEST");
        let named = logger.named("OTHER");
        logger.add_context_field("hostname", "probe-01").await;

        let context = named.context.read().await;
        assert_eq!(context.context_fields["hostname"], "probe-01");
    }
}

//! Error handling for the bandwidth collector
//!
//! Startup problems are reported through [`AppError`] and end the process with
//! a category-specific exit code. Per-measurement problems are reported through
//! [`ProbeError`], [`ParseError`] and [`SinkError`]; they are logged by the
//! scheduler and never escape a sweep.

use thiserror::Error;

/// Startup and configuration errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// No usable way to launch the probe tool
    #[error("Probe runtime error: {0}")]
    Runtime(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (URLs, YAML, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new probe runtime error
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Validation(_) => "VALIDATION",
            Self::Runtime(_) => "RUNTIME",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Runtime(_) => 2,
            Self::Io(_) => 5,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Runtime(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Io(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::parse(format!("YAML parse error: {}", error))
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure to obtain output from the probe tool
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The probe executable could not be started
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The probe exited unsuccessfully
    #[error("probe exited with {status}")]
    ExitStatus { status: String },

    /// The probe ran past its deadline and was killed
    #[error("probe did not finish within {seconds}s")]
    Timeout { seconds: u64 },

    /// The sweep was cancelled while the probe was running
    #[error("probe cancelled")]
    Cancelled,
}

/// Failure to extract a throughput value from probe output
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The tool reported that it could not measure the endpoint
    #[error("probe reported a failure: {excerpt}")]
    ProbeReported { excerpt: String },

    /// The output did not contain the tool's throughput report
    #[error("no throughput report found in probe output")]
    MissingReport,

    /// The token at the throughput position is not a number
    #[error("invalid throughput value `{token}`")]
    InvalidNumber { token: String },

    /// The value does not fit into bits per second
    #[error("throughput value `{token}` is out of range")]
    Overflow { token: String },
}

/// Failure to deliver a payload to the metrics backend
#[derive(Error, Debug)]
pub enum SinkError {
    /// The stream sink could not be reached
    #[error("could not connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing to an open stream connection failed
    #[error("error writing to {target}: {source}")]
    Write {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP request could not be built or sent
    #[error("request to {target} failed: {message}")]
    Request { target: String, message: String },

    /// The HTTP sink answered with something other than 200
    #[error("unexpected status code: {status}")]
    UnexpectedStatus { status: u16, body: String },
}

impl SinkError {
    /// Short classification used in structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Write { .. } => "write",
            Self::Request { .. } => "request",
            Self::UnexpectedStatus { .. } => "status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(AppError::config("x").exit_code(), 1);
        assert_eq!(AppError::validation("x").exit_code(), 1);
        assert_eq!(AppError::runtime("x").exit_code(), 2);
        assert_eq!(AppError::internal("x").exit_code(), 99);
    }

    #[test]
    fn test_console_format_without_color() {
        let error = AppError::runtime("docker or podman is required");
        assert_eq!(
            error.format_for_console(false),
            "[RUNTIME] Probe runtime error: docker or podman is required"
        );
    }

    #[test]
    fn test_unexpected_status_message() {
        let error = SinkError::UnexpectedStatus { status: 500, body: "boom".to_string() };
        assert_eq!(error.to_string(), "unexpected status code: 500");
        assert_eq!(error.kind(), "status");
    }

    #[test]
    fn test_yaml_error_maps_to_parse() {
        let yaml_error = serde_yaml::from_str::<u32>("not: [a number").unwrap_err();
        let error: AppError = yaml_error.into();
        assert_eq!(error.category(), "PARSE");
    }
}

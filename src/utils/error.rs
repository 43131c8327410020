use crate::core::scope::Scope;
use crate::utils::output::OutputStyle;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised outside the sync engine: loading configuration, reading files,
/// wiring the process together.
#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("System error: {0}")]
    System(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Result type alias for consistent error handling across the application
pub type AppResult<T> = Result<T, AppError>;

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

/// Conditions the sync engine reports for a record or a job.
///
/// None of these ever abort a pass: record-level errors become outcomes and
/// job-level errors end only the job they belong to.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("invalid {subject}: {message}")]
    Validation { subject: String, message: String },

    #[error("source '{source_name}' is unavailable: {message}")]
    SourceUnavailable { source_name: String, message: String },

    #[error("sink '{sink}' is unavailable: {message}")]
    SinkUnavailable { sink: String, message: String },

    #[error("sink '{sink}' rejected the write: {message}")]
    SinkRejected { sink: String, message: String },

    #[error("platform '{platform}' is not supported in this build; {note}")]
    PlatformNotSupported { platform: String, note: String },

    #[error("sink '{sink}' does not support {requested} scope")]
    ScopeUnsupported { sink: String, requested: Scope },
}

impl SyncError {
    pub fn validation(subject: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Validation {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn source_unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::SourceUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn sink_unavailable(sink: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::SinkUnavailable {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn sink_rejected(sink: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::SinkRejected {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation { .. } => ErrorKind::Validation,
            SyncError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            SyncError::SinkUnavailable { .. } => ErrorKind::SinkUnavailable,
            SyncError::SinkRejected { .. } => ErrorKind::SinkRejected,
            SyncError::PlatformNotSupported { .. } => ErrorKind::PlatformNotSupported,
            SyncError::ScopeUnsupported { .. } => ErrorKind::ScopeUnsupported,
        }
    }
}

/// Classification of a [`SyncError`] as it appears in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    SourceUnavailable,
    SinkUnavailable,
    SinkRejected,
    PlatformNotSupported,
    ScopeUnsupported,
}

impl ErrorKind {
    /// Errors detected while turning configuration into jobs.
    pub fn is_configuration(self) -> bool {
        matches!(
            self,
            ErrorKind::Validation | ErrorKind::PlatformNotSupported | ErrorKind::ScopeUnsupported
        )
    }

    /// Transient infrastructure failures; a later pass may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::SourceUnavailable | ErrorKind::SinkUnavailable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::SourceUnavailable => "SourceUnavailable",
            ErrorKind::SinkUnavailable => "SinkUnavailable",
            ErrorKind::SinkRejected => "SinkRejected",
            ErrorKind::PlatformNotSupported => "PlatformNotSupported",
            ErrorKind::ScopeUnsupported => "ScopeUnsupported",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn report_error(err: &AppError) {
    match err {
        AppError::Config(msg) => {
            eprintln!("⚙️  {}", OutputStyle::error(&format!("Configuration: {}", msg)));
        }
        AppError::Io(e) => {
            eprintln!("❌ {}", OutputStyle::error(e));
        }
        AppError::System(msg) => {
            eprintln!("❌ {}", OutputStyle::error(msg));
        }
    }
}

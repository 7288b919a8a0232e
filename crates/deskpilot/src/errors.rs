use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which locating strategy produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    Coordinate,
    Image,
    Control,
    Window,
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocatorKind::Coordinate => "coordinate",
            LocatorKind::Image => "image",
            LocatorKind::Control => "control",
            LocatorKind::Window => "window",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("{kind} locator failed: {detail}")]
    LocatorFailure { kind: LocatorKind, detail: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid step: {0}")]
    InvalidStep(String),

    #[error("unknown step type: {0}")]
    UnknownStep(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Platform error: {0}")]
    PlatformError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Stable, serializable tag for an [`AutomationError`], reported alongside
/// failed flow results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigurationMissing,
    LocatorFailure,
    Timeout,
    UnsupportedPlatform,
    InvalidStep,
    UnknownStep,
    InvalidName,
    ResourceNotFound,
    PlatformError,
    Io,
    Serialization,
}

impl AutomationError {
    pub fn locator(kind: LocatorKind, detail: impl Into<String>) -> Self {
        AutomationError::LocatorFailure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AutomationError::ConfigurationMissing(_) => ErrorKind::ConfigurationMissing,
            AutomationError::LocatorFailure { .. } => ErrorKind::LocatorFailure,
            AutomationError::Timeout(_) => ErrorKind::Timeout,
            AutomationError::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
            AutomationError::InvalidStep(_) => ErrorKind::InvalidStep,
            AutomationError::UnknownStep(_) => ErrorKind::UnknownStep,
            AutomationError::InvalidName(_) => ErrorKind::InvalidName,
            AutomationError::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            AutomationError::PlatformError(_) => ErrorKind::PlatformError,
            AutomationError::Io(_) => ErrorKind::Io,
            AutomationError::Serialization(_) | AutomationError::Image(_) => {
                ErrorKind::Serialization
            }
        }
    }

    /// Whether re-running the same flow could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl ErrorKind {
    /// Missing configuration, malformed input and missing platform
    /// capabilities fail identically every time.
    pub fn is_retryable(self) -> bool {
        !matches!(
            self,
            ErrorKind::UnsupportedPlatform
                | ErrorKind::ConfigurationMissing
                | ErrorKind::InvalidStep
                | ErrorKind::UnknownStep
                | ErrorKind::InvalidName
                | ErrorKind::Serialization
        )
    }
}

pub type Result<T, E = AutomationError> = std::result::Result<T, E>;

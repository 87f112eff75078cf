use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Failed to read {}: {source}", .path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to enumerate {}: {message}", .path.display())]
    WalkError { path: PathBuf, message: String },

    #[error("File is not valid UTF-8: {}", .path.display())]
    EncodingError { path: PathBuf },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid output directory '{value}': {reason}")]
    InvalidOutputDir { value: String, reason: String },

    #[error("File task failed: {message}")]
    TaskError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Config,
    Walk,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PortalError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PortalError::ReadError { .. }
            | PortalError::WriteError { .. }
            | PortalError::EncodingError { .. } => ErrorCategory::Io,
            PortalError::WalkError { .. } => ErrorCategory::Walk,
            PortalError::ConfigValidationError { .. }
            | PortalError::InvalidConfigValueError { .. }
            | PortalError::MissingConfigError { .. }
            | PortalError::InvalidOutputDir { .. } => ErrorCategory::Config,
            PortalError::SerializationError(_) | PortalError::TaskError { .. } => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // A single unreadable document only leaves that document unrelocated.
            ErrorCategory::Io => ErrorSeverity::Medium,
            ErrorCategory::Walk | ErrorCategory::Config => ErrorSeverity::High,
            ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PortalError::ReadError { .. } | PortalError::WriteError { .. } => {
                "Check that the build output is readable and writable by the current user"
            }
            PortalError::EncodingError { .. } => {
                "Only UTF-8 documents can be relocated; exclude this extension from the sweep"
            }
            PortalError::WalkError { .. } => {
                "Make sure the output directory exists and every subdirectory can be listed"
            }
            PortalError::InvalidOutputDir { .. } => {
                "Pass a filesystem path or a file:// URL pointing at the build output"
            }
            PortalError::ConfigValidationError { .. }
            | PortalError::InvalidConfigValueError { .. }
            | PortalError::MissingConfigError { .. } => {
                "Review the portals configuration file and command line flags"
            }
            PortalError::SerializationError(_) | PortalError::TaskError { .. } => {
                "Re-run with --verbose and report the log if the problem persists"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Io => format!("Could not access a document: {}", self),
            ErrorCategory::Walk => format!("Could not scan the output tree: {}", self),
            ErrorCategory::Config => format!("Invalid configuration: {}", self),
            ErrorCategory::Internal => format!("Internal error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_not_fatal() {
        let err = PortalError::ReadError {
            path: PathBuf::from("dist/index.html"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.category(), ErrorCategory::Io);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.to_string().contains("dist/index.html"));
    }

    #[test]
    fn test_serialization_errors_convert() {
        let json_error = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: PortalError = json_error.into();
        assert!(matches!(err, PortalError::SerializationError(_)));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_config_errors_are_high_severity() {
        let err = PortalError::MissingConfigError {
            field: "sweep.extensions".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Config);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().starts_with("Invalid configuration"));
    }
}

//! Unified error hierarchy for recoveryrs
//!
//! The scoring and trend functions never fail; everything that surrounds them
//! (form validation, the backend, export) reports through the types below.
//! Legacy rows that fail to decode are collected rather than raised.

use thiserror::Error;

/// Top-level error type for all recoveryrs operations
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Form or onboarding input rejected
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Persistence/auth backend errors
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// The authenticated user has no patient record yet
    #[error("No patient record for user {user_id}")]
    PatientNotFound { user_id: String },
}

/// Input validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Heart rate text was empty or not a number
    #[error("Invalid heart rate: {input:?}")]
    InvalidHeartRate { input: String },

    /// Heart rate outside the accepted BPM range
    #[error("Heart rate {value} outside {min}-{max} BPM")]
    HeartRateOutOfRange { value: u32, min: u16, max: u16 },

    /// Required field left blank
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Field present but malformed
    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

/// Persistence/auth backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    /// Underlying SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Record not found
    #[error("Record not found: {table}.{id}")]
    NotFound { table: String, id: String },

    /// Duplicate entry
    #[error("Duplicate entry: {table}.{key}")]
    Duplicate { table: String, key: String },

    /// Constraint violation
    #[error("Constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },
}

/// Errors decoding rows in the original untyped log format
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LegacyRowError {
    /// Date column not in YYYY-MM-DD form
    #[error("Invalid date {value:?} in row {log_id}")]
    InvalidDate { log_id: String, value: String },

    /// Numeric column could not be parsed
    #[error("Invalid {field} {value:?} in row {log_id}")]
    InvalidNumber {
        log_id: String,
        field: String,
        value: String,
    },

    /// Value parsed but outside its domain
    #[error("{field}={value} out of range in row {log_id}")]
    OutOfRange {
        log_id: String,
        field: String,
        value: i64,
    },

    /// vitalsigns column was not valid JSON
    #[error("Malformed vitals in row {log_id}: {reason}")]
    MalformedVitals { log_id: String, reason: String },
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// Unsupported format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// CSV writer failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writer failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for recoveryrs operations
pub type Result<T> = std::result::Result<T, RecoveryError>;

impl RecoveryError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RecoveryError::Validation(_) => ErrorSeverity::Warning,
            RecoveryError::PatientNotFound { .. } => ErrorSeverity::Warning,
            RecoveryError::Backend(BackendError::NotFound { .. }) => ErrorSeverity::Warning,
            RecoveryError::Backend(BackendError::Duplicate { .. }) => ErrorSeverity::Warning,
            RecoveryError::Backend(_) | RecoveryError::Export(_) => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            RecoveryError::Validation(ValidationError::InvalidHeartRate { .. })
            | RecoveryError::Validation(ValidationError::HeartRateOutOfRange { .. }) => {
                "Please enter a valid heart rate between 30-220 BPM".to_string()
            }
            RecoveryError::PatientNotFound { .. } => {
                "Could not find patient record. Please complete your profile first.".to_string()
            }
            RecoveryError::Backend(BackendError::Duplicate { table, .. }) if table == "profiles" => {
                "That username is already taken.".to_string()
            }
            RecoveryError::Backend(BackendError::NotFound { table, .. }) => {
                format!("No matching entry in your {}.", table.replace('_', " "))
            }
            RecoveryError::Backend(_) => "Failed to save or load your data. Please try again.".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// The operation failed for a reason outside the user's control
    Error,
    /// The user can correct the input and retry
    Warning,
}

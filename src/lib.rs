// Library interface for recoveryrs modules
// The binary and the integration tests both go through this crate root

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod legacy;
pub mod logging;
pub mod models;
pub mod onboarding;
pub mod score;
pub mod service;
pub mod trend;
pub mod validation;

// Re-export commonly used types for convenience
pub use models::*;
pub use backend::{MemoryBackend, RecoveryBackend, SqliteBackend};
pub use score::RecoveryScoreCalculator;
pub use trend::{HistoryWindow, RecoveryOverview, RecoverySummary, TrendAggregator};
pub use validation::{MetricFormInput, MetricValidator};
pub use service::{DashboardSnapshot, LegacyImportReport, RecoveryTracker};
pub use error::{RecoveryError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};

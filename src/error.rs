//! Error taxonomy for the scoring and simulation core.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, RiskError>;

/// Errors raised by the core. Degenerate-but-valid inputs (empty portfolio,
/// zero variance, fully clamped samples) are never errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    /// A required input field is absent (or not a finite number).
    #[error("missing required data: {field}")]
    MissingData { field: String },

    /// A parameter is out of range or inconsistent. Raised before any
    /// simulation runs.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl RiskError {
    pub(crate) fn missing(field: impl Into<String>) -> Self {
        RiskError::MissingData { field: field.into() }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        RiskError::InvalidConfiguration(reason.into())
    }
}

//! Error taxonomy for the signal engine

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    /// Series shorter than an indicator's minimum window
    #[error("insufficient data for {indicator}: need {required} values, got {available}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        available: usize,
    },

    /// Loader or network failure; the cycle is skipped
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// SMC/AI collaborator failure; degrades to an inconclusive result
    #[error("{service} service error: {reason}")]
    ExternalService { service: &'static str, reason: String },

    /// Fatal at startup
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SignalError {
    pub fn insufficient(indicator: &'static str, required: usize, available: usize) -> Self {
        Self::InsufficientData {
            indicator,
            required,
            available,
        }
    }

    pub fn external(service: &'static str, reason: impl ToString) -> Self {
        Self::ExternalService {
            service,
            reason: reason.to_string(),
        }
    }
}

pub type SignalResult<T> = Result<T, SignalError>;

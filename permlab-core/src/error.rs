//! Engine error taxonomy.
//!
//! No variant is retried inside the engine. Configuration errors are raised
//! before any trial executes; strategy failures abort the enclosing test.

use thiserror::Error;

use crate::strategy::StrategyError;

/// Errors raised by measures, permutation, optimization and validation runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("insufficient data: {available} bars available, at least {required} required")]
    InsufficientData { available: usize, required: usize },

    #[error("strategy '{strategy}' failed: {source}")]
    StrategyExecution {
        strategy: String,
        #[source]
        source: StrategyError,
    },

    #[error("run cancelled after {completed} of {total} trials")]
    Cancelled { completed: usize, total: usize },
}

impl ValidationError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ValidationError::InvalidConfiguration(msg.into())
    }

    pub fn strategy(strategy: impl Into<String>, source: StrategyError) -> Self {
        ValidationError::StrategyExecution {
            strategy: strategy.into(),
            source,
        }
    }
}

/// Check that `value` lies in the open interval (0, 1).
pub fn ensure_unit_interval(name: &str, value: f64) -> Result<(), ValidationError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ValidationError::invalid(format!(
            "{name} must be in (0, 1), got {value}"
        )))
    }
}

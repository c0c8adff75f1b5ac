//! Strategy capability — generate a signal series from bars plus parameters.
//!
//! The engine depends only on this trait. Concrete trading rules live in
//! [`crate::strategies`] and are registered explicitly by the caller.
//!
//! Contract: `generate_signals` returns exactly one position per input bar,
//! and the position at bar `i` may only depend on bars `0..=i`. The engine
//! applies a position to the *next* bar's return, so a strategy never earns
//! the move of its own decision bar.

use thiserror::Error;

use crate::domain::{Bar, ParamSet, SignalSeries};

/// Failure raised while generating signals.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StrategyError {
    #[error("missing parameter '{0}'")]
    MissingParam(String),
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },
    #[error("signal length {signals} does not match bar count {bars}")]
    LengthMismatch { signals: usize, bars: usize },
    #[error("{0}")]
    Failed(String),
}

/// A rule-based trading strategy.
///
/// Implementations must be stateless with respect to `generate_signals` so one
/// instance can be shared across permutation trials on different threads.
pub trait Strategy: Send + Sync {
    /// Stable identifier used by registries and reports.
    fn name(&self) -> &str;

    /// Parameters used when neither an optimizer nor the caller supplies any.
    fn default_params(&self) -> ParamSet;

    /// Reject parameter combinations the strategy cannot run with.
    fn validate_params(&self, _params: &ParamSet) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Produce one position per bar.
    fn generate_signals(
        &self,
        bars: &[Bar],
        params: &ParamSet,
    ) -> Result<SignalSeries, StrategyError>;
}

/// Run a strategy and enforce the one-position-per-bar contract.
pub fn generate_checked(
    strategy: &dyn Strategy,
    bars: &[Bar],
    params: &ParamSet,
) -> Result<SignalSeries, StrategyError> {
    strategy.validate_params(params)?;
    let signals = strategy.generate_signals(bars, params)?;
    if signals.len() != bars.len() {
        return Err(StrategyError::LengthMismatch {
            signals: signals.len(),
            bars: bars.len(),
        });
    }
    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Truncating;

    impl Strategy for Truncating {
        fn name(&self) -> &str {
            "truncating"
        }

        fn default_params(&self) -> ParamSet {
            ParamSet::new()
        }

        fn generate_signals(
            &self,
            bars: &[Bar],
            _params: &ParamSet,
        ) -> Result<SignalSeries, StrategyError> {
            Ok(SignalSeries::flat(bars.len().saturating_sub(1)))
        }
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let bars = crate::test_support::flat_bars(5, 100.0);
        let err = generate_checked(&Truncating, &bars, &ParamSet::new()).unwrap_err();
        assert_eq!(err, StrategyError::LengthMismatch { signals: 4, bars: 5 });
    }

    /// Architecture contract: strategies see bars and parameters only.
    ///
    /// There is no portfolio, equity or return input, so a strategy cannot
    /// condition on realized performance. If this compiles, the contract holds.
    #[test]
    fn strategy_trait_object_builds() {
        fn _check(s: &dyn Strategy, bars: &[Bar]) -> Result<SignalSeries, StrategyError> {
            s.generate_signals(bars, &s.default_params())
        }
    }
}

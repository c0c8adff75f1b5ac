//! Moving average crossover — long while the fast SMA is above the slow SMA.
//!
//! With `allow_short` set to a non-zero value the strategy goes short while
//! the fast SMA is below the slow one; otherwise it is flat.

use crate::domain::{Bar, ParamSet, SignalSeries};
use crate::strategy::{Strategy, StrategyError};

use super::indicators::sma;

#[derive(Debug, Clone, Copy)]
pub struct MaCrossover {
    pub default_fast: usize,
    pub default_slow: usize,
}

impl Default for MaCrossover {
    fn default() -> Self {
        Self {
            default_fast: 10,
            default_slow: 50,
        }
    }
}

impl MaCrossover {
    fn periods(params: &ParamSet) -> Result<(usize, usize), StrategyError> {
        let fast = params.require_usize("fast", 1)?;
        let slow = params.require_usize("slow", 2)?;
        if fast >= slow {
            return Err(StrategyError::InvalidParam {
                name: "fast".into(),
                reason: format!("fast ({fast}) must be below slow ({slow})"),
            });
        }
        Ok((fast, slow))
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn default_params(&self) -> ParamSet {
        ParamSet::new()
            .with("fast", self.default_fast as f64)
            .with("slow", self.default_slow as f64)
            .with("allow_short", 0.0)
    }

    fn validate_params(&self, params: &ParamSet) -> Result<(), StrategyError> {
        Self::periods(params).map(|_| ())
    }

    fn generate_signals(
        &self,
        bars: &[Bar],
        params: &ParamSet,
    ) -> Result<SignalSeries, StrategyError> {
        let (fast, slow) = Self::periods(params)?;
        let allow_short = params.get("allow_short").unwrap_or(0.0) != 0.0;
        let fast_ma = sma(bars, fast);
        let slow_ma = sma(bars, slow);

        let positions = fast_ma
            .iter()
            .zip(&slow_ma)
            .map(|(f, s)| {
                if f.is_nan() || s.is_nan() {
                    0.0
                } else if f > s {
                    1.0
                } else if f < s && allow_short {
                    -1.0
                } else {
                    0.0
                }
            })
            .collect();
        Ok(SignalSeries::from_weights(positions))
    }
}

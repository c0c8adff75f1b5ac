//! Objective — the single measure a study optimizes and ranks on.

use permlab_core::measures::strategy_returns;
use permlab_core::{
    generate_checked, Bar, Measure, MeasureConfig, ParamSet, SignalSeries, Strategy,
    ValidationError,
};

/// One measure plus the settings needed to evaluate it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    pub measure: Measure,
    pub config: MeasureConfig,
}

/// Signals, returns and score of one strategy run over a bar slice.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub signals: SignalSeries,
    pub returns: Vec<f64>,
    pub score: f64,
}

impl Objective {
    pub fn new(measure: Measure, config: MeasureConfig) -> Self {
        Self { measure, config }
    }

    pub fn score_returns(&self, returns: &[f64]) -> Result<f64, ValidationError> {
        self.measure.compute(returns, &self.config)
    }

    /// Run the strategy over `bars` with `params` and score the result.
    pub fn evaluate(
        &self,
        strategy: &dyn Strategy,
        bars: &[Bar],
        params: &ParamSet,
    ) -> Result<Evaluation, ValidationError> {
        let signals = generate_checked(strategy, bars, params)
            .map_err(|e| ValidationError::strategy(strategy.name(), e))?;
        let returns = strategy_returns(bars, &signals, self.config.return_kind)
            .map_err(|e| ValidationError::strategy(strategy.name(), e))?;
        let score = self.score_returns(&returns)?;
        Ok(Evaluation {
            signals,
            returns,
            score,
        })
    }
}

impl Default for Objective {
    fn default() -> Self {
        Self::new(Measure::Sharpe, MeasureConfig::default())
    }
}

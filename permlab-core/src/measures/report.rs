//! PerformanceReport — every measure for one (series, configuration) pair.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::SignalSeries;
use crate::error::ValidationError;

use super::{Measure, MeasureConfig};

/// Immutable mapping from measure name to value, plus trade statistics.
///
/// VaR/CVaR are omitted when the return series is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub measures: BTreeMap<String, f64>,
    pub n_returns: usize,
    pub trade_count: usize,
    pub exposure: f64,
}

impl PerformanceReport {
    pub fn compute(
        returns: &[f64],
        signals: &SignalSeries,
        config: &MeasureConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        let mut measures = BTreeMap::new();
        for measure in Measure::ALL {
            let tail = matches!(
                measure,
                Measure::ValueAtRisk | Measure::ConditionalValueAtRisk
            );
            if tail && returns.is_empty() {
                continue;
            }
            measures.insert(measure.name().to_string(), measure.compute(returns, config)?);
        }
        Ok(Self {
            measures,
            n_returns: returns.len(),
            trade_count: signals.trade_count(),
            exposure: signals.exposure(),
        })
    }

    pub fn get(&self, measure: Measure) -> Option<f64> {
        self.measures.get(measure.name()).copied()
    }
}

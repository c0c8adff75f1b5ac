//! Performance Measure Set — pure functions from a return series to a scalar.
//!
//! Every measure is oriented so that a larger value is better: drawdown and
//! VaR/CVaR are reported as non-positive numbers. The permutation test relies
//! on this to rank any measure with a single `>=` comparison.
//!
//! Measures share no mutable state, so the same [`Measure`] can be evaluated
//! concurrently on different series.

pub mod report;
pub mod returns;
pub mod stats;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_unit_interval, ValidationError};

pub use report::PerformanceReport;
pub use returns::{equity_curve, strategy_returns, ReturnKind};

/// Parameters shared by the measures. Nothing is inferred from timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// Bars per year used to annualize Sharpe, Sortino and Calmar.
    pub periods_per_year: u32,
    /// Tail probability for VaR/CVaR, in (0, 1).
    pub confidence_level: f64,
    /// Annual risk-free rate subtracted by Sharpe and Sortino.
    pub risk_free_rate: f64,
    pub return_kind: ReturnKind,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252,
            confidence_level: 0.05,
            risk_free_rate: 0.0,
            return_kind: ReturnKind::Log,
        }
    }
}

impl MeasureConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.periods_per_year == 0 {
            return Err(ValidationError::invalid("periods_per_year must be >= 1"));
        }
        ensure_unit_interval("confidence_level", self.confidence_level)?;
        if !self.risk_free_rate.is_finite() {
            return Err(ValidationError::invalid("risk_free_rate must be finite"));
        }
        Ok(())
    }
}

/// A named performance statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    TotalReturn,
    MeanReturn,
    Sharpe,
    Sortino,
    Calmar,
    MaxDrawdown,
    WinRate,
    ProfitFactor,
    ValueAtRisk,
    ConditionalValueAtRisk,
}

impl Measure {
    pub const ALL: [Measure; 10] = [
        Measure::TotalReturn,
        Measure::MeanReturn,
        Measure::Sharpe,
        Measure::Sortino,
        Measure::Calmar,
        Measure::MaxDrawdown,
        Measure::WinRate,
        Measure::ProfitFactor,
        Measure::ValueAtRisk,
        Measure::ConditionalValueAtRisk,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Measure::TotalReturn => "total_return",
            Measure::MeanReturn => "mean_return",
            Measure::Sharpe => "sharpe",
            Measure::Sortino => "sortino",
            Measure::Calmar => "calmar",
            Measure::MaxDrawdown => "max_drawdown",
            Measure::WinRate => "win_rate",
            Measure::ProfitFactor => "profit_factor",
            Measure::ValueAtRisk => "value_at_risk",
            Measure::ConditionalValueAtRisk => "conditional_value_at_risk",
        }
    }

    /// Loss measures (drawdown and tail risk) are never positive, so only
    /// differences between two of their values are meaningful.
    pub fn is_loss_measure(self) -> bool {
        matches!(
            self,
            Measure::MaxDrawdown | Measure::ValueAtRisk | Measure::ConditionalValueAtRisk
        )
    }

    pub fn compute(self, returns: &[f64], config: &MeasureConfig) -> Result<f64, ValidationError> {
        let ppy = config.periods_per_year;
        let rf = config.risk_free_rate;
        Ok(match self {
            Measure::TotalReturn => stats::total_return(returns, config.return_kind),
            Measure::MeanReturn => stats::mean_f64(returns),
            Measure::Sharpe => stats::sharpe_ratio(returns, ppy, rf),
            Measure::Sortino => stats::sortino_ratio(returns, ppy, rf),
            Measure::Calmar => stats::calmar_ratio(returns, config.return_kind, ppy),
            Measure::MaxDrawdown => {
                stats::max_drawdown(&equity_curve(returns, config.return_kind))
            }
            Measure::WinRate => stats::win_rate(returns),
            Measure::ProfitFactor => stats::profit_factor(returns),
            Measure::ValueAtRisk => stats::value_at_risk(returns, config.confidence_level)?,
            Measure::ConditionalValueAtRisk => {
                stats::conditional_value_at_risk(returns, config.confidence_level)?
            }
        })
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

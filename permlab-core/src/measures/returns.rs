//! Strategy returns and equity curves.
//!
//! The position held at the close of bar `t-1` earns the close-to-close move
//! into bar `t`. A position therefore never sees the return realized in its
//! own decision bar.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, SignalSeries};
use crate::strategy::StrategyError;

/// How per-bar price changes are expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    #[default]
    Log,
    Simple,
}

impl ReturnKind {
    pub fn price_return(self, from: f64, to: f64) -> f64 {
        match self {
            ReturnKind::Log => (to / from).ln(),
            ReturnKind::Simple => to / from - 1.0,
        }
    }
}

/// Per-bar strategy returns: `r[t-1] = pos[t-1] * ret(close[t-1] -> close[t])`.
///
/// Produces `bars.len() - 1` values (empty for fewer than two bars).
pub fn strategy_returns(
    bars: &[Bar],
    signals: &SignalSeries,
    kind: ReturnKind,
) -> Result<Vec<f64>, StrategyError> {
    if signals.len() != bars.len() {
        return Err(StrategyError::LengthMismatch {
            signals: signals.len(),
            bars: bars.len(),
        });
    }
    let positions = signals.positions();
    Ok(bars
        .windows(2)
        .zip(positions)
        .map(|(pair, &pos)| {
            if pos == 0.0 {
                0.0
            } else {
                pos * kind.price_return(pair[0].close, pair[1].close)
            }
        })
        .collect())
}

/// Cumulative equity starting at 1.0; `returns.len() + 1` points.
pub fn equity_curve(returns: &[f64], kind: ReturnKind) -> Vec<f64> {
    let mut curve = Vec::with_capacity(returns.len() + 1);
    curve.push(1.0);
    match kind {
        ReturnKind::Log => {
            let mut cum = 0.0;
            for r in returns {
                cum += r;
                curve.push(cum.exp());
            }
        }
        ReturnKind::Simple => {
            let mut eq = 1.0;
            for r in returns {
                eq *= 1.0 + r;
                curve.push(eq);
            }
        }
    }
    curve
}

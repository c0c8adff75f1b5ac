//! Measure functions — pure: return series in, scalar out.
//!
//! Degenerate inputs (too few observations, zero variance) yield 0.0 rather
//! than NaN or infinity, so every statistic can be ranked and serialized.
//! The exceptions are VaR/CVaR, which reject empty input and out-of-range
//! confidence levels outright.

use crate::error::{ensure_unit_interval, ValidationError};

use super::returns::{equity_curve, ReturnKind};

const EPS: f64 = 1e-15;

/// Cap applied to the profit factor when there are no losing bars.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1 denominator).
pub fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Compounded total return as a fraction.
pub fn total_return(returns: &[f64], kind: ReturnKind) -> f64 {
    match kind {
        ReturnKind::Log => returns.iter().sum::<f64>().exp() - 1.0,
        ReturnKind::Simple => returns.iter().map(|r| 1.0 + r).product::<f64>() - 1.0,
    }
}

/// Annualized Sharpe ratio.
///
/// Sharpe = mean(r − rf/ppy) / std(r − rf/ppy) · sqrt(ppy).
pub fn sharpe_ratio(returns: &[f64], periods_per_year: u32, risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let ppy = periods_per_year as f64;
    let excess: Vec<f64> = returns.iter().map(|r| r - risk_free_rate / ppy).collect();
    let std = std_dev(&excess);
    if std < EPS {
        return 0.0;
    }
    mean_f64(&excess) / std * ppy.sqrt()
}

/// Annualized Sortino ratio (downside deviation below the per-period risk-free rate).
pub fn sortino_ratio(returns: &[f64], periods_per_year: u32, risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let ppy = periods_per_year as f64;
    let excess: Vec<f64> = returns.iter().map(|r| r - risk_free_rate / ppy).collect();
    let downside_sq: f64 = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    // Full n in the denominator, matching the usual Sortino convention.
    let downside = (downside_sq / excess.len() as f64).sqrt();
    if downside < EPS {
        return 0.0;
    }
    mean_f64(&excess) / downside * ppy.sqrt()
}

/// Maximum drawdown of an equity curve as a non-positive fraction
/// (e.g. −0.15 is a 15% peak-to-trough decline). Single pass over a running peak.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Annualized compounded return divided by |max drawdown|; 0.0 without a drawdown.
pub fn calmar_ratio(returns: &[f64], kind: ReturnKind, periods_per_year: u32) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let curve = equity_curve(returns, kind);
    let dd = max_drawdown(&curve);
    if dd >= 0.0 {
        return 0.0;
    }
    let final_eq = curve[curve.len() - 1];
    let years = returns.len() as f64 / periods_per_year as f64;
    let annual = if final_eq <= 0.0 {
        -1.0
    } else {
        final_eq.powf(1.0 / years) - 1.0
    };
    annual / dd.abs()
}

/// Winning bars over bars with a non-zero return.
pub fn win_rate(returns: &[f64]) -> f64 {
    let active = returns.iter().filter(|&&r| r != 0.0).count();
    if active == 0 {
        return 0.0;
    }
    let winners = returns.iter().filter(|&&r| r > 0.0).count();
    winners as f64 / active as f64
}

/// Gross gains over gross losses, capped at [`PROFIT_FACTOR_CAP`].
pub fn profit_factor(returns: &[f64]) -> f64 {
    let gross_profit: f64 = returns.iter().filter(|&&r| r > 0.0).sum();
    let gross_loss: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r.abs()).sum();
    if gross_loss < 1e-12 {
        return if gross_profit > 0.0 {
            PROFIT_FACTOR_CAP
        } else {
            0.0
        };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

/// Linear-interpolated quantile of an ascending slice (Hyndman–Fan type 7).
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

fn sorted_checked(returns: &[f64], confidence_level: f64) -> Result<Vec<f64>, ValidationError> {
    ensure_unit_interval("confidence_level", confidence_level)?;
    if returns.is_empty() {
        return Err(ValidationError::invalid(
            "value at risk requires a non-empty return series",
        ));
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(sorted)
}

/// Empirical value at risk: the `confidence_level` quantile of the returns.
///
/// `confidence_level` is the tail probability (0.05 → 5th percentile).
pub fn value_at_risk(returns: &[f64], confidence_level: f64) -> Result<f64, ValidationError> {
    let sorted = sorted_checked(returns, confidence_level)?;
    Ok(quantile_sorted(&sorted, confidence_level))
}

/// Conditional value at risk: mean of the returns at or below the VaR quantile.
pub fn conditional_value_at_risk(
    returns: &[f64],
    confidence_level: f64,
) -> Result<f64, ValidationError> {
    let sorted = sorted_checked(returns, confidence_level)?;
    let var = quantile_sorted(&sorted, confidence_level);
    let tail: Vec<f64> = sorted.iter().copied().take_while(|&r| r <= var).collect();
    // The interpolated quantile is >= the minimum, so the tail is never empty.
    Ok(mean_f64(&tail))
}

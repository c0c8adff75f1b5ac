//! SignalSeries — positions aligned index-for-index with a price series.
//!
//! Positions are continuous weights. The discrete long/flat/short case is
//! expressed through [`Position`], which maps onto +1 / 0 / −1.

use serde::{Deserialize, Serialize};

/// Discrete position state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Long,
    Flat,
    Short,
}

impl Position {
    pub fn weight(self) -> f64 {
        match self {
            Position::Long => 1.0,
            Position::Flat => 0.0,
            Position::Short => -1.0,
        }
    }
}

/// Position weight per bar. Entry `i` is the position held at the close of bar `i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    positions: Vec<f64>,
}

impl SignalSeries {
    pub fn from_weights(positions: Vec<f64>) -> Self {
        Self { positions }
    }

    pub fn from_positions(positions: &[Position]) -> Self {
        Self {
            positions: positions.iter().map(|p| p.weight()).collect(),
        }
    }

    /// All-flat series of length `n`.
    pub fn flat(n: usize) -> Self {
        Self {
            positions: vec![0.0; n],
        }
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn extend_from_slice(&mut self, other: &[f64]) {
        self.positions.extend_from_slice(other);
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.positions
    }

    /// Number of entries into a non-flat position (flat→long, long→short, ...).
    pub fn trade_count(&self) -> usize {
        let mut prev = 0.0;
        let mut trades = 0;
        for &p in &self.positions {
            if p != prev && p != 0.0 {
                trades += 1;
            }
            prev = p;
        }
        trades
    }

    /// Fraction of bars with a non-zero position.
    pub fn exposure(&self) -> f64 {
        if self.positions.is_empty() {
            return 0.0;
        }
        let active = self.positions.iter().filter(|&&p| p != 0.0).count();
        active as f64 / self.positions.len() as f64
    }
}

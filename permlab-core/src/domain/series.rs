//! PriceSeries — an immutable, strictly time-ordered sequence of bars.
//!
//! The series is loaded once upstream and only ever borrowed by the engine.
//! Sub-ranges are handed to strategies and optimizers as `&[Bar]` slices, so
//! walk-forward windows never copy bar data.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Bar;

/// Violations of the pre-validation contract for incoming bar data.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("bar {index} is malformed (non-finite, non-positive, or high/low inconsistent)")]
    MalformedBar { index: usize },
    #[error("timestamps not strictly increasing at bar {index}")]
    NonIncreasingTimestamp { index: usize },
}

/// Ordered OHLCV bars for a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Build a series, checking strictly increasing timestamps and sane OHLC.
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(SeriesError::MalformedBar { index });
            }
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(SeriesError::NonIncreasingTimestamp { index });
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    /// Wrap bars produced by the permutation generator.
    ///
    /// Timestamps are the original (already validated) ones and prices are
    /// rebuilt through `exp`, so the checks in [`PriceSeries::new`] hold by
    /// construction.
    pub(crate) fn from_trusted(symbol: String, bars: Vec<Bar>) -> Self {
        Self { symbol, bars }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Borrow a half-open bar range. Out-of-range bounds are clamped.
    pub fn window(&self, range: Range<usize>) -> &[Bar] {
        let end = range.end.min(self.bars.len());
        let start = range.start.min(end);
        &self.bars[start..end]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Deterministic BLAKE3 digest over symbol, timestamps and OHLCV values.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.symbol.as_bytes());
        for bar in &self.bars {
            hasher.update(&bar.timestamp.and_utc().timestamp().to_le_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

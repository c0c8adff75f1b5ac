//! Permutation Generator — synthetic price paths with scrambled sequence.
//!
//! Each bar after the anchor is decomposed into log-space moves:
//! close-to-open gap, open-to-high, open-to-low, open-to-close. The moves are
//! reordered and replayed from the anchor bar's close, so the marginal
//! distribution of intrabar moves survives while their temporal order does not.
//!
//! - [`PermutationMethod::Bar`] shuffles individual bar moves.
//! - [`PermutationMethod::Block`] shuffles contiguous blocks of moves and keeps
//!   the order inside each block, preserving short-range autocorrelation.
//!
//! Shuffling uses `SliceRandom::shuffle` (Fisher–Yates), which is uniform over
//! all orderings. Timestamps stay in their original order; volume travels
//! with its bar.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::domain::{Bar, PriceSeries};
use crate::error::ValidationError;
use crate::rng::SeedSequence;

/// Which unit gets reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PermutationMethod {
    Bar,
    Block { block_size: usize },
}

impl PermutationMethod {
    pub fn label(&self) -> String {
        match self {
            PermutationMethod::Bar => "bar".into(),
            PermutationMethod::Block { block_size } => format!("block({block_size})"),
        }
    }
}

/// One synthetic series plus the provenance needed to regenerate it.
#[derive(Debug, Clone)]
pub struct PermutationResult {
    pub series: PriceSeries,
    pub seed: u64,
    pub method: PermutationMethod,
}

/// Permutation settings. Bars `0..=start_index` are copied verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permuter {
    pub method: PermutationMethod,
    #[serde(default)]
    pub start_index: usize,
}

/// Log-space moves of one bar relative to the previous close.
#[derive(Debug, Clone, Copy)]
struct BarMove {
    gap: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl Permuter {
    pub fn new(method: PermutationMethod) -> Self {
        Self {
            method,
            start_index: 0,
        }
    }

    pub fn with_start_index(mut self, start_index: usize) -> Self {
        self.start_index = start_index;
        self
    }

    /// Minimum series length this permuter can work with, or `None` when it
    /// does not fit in `usize`.
    ///
    /// Bar permutation needs two movable bars to change anything; block
    /// permutation needs at least one full block after the anchor.
    pub fn min_bars(&self) -> Option<usize> {
        let movable = match self.method {
            PermutationMethod::Bar => 2,
            PermutationMethod::Block { block_size } => block_size,
        };
        self.start_index.checked_add(1)?.checked_add(movable)
    }

    /// Check settings and series length without generating anything.
    pub fn validate(&self, n_bars: usize) -> Result<(), ValidationError> {
        if let PermutationMethod::Block { block_size } = self.method {
            if block_size == 0 {
                return Err(ValidationError::invalid("block_size must be >= 1"));
            }
        }
        let required = self.min_bars().unwrap_or(usize::MAX);
        if n_bars < required {
            return Err(ValidationError::InsufficientData {
                available: n_bars,
                required,
            });
        }
        Ok(())
    }

    /// Generate one permuted copy of `series` using `seed`.
    pub fn permute(
        &self,
        series: &PriceSeries,
        seed: u64,
    ) -> Result<PermutationResult, ValidationError> {
        self.validate(series.len())?;
        let bars = series.bars();
        let mut moves = decompose(bars, self.start_index);
        let mut rng = SeedSequence::new(seed).rng_for(0);

        match self.method {
            PermutationMethod::Bar => moves.shuffle(&mut rng),
            PermutationMethod::Block { block_size } => {
                let mut blocks: Vec<&[BarMove]> = moves.chunks(block_size).collect();
                blocks.shuffle(&mut rng);
                moves = blocks.concat();
            }
        }

        let rebuilt = rebuild(bars, self.start_index, &moves);
        Ok(PermutationResult {
            series: PriceSeries::from_trusted(series.symbol().to_string(), rebuilt),
            seed,
            method: self.method,
        })
    }
}

fn decompose(bars: &[Bar], start_index: usize) -> Vec<BarMove> {
    bars.windows(2)
        .skip(start_index)
        .map(|pair| {
            let (prev, bar) = (&pair[0], &pair[1]);
            let log_open = bar.open.ln();
            BarMove {
                gap: log_open - prev.close.ln(),
                high: bar.high.ln() - log_open,
                low: bar.low.ln() - log_open,
                close: bar.close.ln() - log_open,
                volume: bar.volume,
            }
        })
        .collect()
}

fn rebuild(original: &[Bar], start_index: usize, moves: &[BarMove]) -> Vec<Bar> {
    let mut out = Vec::with_capacity(original.len());
    out.extend_from_slice(&original[..=start_index]);

    let mut prev_log_close = original[start_index].close.ln();
    for (bar, mv) in original[start_index + 1..].iter().zip(moves) {
        let log_open = prev_log_close + mv.gap;
        let log_close = log_open + mv.close;
        out.push(Bar {
            timestamp: bar.timestamp,
            open: log_open.exp(),
            high: (log_open + mv.high).exp(),
            low: (log_open + mv.low).exp(),
            close: log_close.exp(),
            volume: mv.volume,
        });
        prev_log_close = log_close;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::wavy_series;
    use std::collections::HashMap;

    #[test]
    fn preserves_length_timestamps_and_anchor() {
        let series = wavy_series(50);
        let result = Permuter::new(PermutationMethod::Bar)
            .with_start_index(4)
            .permute(&series, 7)
            .unwrap();
        assert_eq!(result.series.len(), 50);
        for (a, b) in series.bars().iter().zip(result.series.bars()) {
            assert_eq!(a.timestamp, b.timestamp);
        }
        assert_eq!(&series.bars()[..=4], &result.series.bars()[..=4]);
        assert_eq!(result.seed, 7);
    }

    #[test]
    fn bar_permutation_keeps_final_close() {
        // The sum of gap + close moves is order-independent.
        let series = wavy_series(60);
        let result = Permuter::new(PermutationMethod::Bar)
            .permute(&series, 11)
            .unwrap();
        let a = series.bars().last().unwrap().close;
        let b = result.series.bars().last().unwrap().close;
        assert!((a - b).abs() / a < 1e-9);
    }

    #[test]
    fn permuted_bars_are_sane() {
        let series = wavy_series(80);
        for method in [PermutationMethod::Bar, PermutationMethod::Block { block_size: 7 }] {
            let result = Permuter::new(method).permute(&series, 3).unwrap();
            assert!(result.series.bars().iter().all(Bar::is_sane));
        }
    }

    #[test]
    fn same_seed_same_path_different_seed_different_path() {
        let series = wavy_series(40);
        let p = Permuter::new(PermutationMethod::Bar);
        let a = p.permute(&series, 1).unwrap().series;
        let b = p.permute(&series, 1).unwrap().series;
        let c = p.permute(&series, 2).unwrap().series;
        assert_eq!(a, b);
        assert_ne!(a.closes(), c.closes());
    }

    #[test]
    fn block_permutation_keeps_blocks_contiguous() {
        let series = wavy_series(41); // 40 moves = 8 blocks of 5
        let block_size = 5;
        let original = decompose(series.bars(), 0);
        let result = Permuter::new(PermutationMethod::Block { block_size })
            .permute(&series, 9)
            .unwrap();
        let permuted = decompose(result.series.bars(), 0);

        for block in permuted.chunks(block_size) {
            let start = original
                .iter()
                .position(|m| (m.close - block[0].close).abs() < 1e-12)
                .expect("block head must exist in the original");
            for (offset, mv) in block.iter().enumerate() {
                assert!((original[start + offset].close - mv.close).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn short_series_is_insufficient() {
        let series = wavy_series(10);
        let err = Permuter::new(PermutationMethod::Block { block_size: 20 })
            .permute(&series, 1)
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InsufficientData {
                available: 10,
                required: 21
            }
        ));
        let err = Permuter::new(PermutationMethod::Bar)
            .permute(&wavy_series(2), 1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InsufficientData { .. }));
    }

    #[test]
    fn huge_start_index_is_insufficient_not_overflow() {
        for method in [PermutationMethod::Bar, PermutationMethod::Block { block_size: 5 }] {
            let permuter = Permuter::new(method).with_start_index(usize::MAX);
            assert_eq!(permuter.min_bars(), None);
            let err = permuter.permute(&wavy_series(20), 1).unwrap_err();
            assert!(matches!(
                err,
                ValidationError::InsufficientData {
                    available: 20,
                    required: usize::MAX
                }
            ));
        }
        let block = Permuter::new(PermutationMethod::Block {
            block_size: usize::MAX,
        });
        assert!(block.validate(100).is_err());
    }

    #[test]
    fn zero_block_size_is_invalid() {
        let err = Permuter::new(PermutationMethod::Block { block_size: 0 })
            .validate(100)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidConfiguration(_)));
    }

    #[test]
    fn shuffle_is_uniform_over_orderings() {
        // 4 bars → 3 movable bars → 6 orderings, each expected 1/6 of the time.
        let series = PriceSeries::new(
            "U",
            crate::test_support::bars_from_closes(&[100.0, 101.0, 103.0, 106.0]),
        )
        .unwrap();
        let p = Permuter::new(PermutationMethod::Bar);
        let trials = 6_000u64;
        let mut counts: HashMap<Vec<i64>, usize> = HashMap::new();
        for seed in 0..trials {
            let moves = decompose(p.permute(&series, seed).unwrap().series.bars(), 0);
            let key: Vec<i64> = moves.iter().map(|m| (m.close * 1e6).round() as i64).collect();
            *counts.entry(key).or_default() += 1;
        }
        assert_eq!(counts.len(), 6);
        for &c in counts.values() {
            assert!((850..=1150).contains(&c), "ordering count {c} far from 1000");
        }
    }
}

//! PermLab Core — domain types, measures, permutations and the strategy seam.
//!
//! This crate contains everything a single evaluation needs:
//! - Domain types (bars, price series, signal series, parameter sets)
//! - Performance measures oriented so that larger is better
//! - Bar and block permutation of OHLC series
//! - The `Strategy` trait plus a few reference strategies
//! - Deterministic per-trial seeding
//!
//! Monte Carlo orchestration, walk-forward validation and optimizers live in
//! `permlab-runner`.

pub mod domain;
pub mod error;
pub mod measures;
pub mod permutation;
pub mod rng;
pub mod strategies;
pub mod strategy;

#[cfg(test)]
mod test_support;

pub use domain::{Bar, ParamSet, Position, PriceSeries, SeriesError, SignalSeries};
pub use error::ValidationError;
pub use measures::{Measure, MeasureConfig, PerformanceReport, ReturnKind};
pub use permutation::{PermutationMethod, PermutationResult, Permuter};
pub use strategy::{generate_checked, Strategy, StrategyError};

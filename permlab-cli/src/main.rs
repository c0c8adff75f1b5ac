//! PermLab CLI — permutation tests and walk-forward validation from the shell.
//!
//! Commands:
//! - `run` — execute a study from a TOML/JSON file against CSV or synthetic bars
//! - `permute` — write one permuted copy of a CSV or synthetic series
//! - `windows` — print the walk-forward windows for a series length
//! - `strategies` — list registered strategies and optimizers

mod data;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use permlab_core::{Measure, PermutationMethod, Permuter, PriceSeries};
use permlab_runner::synthetic::random_walk;
use permlab_runner::{
    McProgress, MonteCarloVerdict, StudyConfig, StudyReport, StudyRunner, WindowSpec,
};

#[derive(Parser)]
#[command(
    name = "permlab",
    about = "PermLab CLI — Monte Carlo permutation tests and walk-forward validation"
)]
struct Cli {
    /// Log filter (e.g. info, debug, permlab_runner=trace). RUST_LOG wins when set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a study from a TOML or JSON config file.
    Run {
        /// Path to the study file.
        #[arg(long)]
        config: PathBuf,

        /// OHLCV CSV file.
        #[arg(long, conflicts_with = "synthetic")]
        data: Option<PathBuf>,

        /// Use a synthetic random walk of this many bars instead of a CSV.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Seed for the synthetic random walk.
        #[arg(long, default_value_t = 42)]
        synthetic_seed: u64,

        /// Symbol name for CSV data. Defaults to the file stem.
        #[arg(long)]
        symbol: Option<String>,

        /// Write the full report as JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print the JSON report to stdout instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write one permuted copy of a CSV or synthetic series.
    Permute {
        /// OHLCV CSV file.
        #[arg(long, conflicts_with = "synthetic")]
        data: Option<PathBuf>,

        /// Permute a synthetic random walk of this many bars.
        #[arg(long)]
        synthetic: Option<usize>,

        #[arg(long, default_value_t = 42)]
        synthetic_seed: u64,

        /// Output CSV path.
        #[arg(long)]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = MethodArg::Bar)]
        method: MethodArg,

        /// Block length (required with --method block).
        #[arg(long)]
        block_size: Option<usize>,

        /// Bars 0..=start-index are copied unchanged.
        #[arg(long, default_value_t = 0)]
        start_index: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Print walk-forward windows for a series of the given length.
    Windows {
        #[arg(long)]
        bars: usize,
        #[arg(long)]
        train: usize,
        #[arg(long)]
        test: usize,
        /// Defaults to the test length.
        #[arg(long)]
        step: Option<usize>,
        #[arg(long, default_value_t = false)]
        anchored: bool,
    },
    /// List registered strategies and optimizers.
    Strategies,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Bar,
    Block,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Run {
            config,
            data,
            synthetic,
            synthetic_seed,
            symbol,
            output,
            json,
        } => run_study_cmd(
            &config,
            data.as_deref(),
            synthetic,
            synthetic_seed,
            symbol.as_deref(),
            output.as_deref(),
            json,
        ),
        Commands::Permute {
            data,
            synthetic,
            synthetic_seed,
            output,
            method,
            block_size,
            start_index,
            seed,
        } => {
            let series = load_series(data.as_deref(), synthetic, synthetic_seed, None)?;
            run_permute_cmd(&series, &output, method, block_size, start_index, seed)
        }
        Commands::Windows {
            bars,
            train,
            test,
            step,
            anchored,
        } => run_windows_cmd(
            bars,
            WindowSpec {
                train_length: train,
                test_length: test,
                step: step.unwrap_or(test),
                anchored,
            },
        ),
        Commands::Strategies => {
            run_strategies_cmd();
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays clean for reports.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log filter '{level}'"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn run_study_cmd(
    config_path: &Path,
    data: Option<&Path>,
    synthetic: Option<usize>,
    synthetic_seed: u64,
    symbol: Option<&str>,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = StudyConfig::load(config_path)
        .with_context(|| format!("failed to load study {}", config_path.display()))?;
    let series = load_series(data, synthetic, synthetic_seed, symbol)?;

    let progress = |p: &McProgress| {
        let tenth = (p.total / 10).max(1);
        if p.completed % tenth == 0 {
            info!(completed = p.completed, total = p.total, "permutation progress");
        }
    };
    let report = StudyRunner::with_defaults().run_with_progress(
        &series,
        &config,
        Some(&progress),
        None,
    )?;

    let rendered = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    if let Some(path) = output {
        std::fs::write(path, &rendered)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }
    if json {
        println!("{rendered}");
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn load_series(
    data: Option<&Path>,
    synthetic: Option<usize>,
    synthetic_seed: u64,
    symbol: Option<&str>,
) -> Result<PriceSeries> {
    match (data, synthetic) {
        (Some(path), _) => data::load_csv(path, symbol),
        (None, Some(n)) => Ok(random_walk(n, synthetic_seed)?),
        (None, None) => bail!("one of --data or --synthetic is required"),
    }
}

fn run_permute_cmd(
    series: &PriceSeries,
    output: &Path,
    method: MethodArg,
    block_size: Option<usize>,
    start_index: usize,
    seed: u64,
) -> Result<()> {
    let method = match (method, block_size) {
        (MethodArg::Bar, _) => PermutationMethod::Bar,
        (MethodArg::Block, Some(block_size)) => PermutationMethod::Block { block_size },
        (MethodArg::Block, None) => bail!("--block-size is required with --method block"),
    };
    let permuted = Permuter::new(method)
        .with_start_index(start_index)
        .permute(series, seed)?;
    data::write_csv(&permuted.series, output)?;
    info!(
        bars = permuted.series.len(),
        method = %method.label(),
        seed,
        path = %output.display(),
        "permuted series written"
    );
    Ok(())
}

fn run_windows_cmd(n_bars: usize, spec: WindowSpec) -> Result<()> {
    let windows = spec.generate_windows(n_bars)?;
    println!("{:>5}  {:>15}  {:>15}", "#", "train", "test");
    for w in &windows {
        println!(
            "{:>5}  {:>15}  {:>15}",
            w.index,
            format!("{}..={}", w.train_start, w.train_end),
            format!("{}..={}", w.test_start, w.test_end)
        );
    }
    let covered: usize = windows.iter().map(|w| w.test_len()).sum();
    println!("{} windows, {covered} test bars", windows.len());
    Ok(())
}

fn run_strategies_cmd() {
    let runner = StudyRunner::with_defaults();
    for name in runner.strategies().names() {
        if let Ok(strategy) = runner.strategies().get(name) {
            println!("{name:<20} {}", strategy.default_params());
        }
    }
    println!();
    println!("optimizers: {}", runner.optimizers().names().join(", "));
}

fn print_verdict(title: &str, verdict: &MonteCarloVerdict) {
    println!("--- {title} ---");
    println!(
        "Permutations:   {} of {} ({})",
        verdict.n_permutations,
        verdict.requested_permutations,
        verdict.method.label()
    );
    println!("Observed:       {:.4}", verdict.observed_statistic);
    println!(
        "Null:           mean {:.4}, std {:.4}",
        verdict.null_mean, verdict.null_std
    );
    println!("z-score:        {:.2}", verdict.z_score);
    println!(
        "p-value:        {:.4} ({} at {})",
        verdict.p_value,
        if verdict.is_significant {
            "significant"
        } else {
            "not significant"
        },
        verdict.significance_level
    );
    if !verdict.complete {
        println!("WARNING: partial result after cancellation");
    }
    println!();
}

fn print_summary(report: &StudyReport) {
    println!();
    println!("=== Study Result ===");
    println!("Symbol:         {}", report.symbol);
    println!("Bars:           {}", report.n_bars);
    println!("Strategy:       {} {}", report.strategy, report.params);
    println!("Objective:      {}", report.objective);
    println!();
    println!("--- In-sample ---");
    for measure in [
        Measure::TotalReturn,
        Measure::Sharpe,
        Measure::Sortino,
        Measure::MaxDrawdown,
        Measure::WinRate,
        Measure::ProfitFactor,
    ] {
        if let Some(value) = report.in_sample.get(measure) {
            println!("{:<15} {value:.4}", format!("{measure}:"));
        }
    }
    println!("Trades:         {}", report.in_sample.trade_count);
    println!("Exposure:       {:.1}%", report.in_sample.exposure * 100.0);
    println!();

    if let Some(mc) = &report.monte_carlo {
        print_verdict("Permutation test", mc);
    }
    if let Some(wf) = &report.walk_forward {
        println!("--- Walk-forward ---");
        println!(
            "Windows:        {} ({} skipped)",
            wf.windows.len(),
            wf.skipped.len()
        );
        println!("Stitched bars:  {}", wf.signals.len());
        println!("Mean IS score:  {:.4}", wf.mean_is_score);
        println!("Mean OOS score: {:.4}", wf.mean_oos_score);
        match wf.degradation_ratio {
            Some(ratio) => println!("Degradation:    {ratio:.3} ({:?})", wf.degradation_flag),
            None => println!("Degradation:    n/a ({:?})", wf.degradation_flag),
        }
        println!();
    }
    if let Some(mc) = &report.walk_forward_monte_carlo {
        print_verdict("Walk-forward permutation test", mc);
    }
}

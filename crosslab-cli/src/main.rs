//! Crosslab CLI: run, sweep and period-analysis commands.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file or command-line flags
//! - `sweep`: grid-search MA windows and stop levels, print the top results
//! - `period`: run a config and analyze one date window

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crosslab_core::engine::{EndOfRunPolicy, StrategyConfig, TradingMode};
use crosslab_core::signals::MaCrossover;
use crosslab_runner::config::{
    BacktestConfig, DataConfig, DataSource, PeriodConfig, ShockConfig,
};
use crosslab_runner::export::{export_sweep_csv, save_artifacts};
use crosslab_runner::sweep::{sweep_base, ParamGrid, ParamSweep, SweepResult, SweepResults};
use crosslab_runner::{
    analyze_period, load_bars, run_backtest_from_data, run_single_backtest, BacktestResult,
    RunMonitor,
};

#[derive(Parser)]
#[command(
    name = "crosslab",
    about = "Crosslab CLI: moving-average crossover backtester"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one backtest from a TOML config file or flags.
    Run {
        /// Path to a TOML config file. Data and strategy flags are ignored
        /// when given.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        strategy: StrategyArgs,

        /// Window to analyze, as START:END or LABEL=START:END. Repeatable.
        /// Defaults to covid=2020-02-01:2020-04-30.
        #[arg(long = "period", value_name = "WINDOW")]
        periods: Vec<PeriodConfig>,

        /// Output directory for trades.csv, equity.csv, result.json and
        /// summary_report.txt.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Grid-search windows and stop levels, ranked by Sharpe ratio.
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// Capital, sizing, mode and trailing stop for the --run-best re-run.
        /// Only --hold-days also applies to the grid itself.
        #[command(flatten)]
        risk: RiskArgs,

        /// Number of results to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Run grid points one at a time instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Re-run the best combination and print its full report.
        #[arg(long, default_value_t = false)]
        run_best: bool,

        /// Write sweep.csv (and the best run's artifacts) here.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run a config and analyze one date window.
    Period {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Window start (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start: NaiveDate,

        /// Window end (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: NaiveDate,
    },
}

#[derive(Args)]
struct DataArgs {
    /// Price CSV. Synthetic data is generated when omitted.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD).
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Seed for synthetic data.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Leave the 2020 crash out of the synthetic walk.
    #[arg(long, default_value_t = false)]
    no_shocks: bool,
}

impl DataArgs {
    fn to_config(&self) -> DataConfig {
        DataConfig {
            source: if self.csv.is_some() {
                DataSource::Csv
            } else {
                DataSource::Synthetic
            },
            path: self.csv.clone(),
            start_date: self.start,
            end_date: self.end,
            seed: self.seed,
            shocks: if self.no_shocks {
                Vec::new()
            } else {
                ShockConfig::covid_crash()
            },
        }
    }
}

#[derive(Args)]
struct StrategyArgs {
    /// Short moving average window.
    #[arg(long, default_value_t = 10)]
    short: usize,

    /// Long moving average window.
    #[arg(long, default_value_t = 50)]
    long: usize,

    /// Stop-loss fraction below entry.
    #[arg(long, default_value_t = 0.05)]
    stop: f64,

    /// Take-profit fraction above entry.
    #[arg(long, default_value_t = 0.15)]
    take: f64,

    #[command(flatten)]
    risk: RiskArgs,
}

/// Everything but the windows and fixed stops.
#[derive(Args)]
struct RiskArgs {
    /// Initial capital.
    #[arg(long, default_value_t = 1_000_000.0)]
    capital: f64,

    /// Fraction of cash committed per entry.
    #[arg(long, default_value_t = 0.5)]
    size: f64,

    /// Close positions held across a calendar day.
    #[arg(long, default_value_t = false)]
    intraday: bool,

    /// Maximum holding period in days (swing mode).
    #[arg(long, default_value_t = 60)]
    hold_days: u32,

    /// Disable the trailing stop.
    #[arg(long, default_value_t = false)]
    no_trailing_stop: bool,

    /// Gain that arms the trailing stop.
    #[arg(long, default_value_t = 0.02)]
    trailing_activation: f64,

    /// Distance the trailing stop keeps below price.
    #[arg(long, default_value_t = 0.02)]
    trailing_distance: f64,

    /// Close any open position at the last bar.
    #[arg(long, default_value_t = false)]
    liquidate: bool,
}

impl StrategyArgs {
    fn to_config(&self) -> Result<StrategyConfig> {
        let config = StrategyConfig {
            short_window: self.short,
            long_window: self.long,
            ..self.risk.to_config()?
        }
        .with_stops(self.stop, self.take);
        config.validate()?;
        Ok(config)
    }
}

impl RiskArgs {
    /// Risk settings on the default windows and stops.
    fn to_config(&self) -> Result<StrategyConfig> {
        let mut config = StrategyConfig::default()
            .with_position_size(self.size)
            .with_trailing_stop(self.trailing_activation, self.trailing_distance)
            .with_max_hold_days(self.hold_days);
        config.initial_capital = self.capital;
        if self.no_trailing_stop {
            config = config.without_trailing_stop();
        }
        if self.intraday {
            config = config.with_mode(TradingMode::Intraday);
        }
        if self.liquidate {
            config = config.with_end_of_run(EndOfRunPolicy::Liquidate);
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crosslab=info,crosslab_runner=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            strategy,
            periods,
            output_dir,
        } => run_cmd(config, &data, &strategy, periods, output_dir),
        Commands::Sweep {
            data,
            risk,
            top,
            sequential,
            run_best,
            output_dir,
        } => sweep_cmd(&data, &risk, top, sequential, run_best, output_dir),
        Commands::Period { config, start, end } => period_cmd(config, start, end),
    }
}

fn run_cmd(
    config_path: Option<PathBuf>,
    data: &DataArgs,
    strategy: &StrategyArgs,
    periods: Vec<PeriodConfig>,
    output_dir: PathBuf,
) -> Result<()> {
    let config = match config_path {
        Some(path) => BacktestConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            let mut config = BacktestConfig::new(&strategy.to_config()?);
            config.data = data.to_config();
            if !periods.is_empty() {
                config.periods = periods;
            }
            config.validate()?;
            config
        }
    };

    let (result, monitor) = run_single_backtest(&config)?;
    print_summary(&result);
    print_monitor(&monitor);

    let dir = save_artifacts(&result, &output_dir)?;
    println!("Artifacts saved to: {}", dir.display());
    Ok(())
}

fn sweep_cmd(
    data: &DataArgs,
    risk: &RiskArgs,
    top: usize,
    sequential: bool,
    run_best: bool,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let loaded = load_bars(&data.to_config())?;
    let base = sweep_base(risk.hold_days)?;
    let grid = ParamGrid::default();
    info!(grid_size = grid.size(), "sweeping");

    let results = ParamSweep::new()
        .with_parallelism(!sequential)
        .sweep(&grid, &base, &loaded)?;
    print_sweep(&results, top);

    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        std::fs::write(dir.join("sweep.csv"), export_sweep_csv(&results.results)?)?;
    }

    if run_best {
        let Some(best) = results.best() else {
            bail!("sweep produced no results");
        };
        let config = best_run_config(best, risk)?;
        let source = MaCrossover::new(config.short_window, config.long_window);
        let mut monitor = RunMonitor::default();
        let periods = [PeriodConfig::covid()];
        let result =
            run_backtest_from_data(&config, &loaded, &source, &periods, Some(&mut monitor))?;

        println!();
        println!("=== Best Combination ===");
        print_summary(&result);
        print_monitor(&monitor);
        if let Some(dir) = &output_dir {
            let saved = save_artifacts(&result, &dir.join("best"))?;
            println!("Artifacts saved to: {}", saved.display());
        }
    }
    Ok(())
}

/// The best grid point's windows and stops on the caller's capital, sizing,
/// mode and trailing stop.
fn best_run_config(best: &SweepResult, risk: &RiskArgs) -> Result<StrategyConfig> {
    let config = best.to_config(&risk.to_config()?);
    config.validate()?;
    Ok(config)
}

fn period_cmd(config_path: PathBuf, start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        bail!("--start {start} is after --end {end}");
    }
    let config = BacktestConfig::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let (result, _) = run_single_backtest(&config)?;
    let report = analyze_period(&result.equity, &result.trades, start, end);

    println!("Period:     {}", report.period);
    println!("Return:     {:.2}%", report.period_return * 100.0);
    println!("Trades:     {}", report.trade_count);
    println!("Win Rate:   {:.2}%", report.win_rate * 100.0);
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Run ID:         {}", result.run_id);
    println!(
        "Period:         {} to {}",
        result.start_date, result.end_date
    );
    println!("Bars:           {}", result.bar_count);
    println!(
        "Windows:        {} / {}",
        result.config.short_window, result.config.long_window
    );
    println!();
    println!("--- Performance ---");
    for (name, value) in result.metrics.summary_rows() {
        println!("{name:<30} {value:>12.2}");
    }

    if !result.periods.is_empty() {
        println!();
        println!("--- Periods ---");
        for p in &result.periods {
            println!(
                "{:<12} {}  return {:>7.2}%  trades {:>3}  win rate {:>6.2}%",
                p.label,
                p.period,
                p.period_return * 100.0,
                p.trade_count,
                p.win_rate * 100.0
            );
        }
    }

    if !result.metrics.exit_reason_counts.is_empty() {
        println!();
        println!("--- Exit Reasons ---");
        for (reason, count) in &result.metrics.exit_reason_counts {
            println!("{reason:<16} {count}");
        }
    }

    if let Some(pos) = &result.open_position {
        println!();
        println!(
            "Open position:  {} shares @ {:.2} since {}",
            pos.shares, pos.entry_price, pos.entry_timestamp
        );
    }
    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}

/// Trades shown from the monitor's tail.
const RECENT_TRADES: usize = 5;

fn print_monitor(monitor: &RunMonitor) {
    if let Some(stats) = monitor.latency_stats() {
        println!();
        println!(
            "Step latency:   avg {:.2}us  p99 {:.2}us  max {:.2}us ({} samples)",
            stats.avg_us, stats.p99_us, stats.max_us, stats.samples
        );
    }

    let recent = monitor.recent_trades();
    if !recent.is_empty() {
        println!();
        println!("--- Last {} trades ---", RECENT_TRADES.min(recent.len()));
        for t in recent.iter().skip(recent.len().saturating_sub(RECENT_TRADES)) {
            println!(
                "{} -> {}  {:>8.2} -> {:>8.2}  pnl {:>12.2}  {}",
                t.entry_timestamp.date(),
                t.exit_timestamp.date(),
                t.entry_price,
                t.exit_price,
                t.pnl,
                t.exit_reason
            );
        }
    }
}

fn print_sweep(results: &SweepResults, top: usize) {
    println!();
    println!(
        "=== Top {} of {} combinations ===",
        top.min(results.len()),
        results.len()
    );
    println!(
        "{:>4} {:>6} {:>6} {:>7} {:>7} {:>10} {:>8} {:>9} {:>7}",
        "rank", "short", "long", "stop", "take", "return", "sharpe", "max dd", "trades"
    );
    for (i, r) in results.top(top).iter().enumerate() {
        let m = &r.metrics;
        println!(
            "{:>4} {:>6} {:>6} {:>6.1}% {:>6.1}% {:>9.2}% {:>8.3} {:>8.2}% {:>7}",
            i + 1,
            r.short_window,
            r.long_window,
            r.stop_loss_pct * 100.0,
            r.take_profit_pct * 100.0,
            m.total_return * 100.0,
            m.sharpe,
            m.max_drawdown * 100.0,
            m.trade_count
        );
    }
    if results.failed > 0 {
        println!("{} combinations failed; see log", results.failed);
    }
}

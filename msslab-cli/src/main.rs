//! MSSLab CLI: backtest, data validation and setup scanning commands.
//!
//! Commands:
//! - `run`: backtest a CSV from a TOML config and write artifacts
//! - `validate`: run only the series preprocessor and print a data summary
//! - `scan`: print detected MSS setups without simulating
//! - `sweep`: run a parameter grid in parallel and rank the results
//!
//! Logging goes through `tracing`; the filter comes from `MSSLAB_LOG` or
//! `--log-level`, and `--log-format json` switches to JSON lines.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use msslab_core::data::PreprocessConfig;
use msslab_core::scanner::scan_setups;
use msslab_runner::sweep::rank_by_net_profit;
use msslab_runner::{
    load_series, run_backtest, run_sweep, BacktestConfig, BacktestRun, DataSummary, ParamGrid,
};

#[derive(Parser)]
#[command(
    name = "msslab",
    about = "MSSLab CLI: market structure shift detection and FX backtesting"
)]
struct Cli {
    /// Log filter (overridden by MSSLAB_LOG), e.g. "info" or "msslab_core=debug".
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a bar file and write trade log, report and summary.
    Run {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bar CSV; overrides [data].path.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Output directory; overrides [output].dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the summary without writing artifacts.
        #[arg(long, default_value_t = false)]
        no_artifacts: bool,
    },
    /// Validate a bar file and print a data-quality summary.
    Validate {
        /// Bar CSV to validate.
        #[arg(long)]
        data: PathBuf,

        /// Fraction of rows allowed to violate OHLC invariants (dropped).
        #[arg(long, default_value_t = 0.0)]
        tolerance: f64,

        /// Print the summary as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print MSS setups detected in a bar file, without sizing or simulating.
    Scan {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bar CSV; overrides [data].path.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Print at most this many setups.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Run a parameter grid over one bar file and rank by net profit.
    Sweep {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bar CSV; overrides [data].path.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Fast EMA periods, comma separated.
        #[arg(long, value_delimiter = ',')]
        ema_fast: Vec<usize>,

        /// Slow EMA periods, comma separated.
        #[arg(long, value_delimiter = ',')]
        ema_slow: Vec<usize>,

        /// Swing lookbacks, comma separated.
        #[arg(long, value_delimiter = ',')]
        swing_lookback: Vec<usize>,

        /// Minimum RR values, comma separated.
        #[arg(long, value_delimiter = ',')]
        min_rr: Vec<f64>,

        /// Rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Commands::Run {
            config,
            data,
            output_dir,
            no_artifacts,
        } => run_cmd(config, data, output_dir, no_artifacts),
        Commands::Validate {
            data,
            tolerance,
            json,
        } => validate_cmd(&data, tolerance, json),
        Commands::Scan {
            config,
            data,
            limit,
        } => scan_cmd(config, data, limit),
        Commands::Sweep {
            config,
            data,
            ema_fast,
            ema_slow,
            swing_lookback,
            min_rr,
            top,
        } => {
            let axes = SweepAxes {
                ema_fast,
                ema_slow,
                swing_lookback,
                min_rr,
            };
            sweep_cmd(config, data, axes, top)
        }
    }
}

fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let filter = std::env::var("MSSLAB_LOG").unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter).context("invalid log filter")?;

    match log_format.trim().to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .init(),
        "text" => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
        other => bail!("unknown --log-format '{other}' (expected text or json)"),
    }
    Ok(())
}

/// Load the config (or defaults) and apply the `--data` override.
fn load_config(config: Option<PathBuf>, data: Option<PathBuf>) -> Result<BacktestConfig> {
    let mut cfg = match &config {
        Some(path) => BacktestConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BacktestConfig::default(),
    };
    if data.is_some() {
        cfg.data.path = data;
    }
    if cfg.data.path.is_none() {
        bail!("no bar file given: pass --data or set [data].path in the config");
    }
    Ok(cfg)
}

fn run_cmd(
    config: Option<PathBuf>,
    data: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    no_artifacts: bool,
) -> Result<()> {
    let mut cfg = load_config(config, data)?;
    if let Some(dir) = output_dir {
        cfg.output.dir = dir;
    }

    let run = run_backtest(&cfg).context("backtest failed")?;
    print_summary(&run);

    if !no_artifacts {
        let paths = run
            .save(&cfg.output.dir)
            .context("failed to write artifacts")?;
        println!("Artifacts saved to: {}", paths.dir.display());
    }
    Ok(())
}

fn print_summary(run: &BacktestRun) {
    let r = &run.report;
    let ratio = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.2}"));

    println!("Run:            {}", run.run_id);
    println!("Symbol:         {}", run.config.engine.instrument.symbol);
    println!("Bars:           {}", run.result.bar_count());
    println!("Setups:         {}", r.setups_detected);
    println!("Trades:         {} ({} won)", r.total_trades, r.wins);
    println!("Win rate:       {:.2}%", r.win_rate * 100.0);
    println!("Net profit:     {:.2} ({:.2}%)", r.net_profit, r.net_profit_pct);
    println!("Max drawdown:   {:.2} ({:.2}%)", r.max_drawdown, r.max_drawdown_pct * 100.0);
    println!("Profit factor:  {}", ratio(r.profit_factor));
    println!("Sharpe:         {}", ratio(r.sharpe));
    println!("Sortino:        {}", ratio(r.sortino));
    println!("Calmar:         {}", ratio(r.calmar));
}

fn validate_cmd(data: &Path, tolerance: f64, json: bool) -> Result<()> {
    if !(0.0..=1.0).contains(&tolerance) {
        bail!("--tolerance must be within [0, 1], got {tolerance}");
    }
    let config = PreprocessConfig {
        ohlc_violation_tolerance: tolerance,
    };
    let loaded = load_series(data, &config)
        .with_context(|| format!("validation failed for {}", data.display()))?;
    let summary = loaded.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_data_summary(&summary);
        for gap in loaded.series.gaps.iter().take(10) {
            println!(
                "  gap before bar {}: {} -> {} (~{} bars missing)",
                gap.index, gap.previous, gap.next, gap.missing_bars
            );
        }
        if loaded.series.gaps.len() > 10 {
            println!("  ... {} more", loaded.series.gaps.len() - 10);
        }
    }
    Ok(())
}

fn print_data_summary(s: &DataSummary) {
    println!("Source:           {}", s.source);
    println!("Rows read:        {}", s.rows_read);
    println!("Bars:             {}", s.bars);
    println!("Dropped rows:     {}", s.dropped_rows);
    println!("First bar:        {}", or_dash(s.first_timestamp));
    println!("Last bar:         {}", or_dash(s.last_timestamp));
    match s.nominal_interval_secs {
        Some(secs) => println!("Nominal interval: {secs}s"),
        None => println!("Nominal interval: -"),
    }
    println!("Gaps:             {} (~{} bars missing)", s.gaps, s.missing_bars);
}

fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn scan_cmd(config: Option<PathBuf>, data: Option<PathBuf>, limit: Option<usize>) -> Result<()> {
    let cfg = load_config(config, data)?;
    let path = cfg.data.path.as_deref().context("no bar file configured")?;
    let loaded = load_series(path, &cfg.data.preprocess())
        .with_context(|| format!("failed to load {}", path.display()))?;
    let setups = scan_setups(&loaded.series.bars, &cfg.engine).context("scan failed")?;
    let pip = cfg.engine.instrument.pip_size;

    println!("{} setups in {} bars", setups.len(), loaded.series.bars.len());
    println!(
        "{:<6} {:<26} {:<6} {:>10} {:>10} {:>10} {:>8}",
        "Bar", "Time", "Side", "Entry", "Level", "Stop", "Pips"
    );
    println!("{}", "-".repeat(84));
    for s in setups.iter().take(limit.unwrap_or(usize::MAX)) {
        println!(
            "{:<6} {:<26} {:<6} {:>10.5} {:>10.5} {:>10.5} {:>8.1}",
            s.bar_index,
            s.timestamp.to_rfc3339(),
            s.direction.as_str(),
            s.entry_price,
            s.breakout_level,
            s.stop_level,
            s.anchor_distance() / pip,
        );
    }
    Ok(())
}

struct SweepAxes {
    ema_fast: Vec<usize>,
    ema_slow: Vec<usize>,
    swing_lookback: Vec<usize>,
    min_rr: Vec<f64>,
}

fn sweep_cmd(config: Option<PathBuf>, data: Option<PathBuf>, axes: SweepAxes, top: usize) -> Result<()> {
    let cfg = load_config(config, data)?;
    let path = cfg.data.path.as_deref().context("no bar file configured")?;
    let loaded = load_series(path, &cfg.data.preprocess())
        .with_context(|| format!("failed to load {}", path.display()))?;

    let mut grid = ParamGrid::from_base(&cfg.engine);
    if !axes.ema_fast.is_empty() {
        grid.ema_fast = axes.ema_fast;
    }
    if !axes.ema_slow.is_empty() {
        grid.ema_slow = axes.ema_slow;
    }
    if !axes.swing_lookback.is_empty() {
        grid.swing_lookback = axes.swing_lookback;
    }
    if !axes.min_rr.is_empty() {
        grid.min_rr = axes.min_rr;
    }
    let configs = grid.generate_configs(&cfg.engine);
    if configs.is_empty() {
        bail!("parameter grid is empty (every fast EMA >= slow EMA?)");
    }
    tracing::info!(runs = configs.len(), "starting sweep");

    let results = run_sweep(&loaded.series.bars, &configs);
    let rows = rank_by_net_profit(&configs, &results);

    println!(
        "{:<5} {:>5} {:>5} {:>3} {:>6} {:>7} {:>8} {:>12} {:>10}",
        "#", "fast", "slow", "k", "minRR", "trades", "win%", "net", "maxDD"
    );
    println!("{}", "-".repeat(72));
    for row in rows.iter().take(top) {
        println!(
            "{:<5} {:>5} {:>5} {:>3} {:>6.2} {:>7} {:>8.2} {:>12.2} {:>10.2}",
            row.index,
            row.ema_fast,
            row.ema_slow,
            row.swing_lookback,
            row.min_rr,
            row.trades,
            row.win_rate * 100.0,
            row.net_profit,
            row.max_drawdown,
        );
    }
    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        println!("{failed} of {} runs failed", results.len());
    }
    Ok(())
}

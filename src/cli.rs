//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    configured_tickers, parse_date, parse_tickers, validate_search_config, validate_window,
};
use crate::domain::date_range::DateRange;
use crate::domain::error::PortoptError;
use crate::domain::frontier::Frontier;
use crate::domain::market::MarketData;
use crate::domain::portfolio::Portfolio;
use crate::domain::search::{self, SearchConfig, SearchOutcome};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;

#[derive(Parser, Debug)]
#[command(name = "portopt", about = "Mean/variance portfolio frontier explorer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a Yahoo-style CSV into the price cache
    Import {
        #[arg(short, long)]
        config: PathBuf,
        /// Defaults to the CSV file name without extension
        #[arg(short, long)]
        ticker: Option<String>,
        #[arg(long)]
        csv: PathBuf,
        /// Drop the ticker's cached rows before loading
        #[arg(long)]
        replace: bool,
    },
    /// Show cached date ranges
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        ticker: Option<String>,
    },
    /// Print per-period return, deviation and correlations
    Stats {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated, overrides [search] tickers
        #[arg(long)]
        tickers: Option<String>,
    },
    /// Search weightings and print the efficient frontier
    Frontier {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        iterations: Option<usize>,
        #[arg(short, long)]
        seed: Option<u64>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Import {
            config,
            ticker,
            csv,
            replace,
        } => run_import(&config, ticker.as_deref(), &csv, replace),
        Command::Info { config, ticker } => run_info(&config, ticker.as_deref()),
        Command::Stats { config, tickers } => run_stats(&config, tickers.as_deref()),
        Command::Frontier {
            config,
            iterations,
            seed,
        } => run_frontier(&config, iterations, seed),
    }
}

fn fail(err: &PortoptError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Sampling window from `[search] start_date`, `end_date`, `interval_days`.
pub fn build_window(config: &dyn ConfigPort) -> Result<DateRange, PortoptError> {
    validate_window(config)?;
    let start = parse_date(
        "search",
        "start_date",
        config.get_string("search", "start_date").as_deref(),
    )?;
    let end = parse_date(
        "search",
        "end_date",
        config.get_string("search", "end_date").as_deref(),
    )?;
    let interval = config.get_int("search", "interval_days", 30);
    Ok(DateRange::new(start, end, interval))
}

pub fn build_search_config(
    config: &dyn ConfigPort,
    iterations: Option<usize>,
    seed: Option<u64>,
) -> SearchConfig {
    let defaults = SearchConfig::default();
    SearchConfig {
        iterations: iterations.unwrap_or_else(|| {
            config.get_int("search", "iterations", defaults.iterations as i64).max(0) as usize
        }),
        seed: seed.unwrap_or_else(|| config.get_int("search", "seed", defaults.seed as i64) as u64),
        max_step: config.get_double("search", "max_step", defaults.max_step),
        extra_effort: config
            .get_int("search", "extra_effort", defaults.extra_effort as i64)
            .max(0) as usize,
    }
}

pub fn resolve_tickers(tickers_override: Option<&str>, config: &dyn ConfigPort) -> Vec<String> {
    match tickers_override {
        Some(raw) => parse_tickers(raw),
        None => configured_tickers(config),
    }
}

/// `[csv] dir` serves prices straight from CSV files; otherwise the SQLite
/// cache is used.
pub fn open_price_port(config: &dyn ConfigPort) -> Result<Box<dyn PricePort>, PortoptError> {
    if let Some(dir) = config.get_string("csv", "dir") {
        return Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))));
    }

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let adapter = SqliteAdapter::from_config(config)?;
        adapter.initialize_schema()?;
        Ok(Box::new(adapter))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        Err(PortoptError::Database {
            reason: "sqlite feature is required unless [csv] dir is set".into(),
        })
    }
}

fn run_import(
    config_path: &Path,
    ticker: Option<&str>,
    csv_path: &Path,
    replace: bool,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let ticker = match ticker {
        Some(t) => t.trim().to_ascii_uppercase(),
        None => match csv_path.file_stem() {
            Some(stem) => stem.to_string_lossy().to_ascii_uppercase(),
            None => {
                eprintln!("error: cannot derive ticker from {}", csv_path.display());
                return ExitCode::from(2);
            }
        },
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let result = SqliteAdapter::from_config(&config).and_then(|db| {
            db.initialize_schema()?;
            import_csv(&db, &ticker, csv_path, replace)
        });
        match result {
            Ok(count) => {
                eprintln!("Imported {count} bars for {ticker}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, ticker, csv_path, replace);
        eprintln!("error: sqlite feature is required for import");
        ExitCode::from(1)
    }
}

/// Loads one CSV into the cache. With `replace`, rows already cached for
/// `ticker` are removed first so dates missing from the file disappear too.
#[cfg(feature = "sqlite")]
pub fn import_csv(
    db: &crate::adapters::sqlite_adapter::SqliteAdapter,
    ticker: &str,
    csv_path: &Path,
    replace: bool,
) -> Result<usize, PortoptError> {
    use crate::adapters::csv_adapter::read_bars_from_path;

    let bars = read_bars_from_path(csv_path, ticker)?;
    if bars.is_empty() {
        eprintln!("warning: {} has no quote rows", csv_path.display());
    }
    if replace {
        let removed = db.delete_ticker(ticker)?;
        eprintln!("Removed {removed} cached bars for {ticker}");
    }
    db.insert_bars(&bars)
}

fn run_info(config_path: &Path, ticker: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let port = match open_price_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    match info_report(port.as_ref(), ticker) {
        Ok(report) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

/// One line per ticker: first date, last date and bar count.
pub fn info_report(port: &dyn PricePort, ticker: Option<&str>) -> Result<String, PortoptError> {
    let tickers = match ticker {
        Some(t) => vec![t.to_ascii_uppercase()],
        None => port.list_tickers()?,
    };

    let mut out = String::new();
    for t in &tickers {
        match port.get_date_range(t)? {
            Some((first, last, count)) => {
                out.push_str(&format!("{t}: {first} to {last} ({count} bars)\n"));
            }
            None if ticker.is_some() => {
                return Err(PortoptError::NoData { ticker: t.clone() });
            }
            None => {}
        }
    }
    if tickers.is_empty() {
        eprintln!("No tickers cached");
    }
    Ok(out)
}

fn run_stats(config_path: &Path, tickers_override: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let window = match build_window(&config) {
        Ok(w) => w,
        Err(e) => return fail(&e),
    };
    let tickers = resolve_tickers(tickers_override, &config);
    if tickers.is_empty() {
        eprintln!("error: no tickers configured");
        return ExitCode::from(2);
    }
    let port = match open_price_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    match stats_report(port.as_ref(), window, &tickers) {
        Ok(report) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

/// Per-ticker statistics followed by the correlation matrix.
pub fn stats_report(
    port: &dyn PricePort,
    window: DateRange,
    tickers: &[String],
) -> Result<String, PortoptError> {
    let mut market = MarketData::new(port, window);
    eprintln!("Sampling {} tickers over {window}", tickers.len());

    let mut out = format!(
        "{:<8} {:>8} {:>12} {:>12}\n",
        "ticker", "samples", "return", "stddev"
    );
    for t in tickers {
        let security = market.security(t)?;
        let stats = security.stats();
        out.push_str(&format!(
            "{:<8} {:>8} {:>12.6} {:>12.6}\n",
            t,
            security.sample_count(),
            stats.per_period_return,
            stats.stddev
        ));
    }

    out.push_str(&format!("\n{:<8}", ""));
    for t in tickers {
        out.push_str(&format!(" {t:>8}"));
    }
    out.push('\n');
    for a in tickers {
        out.push_str(&format!("{a:<8}"));
        for b in tickers {
            let rho = market.correlation(a, b)?;
            out.push_str(&format!(" {rho:>8.4}"));
        }
        out.push('\n');
    }
    Ok(out)
}

fn run_frontier(config_path: &Path, iterations: Option<usize>, seed: Option<u64>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_search_config(&config) {
        return fail(&e);
    }

    let window = match build_window(&config) {
        Ok(w) => w,
        Err(e) => return fail(&e),
    };
    let tickers = resolve_tickers(None, &config);
    let search_config = build_search_config(&config, iterations, seed);
    let port = match open_price_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    match run_frontier_pipeline(port.as_ref(), window, &tickers, &search_config) {
        Ok(outcome) => {
            print!("{}", format_frontier(&outcome.frontier));
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

pub fn run_frontier_pipeline(
    port: &dyn PricePort,
    window: DateRange,
    tickers: &[String],
    search_config: &SearchConfig,
) -> Result<SearchOutcome, PortoptError> {
    let mut market = MarketData::new(port, window);
    eprintln!(
        "Searching {} tickers over {window}: {} iterations, seed {}",
        tickers.len(),
        search_config.iterations,
        search_config.seed
    );

    // Load everything up front so a bad ticker fails before the search starts.
    for t in tickers {
        market.security(t)?;
    }

    let outcome = search::search(&mut market, tickers, search_config)?;
    eprintln!(
        "Evaluated {} portfolios, accepted {}, skipped {}; {} on the frontier",
        outcome.evaluated,
        outcome.accepted,
        outcome.skipped,
        outcome.frontier.len()
    );
    Ok(outcome)
}

/// Frontier points from lowest to highest return.
pub fn format_frontier(frontier: &Frontier<Portfolio>) -> String {
    let mut out = format!("{:>12} {:>12}  weights\n", "return", "risk");
    for point in frontier.iter() {
        out.push_str(&format!(
            "{:>12.6} {:>12.6}  {}\n",
            point.x, point.y, point.payload
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn build_window_rounds_interval() {
        let c = config(
            "[search]\nstart_date = 2010-01-01\nend_date = 2012-01-01\ninterval_days = 50\n",
        );
        let w = build_window(&c).unwrap();
        assert_eq!(w.interval_days(), 60);
        assert!(w.start() <= NaiveDate::from_ymd_opt(2010, 1, 1).unwrap());
    }

    #[test]
    fn build_window_requires_dates() {
        let c = config("[search]\nstart_date = 2010-01-01\n");
        assert!(matches!(
            build_window(&c),
            Err(PortoptError::ConfigMissing { key, .. }) if key == "end_date"
        ));
    }

    #[test]
    fn build_window_rejects_oversized_interval() {
        let dir = tempfile::TempDir::new().unwrap();
        let c = config(&format!(
            "[csv]\ndir = {}\n\n[search]\ntickers = VTI\nstart_date = 2010-01-01\nend_date = 2012-01-01\ninterval_days = 200000000000\n",
            dir.path().display()
        ));
        assert!(matches!(
            build_window(&c),
            Err(PortoptError::ConfigInvalid { key, .. }) if key == "interval_days"
        ));
    }

    #[test]
    fn stats_report_survives_oversized_window_interval() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("VTI.csv"),
            "Date,Open,High,Low,Close,Volume,Adj Close\n2011-01-03,2,2,2,2,1,2\n2010-01-04,1,1,1,1,1,1\n",
        )
        .unwrap();
        let port = CsvAdapter::new(dir.path().to_path_buf());
        let window = DateRange::new(
            NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2012, 1, 1).unwrap(),
            200_000_000_000,
        );
        let err = stats_report(&port, window, &["VTI".to_string()]).unwrap_err();
        // Both quotes fall in the single ten-year bucket.
        assert!(matches!(err, PortoptError::InsufficientData { samples: 1, .. }));
    }

    #[test]
    fn search_config_overrides_win() {
        let c = config("[search]\niterations = 10\nseed = 5\nmax_step = 0.2\nextra_effort = 3\n");
        let sc = build_search_config(&c, None, None);
        assert_eq!(
            sc,
            SearchConfig {
                iterations: 10,
                seed: 5,
                max_step: 0.2,
                extra_effort: 3,
            }
        );
        let sc = build_search_config(&c, Some(99), Some(1));
        assert_eq!((sc.iterations, sc.seed), (99, 1));
    }

    #[test]
    fn search_config_defaults() {
        let sc = build_search_config(&config("[search]\n"), None, None);
        assert_eq!(sc, SearchConfig::default());
    }

    #[test]
    fn resolve_tickers_prefers_override() {
        let c = config("[search]\ntickers = vti, BND,,\n");
        assert_eq!(resolve_tickers(None, &c), vec!["VTI", "BND"]);
        assert_eq!(resolve_tickers(Some("gld"), &c), vec!["GLD"]);
        assert!(resolve_tickers(None, &config("[search]\n")).is_empty());
    }

    #[test]
    fn csv_dir_selects_csv_port() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("VTI.csv"),
            "Date,Open,High,Low,Close,Volume,Adj Close\n2012-01-03,1,1,1,1,1,1\n",
        )
        .unwrap();
        let c = config(&format!("[csv]\ndir = {}\n", dir.path().display()));
        let port = open_price_port(&c).unwrap();
        assert_eq!(port.list_tickers().unwrap(), vec!["VTI"]);
    }

    #[test]
    fn format_frontier_lists_points_in_order() {
        let mut frontier = Frontier::new();
        frontier.insert(0.01, 0.02, Portfolio::equal_weight(&["BND"]));
        frontier.insert(0.03, 0.05, Portfolio::equal_weight(&["VTI"]));
        let text = format_frontier(&frontier);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("0.010000") && lines[1].contains("BND:1.0000"));
        assert!(lines[2].contains("0.030000") && lines[2].contains("VTI:1.0000"));
    }
}

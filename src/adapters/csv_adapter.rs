//! Yahoo-style CSV price files.
//!
//! Layout: `Date,Open,High,Low,Close,Volume,Adj Close`. Rows whose first
//! column is not a `YYYY-MM-DD` date (headers, footers) are skipped, as are
//! rows carrying `null` placeholders. A file without the adjusted column
//! uses the close.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::domain::error::PortoptError;
use crate::domain::price_bar::PriceBar;
use crate::ports::price_port::PricePort;

/// Parses every quote row in `reader`, ascending by date.
pub fn read_bars<R: Read>(
    reader: R,
    ticker: &str,
    source_name: &str,
) -> Result<Vec<PriceBar>, PortoptError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let parse_err = |line: u64, reason: String| PortoptError::CsvParse {
        source_name: source_name.to_string(),
        reason: format!("line {line}: {reason}"),
    };

    let mut bars = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| PortoptError::CsvParse {
            source_name: source_name.to_string(),
            reason: e.to_string(),
        })?;
        let line = record.position().map_or(0, |p| p.line());

        let Some(date) = record
            .get(0)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        else {
            continue;
        };
        if record.iter().any(|f| f.eq_ignore_ascii_case("null")) {
            continue;
        }
        if record.len() < 6 {
            return Err(parse_err(
                line,
                format!("expected at least 6 columns, found {}", record.len()),
            ));
        }

        let field = |idx: usize, name: &str| -> Result<f64, PortoptError> {
            let raw = record.get(idx).unwrap_or_default();
            raw.parse::<f64>()
                .map_err(|e| parse_err(line, format!("invalid {name} value {raw:?}: {e}")))
        };

        let open = field(1, "open")?;
        let high = field(2, "high")?;
        let low = field(3, "low")?;
        let close = field(4, "close")?;
        // Some exports write volume as a float.
        let volume = field(5, "volume")? as i64;
        let adj_close = if record.len() > 6 {
            field(6, "adj close")?
        } else {
            close
        };

        bars.push(PriceBar {
            ticker: ticker.to_string(),
            date,
            open,
            high,
            low,
            close,
            volume,
            adj_close,
        });
    }

    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    Ok(bars)
}

pub fn read_bars_from_path(path: &Path, ticker: &str) -> Result<Vec<PriceBar>, PortoptError> {
    let file = fs::File::open(path)?;
    read_bars(file, ticker, &path.display().to_string())
}

/// Serves prices from a directory holding one `<TICKER>.csv` per security.
pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }
}

impl PricePort for CsvAdapter {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, PortoptError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut bars = read_bars_from_path(&path, ticker)?;
        bars.retain(|b| b.date >= start && b.date <= end);
        Ok(bars)
    }

    fn list_tickers(&self) -> Result<Vec<String>, PortoptError> {
        let mut tickers = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    tickers.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        tickers.sort();
        Ok(tickers)
    }

    fn get_date_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PortoptError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Ok(None);
        }
        let bars = read_bars_from_path(&path, ticker)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}

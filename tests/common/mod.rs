#![allow(dead_code)]

use chrono::NaiveDate;
use portopt::domain::error::PortoptError;
pub use portopt::domain::price_bar::PriceBar;
use portopt::ports::price_port::PricePort;
use std::collections::HashMap;

pub struct MockPricePort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    fn check(&self, ticker: &str) -> Result<(), PortoptError> {
        match self.errors.get(ticker) {
            Some(reason) => Err(PortoptError::Database {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl PricePort for MockPricePort {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, PortoptError> {
        self.check(ticker)?;
        let mut bars: Vec<PriceBar> = self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_tickers(&self) -> Result<Vec<String>, PortoptError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }

    fn get_date_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PortoptError> {
        self.check(ticker)?;
        match self.data.get(ticker) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(ticker: &str, date: &str, adj_close: f64) -> PriceBar {
    PriceBar {
        ticker: ticker.to_string(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: adj_close,
        high: adj_close + 1.0,
        low: adj_close - 1.0,
        close: adj_close,
        volume: 1000,
        adj_close,
    }
}

/// Daily bars from `start`, compounding by `growth[i % growth.len()]` each
/// day.
pub fn generate_bars(
    ticker: &str,
    start: NaiveDate,
    days: usize,
    start_price: f64,
    growth: &[f64],
) -> Vec<PriceBar> {
    let mut price = start_price;
    (0..days)
        .map(|i| {
            let bar = PriceBar {
                ticker: ticker.to_string(),
                date: start + chrono::Duration::days(i as i64),
                open: price,
                high: price * 1.01,
                low: price * 0.99,
                close: price,
                volume: 1000,
                adj_close: price,
            };
            price *= 1.0 + growth[i % growth.len()];
            bar
        })
        .collect()
}

/// Three securities with distinct risk profiles over 2010-2014.
pub fn sample_port() -> MockPricePort {
    let start = date(2010, 1, 1);
    MockPricePort::new()
        .with_bars("SAFE", generate_bars("SAFE", start, 1500, 50.0, &[0.0002, 0.0001]))
        .with_bars(
            "GROWTH",
            generate_bars("GROWTH", start, 1500, 20.0, &[0.02, -0.015, 0.01, -0.012]),
        )
        .with_bars(
            "SWING",
            generate_bars("SWING", start, 1500, 30.0, &[-0.01, 0.012, 0.004, -0.003, 0.001]),
        )
}

pub fn tickers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

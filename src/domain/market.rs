//! Sampled securities and the session cache that owns them.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};

use crate::domain::date_range::DateRange;
use crate::domain::error::PortoptError;
use crate::domain::stats::{PeriodStats, StatsAccumulator, correlation};
use crate::ports::price_port::PricePort;

/// Samples needed before a security has at least one period return.
pub const MIN_SAMPLES: usize = 2;

/// One adjusted close per sample date over the security's effective range.
#[derive(Debug, Clone)]
pub struct Security {
    pub ticker: String,
    pub range: DateRange,
    prices: BTreeMap<NaiveDate, f64>,
    stats: PeriodStats,
}

impl Security {
    /// Samples `ticker` on the grid of `window`.
    ///
    /// Each sample takes the first usable bar in `[d, d + interval)`. Empty
    /// buckets before the first quote are skipped; the first empty bucket
    /// after that ends the series.
    pub fn load(
        port: &dyn PricePort,
        ticker: &str,
        window: &DateRange,
    ) -> Result<Self, PortoptError> {
        let bars = port.fetch_prices(ticker, window.start(), window.last_day())?;
        let interval = Duration::days(window.interval_days());

        let mut prices = BTreeMap::new();
        let mut acc = StatsAccumulator::new();
        let mut pos = 0;
        for sample_date in window.iter() {
            let bucket_end = sample_date
                .checked_add_signed(interval)
                .unwrap_or(NaiveDate::MAX);
            while pos < bars.len() && bars[pos].date < sample_date {
                pos += 1;
            }
            let hit = bars[pos..]
                .iter()
                .take_while(|b| b.date < bucket_end)
                .find(|b| b.is_usable());

            match hit {
                Some(bar) => {
                    prices.insert(sample_date, bar.adj_close);
                    acc.add(bar.adj_close);
                }
                None if prices.is_empty() => continue,
                None => break,
            }
        }

        let (first, last) = match (prices.keys().next(), prices.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(PortoptError::NoData {
                    ticker: ticker.to_string(),
                });
            }
        };
        if prices.len() < MIN_SAMPLES {
            return Err(PortoptError::InsufficientData {
                ticker: ticker.to_string(),
                samples: prices.len(),
                minimum: MIN_SAMPLES,
            });
        }

        if first > window.start() {
            eprintln!(
                "warning: {ticker}: no prices before {first}, window starts {}",
                window.start()
            );
        }
        if last < window.end() {
            eprintln!(
                "warning: {ticker}: price history stops at {last}, window ends {}",
                window.end()
            );
        }

        Ok(Self {
            ticker: ticker.to_string(),
            range: DateRange::new(first, last, window.interval_days()),
            stats: acc.finish(),
            prices,
        })
    }

    pub fn stats(&self) -> &PeriodStats {
        &self.stats
    }

    pub fn price_at(&self, date: NaiveDate) -> Option<f64> {
        self.prices.get(&date).copied()
    }

    pub fn sample_count(&self) -> usize {
        self.prices.len()
    }

    /// Period returns restricted to the samples inside `range`.
    fn returns_within(&self, range: &DateRange) -> Vec<f64> {
        if range.is_empty() {
            return Vec::new();
        }
        let prices: Vec<f64> = self
            .prices
            .range(range.start()..=range.end())
            .map(|(_, p)| *p)
            .collect();
        PeriodStats::from_prices(&prices).deltas().to_vec()
    }
}

/// Per-session cache of sampled securities and pairwise correlations.
pub struct MarketData<'a> {
    port: &'a dyn PricePort,
    window: DateRange,
    securities: HashMap<String, Security>,
    correlations: HashMap<(String, String), f64>,
}

impl<'a> MarketData<'a> {
    pub fn new(port: &'a dyn PricePort, window: DateRange) -> Self {
        Self {
            port,
            window,
            securities: HashMap::new(),
            correlations: HashMap::new(),
        }
    }

    pub fn window(&self) -> &DateRange {
        &self.window
    }

    pub fn security(&mut self, ticker: &str) -> Result<&Security, PortoptError> {
        self.ensure_loaded(ticker)?;
        self.securities
            .get(ticker)
            .ok_or_else(|| PortoptError::NoData {
                ticker: ticker.to_string(),
            })
    }

    pub fn stats(&mut self, ticker: &str) -> Result<PeriodStats, PortoptError> {
        Ok(self.security(ticker)?.stats().clone())
    }

    /// Correlation of period returns over the overlap of both histories.
    pub fn correlation(&mut self, a: &str, b: &str) -> Result<f64, PortoptError> {
        if a == b {
            return Ok(1.0);
        }
        let key = if a < b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        if let Some(rho) = self.correlations.get(&key) {
            return Ok(*rho);
        }

        self.ensure_loaded(a)?;
        self.ensure_loaded(b)?;
        let (sa, sb) = match (self.securities.get(a), self.securities.get(b)) {
            (Some(sa), Some(sb)) => (sa, sb),
            _ => {
                return Err(PortoptError::NoData {
                    ticker: format!("{a}/{b}"),
                });
            }
        };

        let overlap = sa.range.intersect(&sb.range)?;
        let ra = sa.returns_within(&overlap);
        let rb = sb.returns_within(&overlap);
        let rho = if ra.len() < MIN_SAMPLES || ra.len() != rb.len() {
            eprintln!("warning: {a} and {b} share too little history, treating as uncorrelated");
            0.0
        } else {
            correlation(&ra, &rb)
        };

        self.correlations.insert(key, rho);
        Ok(rho)
    }

    pub fn cached_securities(&self) -> usize {
        self.securities.len()
    }

    fn ensure_loaded(&mut self, ticker: &str) -> Result<(), PortoptError> {
        if !self.securities.contains_key(ticker) {
            let security = Security::load(self.port, ticker, &self.window)?;
            self.securities.insert(ticker.to_string(), security);
        }
        Ok(())
    }
}

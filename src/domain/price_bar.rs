//! Daily quote row as stored in the price cache.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    /// Close adjusted for splits and dividends. All return statistics use
    /// this column.
    pub adj_close: f64,
}

impl PriceBar {
    /// A bar can be sampled only with a positive, finite adjusted close;
    /// period returns divide by it.
    pub fn is_usable(&self) -> bool {
        self.adj_close.is_finite() && self.adj_close > 0.0
    }
}

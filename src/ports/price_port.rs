//! Price history access port.

use chrono::NaiveDate;

use crate::domain::error::PortoptError;
use crate::domain::price_bar::PriceBar;

pub trait PricePort {
    /// Bars for `ticker` with `start <= date <= end`, ascending by date.
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, PortoptError>;

    fn list_tickers(&self) -> Result<Vec<String>, PortoptError>;

    /// First date, last date and bar count stored for `ticker`.
    fn get_date_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PortoptError>;
}

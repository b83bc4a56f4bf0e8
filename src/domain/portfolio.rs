//! Weighted basket of tickers and its mean/variance evaluation.

use std::collections::BTreeMap;
use std::fmt;

use super::error::PortoptError;
use super::market::MarketData;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioStats {
    /// Weighted mean per-period return.
    pub expected_return: f64,
    /// Standard deviation of the weighted per-period return.
    pub risk: f64,
}

impl PortfolioStats {
    pub fn is_finite(&self) -> bool {
        self.expected_return.is_finite() && self.risk.is_finite()
    }
}

/// Ticker to weight. Weights need not sum to one; evaluation normalizes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Portfolio {
    weights: BTreeMap<String, f64>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equal_weight<S: AsRef<str>>(tickers: &[S]) -> Self {
        let mut p = Self::new();
        for t in tickers {
            p.add(t.as_ref(), 1.0);
        }
        p
    }

    /// Adds `weight` to the ticker's current weight. Negative totals clamp to
    /// zero.
    pub fn add(&mut self, ticker: &str, weight: f64) {
        let w = self.weights.entry(ticker.to_string()).or_insert(0.0);
        *w = (*w + weight).max(0.0);
    }

    pub fn set(&mut self, ticker: &str, weight: f64) {
        self.weights.insert(ticker.to_string(), weight.max(0.0));
    }

    pub fn weight(&self, ticker: &str) -> f64 {
        self.weights.get(ticker).copied().unwrap_or(0.0)
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weights scaled to sum to one, zero weights dropped.
    pub fn normalized(&self) -> Result<Vec<(&str, f64)>, PortoptError> {
        let total = self.total_weight();
        if total <= 0.0 {
            return Err(PortoptError::EmptyPortfolio);
        }
        Ok(self
            .weights
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(t, w)| (t.as_str(), w / total))
            .collect())
    }

    pub fn evaluate(&self, market: &mut MarketData<'_>) -> Result<PortfolioStats, PortoptError> {
        let weights = self.normalized()?;

        let mut sigmas = Vec::with_capacity(weights.len());
        let mut expected_return = 0.0;
        for (ticker, w) in &weights {
            let stats = market.stats(ticker)?;
            expected_return += w * stats.per_period_return;
            sigmas.push(stats.stddev);
        }

        let mut variance = 0.0;
        for (i, (ti, wi)) in weights.iter().enumerate() {
            for (j, (tj, wj)) in weights.iter().enumerate() {
                let rho = market.correlation(ti, tj)?;
                variance += wi * wj * rho * sigmas[i] * sigmas[j];
            }
        }

        Ok(PortfolioStats {
            expected_return,
            risk: variance.max(0.0).sqrt(),
        })
    }
}

impl fmt::Display for Portfolio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.total_weight();
        let mut first = true;
        for (ticker, w) in &self.weights {
            if *w <= 0.0 {
                continue;
            }
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "{ticker}:{:.4}", w / total)?;
        }
        Ok(())
    }
}

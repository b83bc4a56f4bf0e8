//! Random-walk search that feeds candidate portfolios into a frontier.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::PortoptError;
use super::frontier::Frontier;
use super::market::MarketData;
use super::portfolio::Portfolio;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub iterations: usize,
    pub seed: u64,
    /// Largest change applied to one normalized weight per mutation.
    pub max_step: f64,
    /// Extra mutations spent around a candidate that raised the best return.
    pub extra_effort: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            seed: 0,
            max_step: 0.5,
            extra_effort: 20,
        }
    }
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub frontier: Frontier<Portfolio>,
    pub evaluated: usize,
    pub accepted: usize,
    pub skipped: usize,
}

struct Walk<'m, 'p> {
    market: &'m mut MarketData<'p>,
    tickers: &'m [String],
    config: &'m SearchConfig,
    rng: StdRng,
    outcome: SearchOutcome,
}

impl Walk<'_, '_> {
    fn pick_parent(&mut self, fallback: &Portfolio) -> Portfolio {
        let len = self.outcome.frontier.len();
        if len == 0 {
            return fallback.clone();
        }
        let i = self.rng.gen_range(0..len);
        self.outcome
            .frontier
            .iter()
            .nth(i)
            .map(|p| p.payload.clone())
            .unwrap_or_else(|| fallback.clone())
    }

    fn mutate(&mut self, parent: &Portfolio) -> Result<Portfolio, PortoptError> {
        let tickers = self.tickers;
        let ticker = &tickers[self.rng.gen_range(0..tickers.len())];
        let step = self.rng.gen_range(-self.config.max_step..=self.config.max_step);

        let mut child = parent.clone();
        let before = child.weight(ticker);
        child.set(ticker, before + step);
        if child.total_weight() <= 0.0 {
            child.set(ticker, self.config.max_step);
        }
        normalize(&child)
    }

    /// Evaluates and offers `candidate`. Returns true when it raised the
    /// best known return.
    fn offer(&mut self, candidate: Portfolio) -> Result<bool, PortoptError> {
        let stats = candidate.evaluate(&mut *self.market)?;
        self.outcome.evaluated += 1;
        if !stats.is_finite() {
            self.outcome.skipped += 1;
            return Ok(false);
        }

        let best = self.outcome.frontier.max_x();
        if self
            .outcome
            .frontier
            .insert(stats.expected_return, stats.risk, candidate)
        {
            self.outcome.accepted += 1;
            return Ok(best.is_none_or(|b| stats.expected_return > b));
        }
        Ok(false)
    }
}

fn normalize(portfolio: &Portfolio) -> Result<Portfolio, PortoptError> {
    let mut out = Portfolio::new();
    for (ticker, w) in portfolio.normalized()? {
        out.set(ticker, w);
    }
    Ok(out)
}

/// Explores weightings of `tickers` starting from the equal-weight mix.
pub fn search(
    market: &mut MarketData<'_>,
    tickers: &[String],
    config: &SearchConfig,
) -> Result<SearchOutcome, PortoptError> {
    if tickers.is_empty() {
        return Err(PortoptError::EmptyPortfolio);
    }

    let seed = normalize(&Portfolio::equal_weight(tickers))?;
    let mut walk = Walk {
        market,
        tickers,
        config,
        rng: StdRng::seed_from_u64(config.seed),
        outcome: SearchOutcome {
            frontier: Frontier::new(),
            evaluated: 0,
            accepted: 0,
            skipped: 0,
        },
    };

    walk.offer(seed.clone())?;
    for _ in 0..config.iterations {
        let parent = walk.pick_parent(&seed);
        let child = walk.mutate(&parent)?;
        if walk.offer(child.clone())? {
            for _ in 0..config.extra_effort {
                let next = walk.mutate(&child)?;
                walk.offer(next)?;
            }
        }
    }

    Ok(walk.outcome)
}

//! Per-period return statistics over a sampled price series.

/// Collects prices in sample order.
#[derive(Debug, Default, Clone)]
pub struct StatsAccumulator {
    prices: Vec<f64>,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, price: f64) {
        self.prices.push(price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn finish(self) -> PeriodStats {
        PeriodStats::from_prices(&self.prices)
    }
}

/// Summary of the relative change between consecutive samples.
///
/// `deltas[i]` is the return over period `i + 1`. Period 0 has no predecessor
/// and contributes nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeriodStats {
    deltas: Vec<f64>,
    pub per_period_return: f64,
    pub stddev: f64,
}

impl PeriodStats {
    pub fn from_prices(prices: &[f64]) -> Self {
        if prices.len() < 2 {
            return Self::default();
        }

        let deltas: Vec<f64> = prices.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
        let n = deltas.len() as f64;
        let mean = deltas.iter().sum::<f64>() / n;
        let variance = deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

        Self {
            deltas,
            per_period_return: mean,
            stddev: variance.sqrt(),
        }
    }

    pub fn delta_for_period(&self, period: usize) -> f64 {
        if period == 0 {
            return 0.0;
        }
        self.deltas.get(period - 1).copied().unwrap_or(0.0)
    }

    pub fn deltas(&self) -> &[f64] {
        &self.deltas
    }

    pub fn periods(&self) -> usize {
        self.deltas.len()
    }
}

/// Pearson correlation of two equally long series.
///
/// Returns 0 when either side is flat or the series are shorter than two
/// samples.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "correlation() on series of different length");
    let n = a.len();
    if n < 2 {
        return 0.0;
    }

    let nf = n as f64;
    let mean_a = a.iter().sum::<f64>() / nf;
    let mean_b = b.iter().sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    (cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0)
}

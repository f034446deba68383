//! Technical indicators over bar series

/// Exponential moving average seeded with the first price
///
/// Empty when there are fewer than `period` prices.
pub fn ema(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(prices.len());
    let mut prev = prices[0];
    out.push(prev);
    for price in &prices[1..] {
        prev = price * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

/// Relative strength index over the last `period` changes
///
/// 50 when there is not enough data, 100 when there were no losses.
pub fn rsi(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return 50.0;
    }

    let recent = &prices[prices.len() - period - 1..];
    let (gains, losses) = recent
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), delta| {
            if delta > 0.0 {
                (g + delta, l)
            } else {
                (g, l - delta)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// Values that are the maximum of their ±`window` neighbourhood
pub fn swing_highs(highs: &[f64], window: usize) -> Vec<f64> {
    swings(highs, window, |candidate, other| candidate >= other)
}

/// Values that are the minimum of their ±`window` neighbourhood
pub fn swing_lows(lows: &[f64], window: usize) -> Vec<f64> {
    swings(lows, window, |candidate, other| candidate <= other)
}

fn swings(values: &[f64], window: usize, dominates: impl Fn(f64, f64) -> bool) -> Vec<f64> {
    if values.len() < window * 2 + 1 {
        return Vec::new();
    }
    (window..values.len() - window)
        .filter(|&i| {
            (i - window..=i + window)
                .filter(|&j| j != i)
                .all(|j| dominates(values[i], values[j]))
        })
        .map(|i| values[i])
        .collect()
}

/// Volume-weighted average price
pub fn vwap(prices: &[f64], volumes: &[f64]) -> Option<f64> {
    let total: f64 = volumes.iter().sum();
    if total <= 0.0 || prices.len() != volumes.len() {
        return None;
    }
    Some(prices.iter().zip(volumes).map(|(p, v)| p * v).sum::<f64>() / total)
}

/// Price level with the most volume across `buckets` evenly spaced levels
///
/// Volume counts toward a level when its price lies within 1/20 of the
/// range. None when the range is flat.
pub fn volume_poc(prices: &[f64], volumes: &[f64], buckets: usize) -> Option<f64> {
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if buckets < 2 || !range.is_finite() || range <= 0.0 {
        return None;
    }

    let step = range / (buckets - 1) as f64;
    let tolerance = range / 20.0;

    let mut best: Option<(f64, f64)> = None;
    for i in 0..buckets {
        let level = min + step * i as f64;
        let volume: f64 = prices
            .iter()
            .zip(volumes)
            .filter(|(p, _)| (*p - level).abs() < tolerance)
            .map(|(_, v)| v)
            .sum();
        // First level wins ties
        if best.map_or(true, |(_, v)| volume > v) {
            best = Some((level, volume));
        }
    }
    best.map(|(level, _)| level)
}

//! Descriptive statistics over a price window

use serde::Serialize;

/// Min/max/mean of a non-empty price sequence.
///
/// There is deliberately no "empty" value: an empty window is represented
/// by `None` at the call site, never by zeroed fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Compute window statistics, or None when the sequence is empty
pub fn compute(prices: &[f64]) -> Option<WindowStats> {
    if prices.is_empty() {
        return None;
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;

    for &p in prices {
        if p < min {
            min = p;
        }
        if p > max {
            max = p;
        }
        sum += p;
    }

    Some(WindowStats {
        min,
        max,
        mean: sum / prices.len() as f64,
    })
}

/// Sample variance (n-1 denominator); 0.0 for a single value, None when empty
pub fn sample_variance(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    if prices.len() == 1 {
        return Some(0.0);
    }

    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    let sum_sq: f64 = prices.iter().map(|p| (p - mean) * (p - mean)).sum();
    Some(sum_sq / (prices.len() - 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_mean_max_ordering() {
        let stats = compute(&[80.0, 85.0, 90.0, 78.0]).unwrap();
        assert_eq!(stats.min, 78.0);
        assert_eq!(stats.max, 90.0);
        assert!(stats.min <= stats.mean && stats.mean <= stats.max);
        assert!((stats.mean - 83.25).abs() < 1e-9);
    }

    #[test]
    fn test_empty_window_is_none_not_zero() {
        assert!(compute(&[]).is_none());
        assert!(sample_variance(&[]).is_none());
    }

    #[test]
    fn test_single_observation() {
        let stats = compute(&[42.5]).unwrap();
        assert_eq!(stats.min, 42.5);
        assert_eq!(stats.max, 42.5);
        assert_eq!(stats.mean, 42.5);
        assert_eq!(sample_variance(&[42.5]), Some(0.0));
    }

    #[test]
    fn test_sample_variance_uses_n_minus_one() {
        // [50, 55, 48]: mean 51, squared deviations 1 + 16 + 9 = 26, / 2 = 13
        let var = sample_variance(&[50.0, 55.0, 48.0]).unwrap();
        assert!((var - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_prices_kept() {
        let stats = compute(&[10.0, 10.0, 10.0]).unwrap();
        assert_eq!(stats.mean, 10.0);
        assert_eq!(sample_variance(&[10.0, 10.0, 10.0]), Some(0.0));
    }
}

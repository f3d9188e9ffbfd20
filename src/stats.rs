//! Peer-group statistics shared by the detectors

/// Continuous percentile with linear interpolation between closest ranks.
///
/// `fraction` is in `[0, 1]`. Input need not be sorted. Empty input gives 0.
pub fn percentile_cont(values: &[f64], fraction: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, fraction)
}

/// `percentile_cont` over an already sorted slice
pub fn percentile_sorted(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let fraction = fraction.clamp(0.0, 1.0);
    let rank = fraction * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let weight = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * weight
}

pub fn median(values: &[f64]) -> f64 {
    percentile_cont(values, 0.5)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Ratio that reports 0 instead of dividing by zero
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let values = [1000.0, 1000.0, 1000.0, 1000.0, 1001.0];
        let p99 = percentile_cont(&values, 0.99);
        assert!((p99 - 1000.96).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_uniform_group() {
        assert_eq!(percentile_cont(&[1000.0; 5], 0.99), 1000.0);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_safe_ratio() {
        assert_eq!(safe_ratio(5.0, 0.0), 0.0);
        assert_eq!(safe_ratio(5.0, 2.0), 2.5);
    }
}

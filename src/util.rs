/// Arithmetic grid [start, stop) with the given step, like the numeric
/// ranges the engines sweep over.
pub(crate) fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    assert!(step > 0.0, "grid step must be positive");
    let mut grid = Vec::new();
    let mut value = start;
    while value < stop {
        grid.push(value);
        value += step;
    }
    grid
}

/// Round to a fixed number of decimals.
pub(crate) fn round_decimals(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod util_tests {
    use super::*;

    #[test]
    fn test_arange() {
        assert_eq!(arange(0.0, 1.0, 0.5), vec![0.0, 0.5]);
        assert_eq!(arange(57.0, 85.0, 3.0).len(), 10);
        assert!(arange(5.0, 5.0, 1.0).is_empty());
    }

    #[test]
    fn test_round_decimals() {
        assert_eq!(round_decimals(1.2345, 2), 1.23);
        assert_eq!(round_decimals(1.25, 1), 1.3);
    }
}

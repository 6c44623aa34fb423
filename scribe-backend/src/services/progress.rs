//! Weighted progress aggregation

/// Combine per-stage progress into one overall percentage
///
/// `parts` is an ordered list of `(weight, progress)` with weights summing to
/// 1.0 and progress in 0..=100. Returns `floor(Σ weight × progress)` clamped
/// to 0..=100; an empty list yields 0.
pub fn aggregate(parts: &[(f64, u8)]) -> u8 {
    if parts.is_empty() {
        return 0;
    }

    let total: f64 = parts
        .iter()
        .map(|(weight, progress)| weight * f64::from((*progress).min(100)))
        .sum();

    // 1e-9 absorbs float error such as 0.7 * 100.0 landing just under 70
    (total + 1e-9).floor().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_sum_is_floored() {
        assert_eq!(aggregate(&[(0.7, 100), (0.3, 50)]), 85);
        assert_eq!(aggregate(&[(0.7, 33), (0.3, 0)]), 23); // 23.1
        assert_eq!(aggregate(&[(0.5, 1), (0.5, 0)]), 0); // 0.5
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(aggregate(&[]), 0);
    }

    #[test]
    fn single_stage_passes_through() {
        for p in [0u8, 1, 50, 99, 100] {
            assert_eq!(aggregate(&[(1.0, p)]), p);
        }
    }

    #[test]
    fn result_stays_in_range() {
        assert_eq!(aggregate(&[(0.7, 255), (0.3, 255)]), 100);
        assert_eq!(aggregate(&[(1.5, 100)]), 100);
        assert_eq!(aggregate(&[(-1.0, 100)]), 0);
    }

    #[test]
    fn all_complete_reaches_exactly_100() {
        assert_eq!(aggregate(&[(0.7, 100), (0.3, 100)]), 100);
        assert_eq!(aggregate(&[(0.1, 100), (0.2, 100), (0.3, 100), (0.4, 100)]), 100);
    }

    #[test]
    fn input_is_untouched() {
        let parts = vec![(0.7, 40), (0.3, 60)];
        let before = parts.clone();
        let first = aggregate(&parts);
        assert_eq!(parts, before);
        assert_eq!(aggregate(&parts), first);
    }
}

// Cohort statistics behind the bonus/penalty term.

/// Mean and standard deviation of one game's raw results.
#[derive(Debug, Clone, Copy)]
pub struct CohortStats {
    pub mean: f64,
    pub stdev: f64,
}

/// Threshold below which standard deviation is treated as zero.
const STDEV_EPSILON: f64 = 1e-9;

/// Compute mean and standard deviation for a slice of values.
///
/// Returns `CohortStats { mean: 0.0, stdev: 0.0 }` for an empty slice.
/// Uses the population standard deviation (N denominator): the cohort is
/// every player of the game, not a sample of them.
pub fn compute_cohort_stats(values: &[f64]) -> CohortStats {
    if values.is_empty() {
        return CohortStats {
            mean: 0.0,
            stdev: 0.0,
        };
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    CohortStats {
        mean,
        stdev: variance.sqrt(),
    }
}

/// Number of standard deviations `value` sits above (or below) the mean.
///
/// A cohort with no spread (a single player, or everyone on the same score)
/// yields 0.0: nobody earns a bonus or a penalty.
pub fn deviations_from_mean(value: f64, stats: &CohortStats) -> f64 {
    if stats.stdev < STDEV_EPSILON {
        return 0.0;
    }
    (value - stats.mean) / stats.stdev
}

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Base seed for all random streams, set per iteration when scenarios are repeated
pub static RAND_SEED: AtomicU64 = AtomicU64::new(0);

/// When set, every selection decision is logged with its full trace
pub static VERBOSE_SELECTION: AtomicBool = AtomicBool::new(false);

/// Number of rotation runs executed since the counter was last reset
pub static TOTAL_ROTATION_RUNS: AtomicUsize = AtomicUsize::new(0);

/// Seed for one random stream, offset from the current base seed
pub fn get_seed(offset: u64) -> u64 {
    RAND_SEED.load(Ordering::Relaxed).wrapping_add(offset)
}

/// Relative difference between two shares in percent of the expected one
pub fn share_diff_pct(observed: f64, expected: f64) -> f64 {
    if expected > 0.0 {
        (observed - expected).abs() / expected * 100.0
    } else {
        observed.abs() * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_diff_pct() {
        assert!((share_diff_pct(0.55, 0.5) - 10.0).abs() < 1e-9);
        assert!((share_diff_pct(0.45, 0.5) - 10.0).abs() < 1e-9);
        assert_eq!(share_diff_pct(0.0, 0.0), 0.0);
    }
}

use rand::Rng;

/// Allowed distance of the probability total from 1.0
pub const PROBABILITY_TOLERANCE: f64 = 1e-5;

/// Source of uniform random draws in `[0, 1)`
///
/// Every `rand` generator is a source; [`FixedDraws`] replays a predetermined sequence.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl<R: Rng> RandomSource for R {
    fn next_unit(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Replays the given draws in order, wrapping around at the end
#[derive(Debug, Clone)]
pub struct FixedDraws {
    draws: Vec<f64>,
    next: usize,
}

impl FixedDraws {
    /// # Panics
    /// If `draws` is empty or any draw lies outside `[0, 1)`
    pub fn new(draws: Vec<f64>) -> Self {
        assert!(!draws.is_empty(), "FixedDraws needs at least one draw");
        assert!(
            draws.iter().all(|d| (0.0..1.0).contains(d)),
            "draws must lie in [0, 1): {:?}",
            draws
        );
        Self { draws, next: 0 }
    }
}

impl RandomSource for FixedDraws {
    fn next_unit(&mut self) -> f64 {
        let draw = self.draws[self.next];
        self.next = (self.next + 1) % self.draws.len();
        draw
    }
}

/// Pick one item from `(item, probability)` pairs using a single draw from `random`.
///
/// Returns `None` only for empty input. Probabilities must sum to 1, see [`pick_at`].
pub fn pick<'a, T>(entries: &'a [(T, f64)], random: &mut dyn RandomSource) -> Option<&'a T> {
    if entries.is_empty() {
        return None;
    }
    pick_at(entries, random.next_unit())
}

/// Inverse-CDF pick for a known draw in `[0, 1)`.
///
/// Walks the entries in slice order accumulating probability and returns the first entry whose
/// cumulative probability reaches `draw`. If rounding leaves the final cumulative sum just under
/// `draw`, the last entry is returned.
///
/// # Panics
/// If the probabilities do not sum to 1 within [`PROBABILITY_TOLERANCE`]. That means the caller
/// normalized its weights wrongly.
pub fn pick_at<T>(entries: &[(T, f64)], draw: f64) -> Option<&T> {
    let (last, _) = entries.last()?;

    let total: f64 = entries.iter().map(|(_, probability)| probability).sum();
    assert!(
        (total - 1.0).abs() <= PROBABILITY_TOLERANCE,
        "probabilities must sum to 1, got {}",
        total
    );
    debug_assert!((0.0..1.0).contains(&draw), "draw {} outside [0, 1)", draw);

    let mut cumulative = 0.0;
    for (item, probability) in entries {
        cumulative += probability;
        if draw <= cumulative {
            return Some(item);
        }
    }
    Some(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_empty_input_picks_nothing() {
        let entries: Vec<(&str, f64)> = Vec::new();
        let mut draws = FixedDraws::new(vec![0.5]);
        assert_eq!(pick(&entries, &mut draws), None);
    }

    #[test]
    fn test_weighted_boundary_ten_to_one() {
        let entries = vec![("heavy", 10.0 / 11.0), ("light", 1.0 / 11.0)];
        assert_eq!(pick_at(&entries, 0.0), Some(&"heavy"));
        assert_eq!(pick_at(&entries, 0.5), Some(&"heavy"));
        assert_eq!(pick_at(&entries, 10.0 / 11.0), Some(&"heavy"));
        assert_eq!(pick_at(&entries, 0.9091), Some(&"light"));
        assert_eq!(pick_at(&entries, 0.999_999), Some(&"light"));
    }

    #[test]
    fn test_single_entry_always_picked() {
        let entries = vec![(42, 1.0)];
        for draw in [0.0, 0.25, 0.5, 0.75, 0.999_999_9] {
            assert_eq!(pick_at(&entries, draw), Some(&42));
        }
    }

    #[test]
    fn test_undershoot_falls_back_to_last_entry() {
        // Sums to 0.999999, the draw lies above every cumulative boundary
        let entries = vec![("first", 0.5), ("last", 0.499_999)];
        assert_eq!(pick_at(&entries, 0.999_999_5), Some(&"last"));
    }

    #[test]
    #[should_panic(expected = "probabilities must sum to 1")]
    fn test_unnormalized_input_panics() {
        let entries = vec![("a", 0.5), ("b", 0.3)];
        pick_at(&entries, 0.1);
    }

    #[test]
    #[should_panic(expected = "probabilities must sum to 1")]
    fn test_raw_weights_panic() {
        let entries = vec![("a", 10.0), ("b", 1.0)];
        let mut draws = FixedDraws::new(vec![0.1]);
        pick(&entries, &mut draws);
    }

    #[test]
    fn test_zero_probability_entry_is_skipped() {
        let entries = vec![("never", 0.0), ("always", 1.0)];
        assert_eq!(pick_at(&entries, 0.3), Some(&"always"));
    }

    #[test]
    fn test_fixed_draws_wrap_around() {
        let mut draws = FixedDraws::new(vec![0.1, 0.9]);
        assert_eq!(draws.next_unit(), 0.1);
        assert_eq!(draws.next_unit(), 0.9);
        assert_eq!(draws.next_unit(), 0.1);
    }

    #[test]
    #[should_panic(expected = "draws must lie in [0, 1)")]
    fn test_fixed_draws_reject_one() {
        FixedDraws::new(vec![1.0]);
    }

    #[test]
    fn test_rng_source_stays_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let draw = rng.next_unit();
            assert!((0.0..1.0).contains(&draw));
        }
    }

    #[test]
    fn test_seeded_frequencies_follow_probabilities() {
        let entries = vec![(0usize, 0.6), (1usize, 0.3), (2usize, 0.1)];
        let mut rng = StdRng::seed_from_u64(2024);
        let mut counts = [0usize; 3];
        let draws = 100_000;
        for _ in 0..draws {
            let picked = pick(&entries, &mut rng).unwrap();
            counts[*picked] += 1;
        }
        for (index, (_, probability)) in entries.iter().enumerate() {
            let share = counts[index] as f64 / draws as f64;
            assert!((share - probability).abs() < 0.01, "item {} share {:.4} vs {:.4}", index, share, probability);
        }
    }
}

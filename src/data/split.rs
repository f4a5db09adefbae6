//! Deterministic train/validation splitting
//!
//! Event selections are split once, before any loop begins, with a fixed
//! seed so that repeated runs against the same database see the same split.

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

/// Fraction of a selection held out for validation
pub const VALIDATION_FRACTION: f64 = 0.33;

/// Seed used for every split
pub const SPLIT_SEED: u64 = 42;

/// Split a selection of event numbers into (training, validation) subsets.
///
/// The selection is shuffled with a seeded RNG and then cut, so the split
/// is deterministic for a given `(selection, fraction, seed)` triple. The
/// validation subset receives `ceil(len * validation_fraction)` events.
pub fn train_validation_split(
    selection: &[i64],
    validation_fraction: f64,
    seed: u64,
) -> (Vec<i64>, Vec<i64>) {
    let mut shuffled = selection.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let n_validation = (shuffled.len() as f64 * validation_fraction).ceil() as usize;
    let validation = shuffled.split_off(shuffled.len() - n_validation);
    (shuffled, validation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let selection: Vec<i64> = (0..100).collect();
        let (train, valid) = train_validation_split(&selection, VALIDATION_FRACTION, SPLIT_SEED);

        assert_eq!(valid.len(), 33);
        assert_eq!(train.len(), 67);
    }

    #[test]
    fn test_split_is_deterministic() {
        let selection: Vec<i64> = (0..50).collect();
        let first = train_validation_split(&selection, VALIDATION_FRACTION, SPLIT_SEED);
        let second = train_validation_split(&selection, VALIDATION_FRACTION, SPLIT_SEED);

        assert_eq!(first, second);
    }

    #[test]
    fn test_split_is_a_partition() {
        let selection: Vec<i64> = (0..40).collect();
        let (train, valid) = train_validation_split(&selection, VALIDATION_FRACTION, SPLIT_SEED);

        let mut all: Vec<i64> = train.iter().chain(valid.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, selection);
    }

    #[test]
    fn test_different_seeds_differ() {
        let selection: Vec<i64> = (0..100).collect();
        let (train_a, _) = train_validation_split(&selection, VALIDATION_FRACTION, 1);
        let (train_b, _) = train_validation_split(&selection, VALIDATION_FRACTION, 2);

        assert_ne!(train_a, train_b);
    }
}

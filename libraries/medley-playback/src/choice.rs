//! Random index pickers for section selection
//!
//! Pure functions over a caller-supplied rng so tests can seed them.
//! Entity code passes `thread_rng()`.

use rand::Rng;

/// Pick an index with probability proportional to its weight.
///
/// Returns `None` for an empty slice. If every weight is zero the pick
/// falls back to a uniform random index. Otherwise a draw `r` is taken
/// uniformly from `[0, sum)` and the result is the first index whose
/// cumulative sum reaches or exceeds `r`. The `>=` tie-break is
/// deliberate: it keeps picks reproducible under a seeded rng.
pub fn pick_weighted<R: Rng + ?Sized>(rng: &mut R, weights: &[f32]) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }

    let sum: f32 = weights.iter().sum();
    if sum <= 0.0 {
        return pick_uniform(rng, weights.len());
    }

    let draw = rng.gen_range(0.0..sum);
    let mut accumulated = 0.0;
    for (index, weight) in weights.iter().enumerate() {
        accumulated += weight;
        if accumulated >= draw {
            return Some(index);
        }
    }

    // Float rounding can leave the accumulated total a hair under `sum`
    Some(weights.len() - 1)
}

/// Pick an index uniformly from `0..len`.
///
/// Returns `None` when `len` is zero.
pub fn pick_uniform<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Option<usize> {
    if len == 0 {
        None
    } else {
        Some(rng.gen_range(0..len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn empty_weights_yield_none() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_weighted(&mut rng, &[]), None);
        assert_eq!(pick_uniform(&mut rng, 0), None);
    }

    #[test]
    fn picks_are_always_in_range() {
        let mut rng = StdRng::seed_from_u64(2);
        let weights = [0.5, 2.0, 0.0, 1.25];

        for _ in 0..1000 {
            let index = pick_weighted(&mut rng, &weights).unwrap();
            assert!(index < weights.len());
        }
    }

    #[test]
    fn zero_weight_entries_are_skipped() {
        let mut rng = StdRng::seed_from_u64(3);
        let weights = [1.0, 0.0, 1.0, 0.0];

        for _ in 0..2000 {
            let index = pick_weighted(&mut rng, &weights).unwrap();
            assert!(index == 0 || index == 2, "picked zero-weight index {}", index);
        }
    }

    #[test]
    fn sampling_converges_to_weight_proportions() {
        let mut rng = StdRng::seed_from_u64(4);
        let weights = [1.0, 3.0];
        let mut counts = [0u32; 2];

        let trials = 20_000;
        for _ in 0..trials {
            counts[pick_weighted(&mut rng, &weights).unwrap()] += 1;
        }

        // Expect roughly 25% / 75% with a generous tolerance
        let first_share = f64::from(counts[0]) / f64::from(trials);
        assert!(
            (first_share - 0.25).abs() < 0.03,
            "weight-1 share was {}",
            first_share
        );
    }

    #[test]
    fn all_zero_weights_fall_back_to_uniform() {
        let mut rng = StdRng::seed_from_u64(5);
        let weights = [0.0, 0.0, 0.0];
        let mut counts = [0u32; 3];

        let trials = 9_000;
        for _ in 0..trials {
            counts[pick_weighted(&mut rng, &weights).unwrap()] += 1;
        }

        for (index, &count) in counts.iter().enumerate() {
            let share = f64::from(count) / f64::from(trials);
            assert!(
                (share - 1.0 / 3.0).abs() < 0.04,
                "index {} share was {}",
                index,
                share
            );
        }
    }

    #[test]
    fn seeded_picks_are_reproducible() {
        let weights = [1.0, 2.0, 4.0, 0.5];

        let picks_a: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..50).map(|_| pick_weighted(&mut rng, &weights)).collect()
        };
        let picks_b: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..50).map(|_| pick_weighted(&mut rng, &weights)).collect()
        };

        assert_eq!(picks_a, picks_b);
    }

    #[test]
    fn uniform_pick_covers_all_indices() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut seen = [false; 5];

        for _ in 0..500 {
            seen[pick_uniform(&mut rng, 5).unwrap()] = true;
        }

        assert!(seen.iter().all(|&s| s));
    }
}

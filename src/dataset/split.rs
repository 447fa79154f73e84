//! Random train/validation partitioning.

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

/// Split options shared by every dataset variant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitOptions {
    /// Fraction of samples that go to the train subset. Must be `> 0`.
    pub train_percent: f64,
    /// Fixed shuffle seed. `None` draws a fresh permutation every run.
    pub seed: Option<u64>,
}

impl SplitOptions {
    pub fn new(train_percent: f64) -> Self {
        Self {
            train_percent,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self::new(0.8)
    }
}

/// A partition of samples into two disjoint subsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitPlan<T> {
    pub train: Vec<T>,
    pub val: Vec<T>,
}

/// Number of train samples for `total` items: `floor(total * train_percent)`.
pub fn train_count(total: usize, train_percent: f64) -> usize {
    let raw = (total as f64 * train_percent).floor();
    if raw <= 0.0 {
        0
    } else {
        (raw as usize).min(total)
    }
}

/// Shuffle `items` and cut them at [`train_count`].
///
/// The first slice of the shuffled order becomes the train subset and the
/// remainder the validation subset.
pub fn split_samples<T>(mut items: Vec<T>, opts: &SplitOptions) -> SplitPlan<T> {
    shuffle(&mut items, opts.seed);
    let cut = train_count(items.len(), opts.train_percent);
    let val = items.split_off(cut);
    SplitPlan { train: items, val }
}

fn shuffle<T>(items: &mut [T], seed: Option<u64>) {
    if let Some(seed) = seed {
        let mut rng = StdRng::seed_from_u64(seed);
        items.shuffle(&mut rng);
    } else {
        let mut rng = rand::rng();
        items.shuffle(&mut rng);
    }
}

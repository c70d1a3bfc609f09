//! A seeded pseudo-random source owned by a temporal memory instance.
//!
//! All tie-breaking and subsampling decisions draw from one stream, in a fixed order, so two
//! instances built with the same seed and fed the same inputs make identical choices. The
//! generator is ChaCha20, whose output is stable across platforms and whose stream position can
//! be captured and restored, which makes the state persistable.

use rand::{seq::index, seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Deterministic random source with the handful of draws the algorithm needs.
#[derive(Debug, Clone)]
pub struct Random {
    rng: ChaCha20Rng,
    seed: u64,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Returns the seed this source was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns a uniform index in `[0, len)`. `len` must be positive.
    #[inline]
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }

    /// Chooses `amount` distinct items uniformly without replacement.
    ///
    /// The chosen items keep their relative order from `items`. When `amount` covers every item,
    /// all items are returned and no randomness is consumed.
    pub fn sample<T: Copy>(&mut self, items: &[T], amount: usize) -> Vec<T> {
        if amount == 0 {
            return Vec::new();
        }

        if amount >= items.len() {
            return items.to_vec();
        }

        let mut picked = index::sample(&mut self.rng, items.len(), amount).into_vec();
        picked.sort_unstable();
        picked.into_iter().map(|i| items[i]).collect()
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

impl PartialEq for Random {
    fn eq(&self, other: &Self) -> bool {
        self.seed == other.seed && self.rng.get_word_pos() == other.rng.get_word_pos()
    }
}

/// Serialized form: the seed plus the position in the ChaCha stream.
#[derive(Serialize, Deserialize)]
struct RandomState {
    seed: u64,
    word_pos: u128,
}

impl Serialize for Random {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        RandomState {
            seed: self.seed,
            word_pos: self.rng.get_word_pos(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Random {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let state = RandomState::deserialize(deserializer)?;
        let mut rng = ChaCha20Rng::seed_from_u64(state.seed);
        rng.set_word_pos(state.word_pos);
        Ok(Random {
            rng,
            seed: state.seed,
        })
    }
}

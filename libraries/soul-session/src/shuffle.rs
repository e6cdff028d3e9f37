//! Shuffle helpers
//!
//! The Queue Store never reorders itself when the shuffle flag changes; the
//! dispatcher shuffles the data here and hands the result over.

use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

/// Fisher-Yates shuffle with the thread-local RNG
pub fn shuffle<T>(items: &mut [T]) {
    shuffle_with(items, &mut thread_rng());
}

/// Fisher-Yates shuffle with a caller-supplied RNG (deterministic in tests)
pub fn shuffle_with<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    items.shuffle(rng);
}

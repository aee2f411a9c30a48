//! Stacking of word vectors into a matrix.

use std::collections::HashSet;

use ndarray::{Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use tracing::warn;

use crate::embedder::Embedder;
use crate::error::Result;
use crate::util::l2_normalize;

/// Seed of the default initialization of unknown words.
pub const DEFAULT_SEED: u64 = 2018;

/// Stack the vectors of `words` into a matrix.
///
/// When `words` is `None`, the full vocabulary is stacked in index
/// order. Duplicate words are stacked once, at their first
/// occurrence. Rows of words that are not in the vocabulary are
/// uniform `[0, 1)` samples from a generator seeded with `seed`,
/// normalized to unit length.
pub fn stack_vectors(embedder: &mut Embedder, words: Option<&[&str]>, seed: u64) -> Result<Array2<f32>> {
    let words = match words {
        Some(words) => dedup(words),
        None => {
            let vocab: Vec<&str> = embedder.words().iter().map(String::as_str).collect();
            dedup(&vocab)
        }
    };

    let mut rng = XorShiftRng::seed_from_u64(seed);
    let mut matrix = Array2::from_shape_fn((words.len(), embedder.dim()), |_| rng.gen_range(0f32..1f32));

    for (word, mut row) in words.iter().zip(matrix.axis_iter_mut(Axis(0))) {
        match embedder.lookup_by_word(word) {
            Ok(embedding) => row.assign(&embedding),
            Err(err) if err.is_oov() => {
                l2_normalize(row);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(matrix)
}

fn dedup(words: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(words.len());
    let mut duplicates = Vec::new();

    for &word in words {
        if seen.insert(word) {
            unique.push(word.to_owned());
        } else {
            duplicates.push(word);
        }
    }

    if !duplicates.is_empty() {
        warn!(?duplicates, "removed duplicate words");
    }

    unique
}

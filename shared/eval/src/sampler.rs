use egret_data_provider::{EvalDataset, Sample};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::EvalError;

const SUBSET_STREAM: u8 = 0;
const DEMO_STREAM: u8 = 1;

fn chacha_seed(seed: u64, stream: u8) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[0] = stream;
    bytes[24..32].copy_from_slice(&seed.to_be_bytes());
    bytes
}

/// Fresh generator for one seeded subset draw. Every reseed point gets its
/// own instance, so repeated draws with the same seed are reproducible no
/// matter what other randomized code ran in between.
pub fn rng_for_seed(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::from_seed(chacha_seed(seed, SUBSET_STREAM))
}

/// Generator for a trial's demonstration draws: a distinct stream of the same
/// trial seed, shared across all batches of that trial so demonstrations vary
/// batch to batch while the trial as a whole replays identically.
pub fn demo_rng_for_seed(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::from_seed(chacha_seed(seed, DEMO_STREAM))
}

/// A zero-shot request still samples two demonstrations; their text is kept
/// for style conditioning and only their images and placeholders are dropped
/// at prompt-assembly time.
pub fn effective_shots(requested: usize) -> usize {
    if requested == 0 {
        2
    } else {
        requested
    }
}

/// Draws `count` distinct indices in `[0, pool_size)`, reseeded from `seed`.
pub fn sample_indices(
    pool_size: usize,
    count: usize,
    seed: u64,
) -> Result<Vec<usize>, EvalError> {
    if count > pool_size {
        return Err(EvalError::SubsetExceedsPool { count, pool_size });
    }
    let mut rng = rng_for_seed(seed);
    Ok(index::sample(&mut rng, pool_size, count).into_vec())
}

/// One seeded draw of `eval_count + query_count` distinct indices, split into
/// an evaluation subset and a query pool. Drawing both halves together is
/// what guarantees they never share an index.
pub fn sample_disjoint(
    pool_size: usize,
    eval_count: usize,
    query_count: usize,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), EvalError> {
    let mut indices = sample_indices(pool_size, eval_count + query_count, seed)?;
    let query = indices.split_off(eval_count);
    Ok((indices, query))
}

/// `batch_size` independent demonstration draws from the query pool, each
/// without replacement; draws for different batch items may overlap.
pub fn select_demos<R: Rng>(
    rng: &mut R,
    pool_size: usize,
    requested_shots: usize,
    batch_size: usize,
) -> Result<Vec<Vec<usize>>, EvalError> {
    let count = effective_shots(requested_shots);
    if count > pool_size {
        return Err(EvalError::SubsetExceedsPool { count, pool_size });
    }
    Ok((0..batch_size)
        .map(|_| index::sample(rng, pool_size, count).into_vec())
        .collect())
}

pub fn gather(
    dataset: &dyn EvalDataset,
    indices: &[usize],
) -> Result<Vec<Sample>, EvalError> {
    indices
        .iter()
        .map(|&index| dataset.get(index).map_err(EvalError::from))
        .collect()
}

//! Row partitioning: seeded train/test split and k-fold cross-validation

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::error::PipelineError;

/// Row indices of a train/test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle row indices with a seeded RNG and hold out
/// `ceil(test_size * n_rows)` of them for testing.
///
/// The same `(n_rows, test_size, seed)` always yields the same partition.
pub fn train_test_split(n_rows: usize, test_size: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::InvalidParameter {
            name: "test_size",
            reason: format!("must be in (0, 1), got {}", test_size),
        }
        .into());
    }

    let n_test = (test_size * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(PipelineError::InvalidParameter {
            name: "test_size",
            reason: format!(
                "{} of {} rows leaves an empty train or test set",
                test_size, n_rows
            ),
        }
        .into());
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(SplitIndices {
        train,
        test: indices,
    })
}

/// Unshuffled contiguous folds. The first `n_rows % k` folds hold one extra
/// row. Each entry is `(train, validation)`.
pub fn k_fold(n_rows: usize, k: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 || k > n_rows {
        return Err(PipelineError::InvalidParameter {
            name: "cv",
            reason: format!("need 2 <= folds <= rows, got {} folds for {} rows", k, n_rows),
        }
        .into());
    }

    let base = n_rows / k;
    let extra = n_rows % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let stop = start + size;
        let validation: Vec<usize> = (start..stop).collect();
        let train: Vec<usize> = (0..start).chain(stop..n_rows).collect();
        folds.push((train, validation));
        start = stop;
    }
    Ok(folds)
}

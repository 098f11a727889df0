use rand_mt::Mt;

use crate::error::{ToolError, ToolResult};

/// Seed of the train/validation shuffle. Fixed so a dataset always splits the
/// same way across runs and machines.
pub const SPLIT_SEED: u32 = 42;

/// Outcome of [`train_valid_split`]. Image and label vectors are aligned
/// element-wise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResult {
    pub train_images: Vec<String>,
    pub valid_images: Vec<String>,
    pub train_labels: Vec<String>,
    pub valid_labels: Vec<String>,
}

impl SplitResult {
    pub fn train_len(&self) -> usize {
        self.train_images.len()
    }

    pub fn valid_len(&self) -> usize {
        self.valid_images.len()
    }
}

/// Split images and labels into training and validation sets.
///
/// Both lists are sorted first so that, for validated datasets, index `i` of
/// each refers to the same sample. The validation set takes
/// `ceil(valid_size * n)` samples from the front of a seeded permutation and
/// the training set takes the rest, in permutation order.
pub fn train_valid_split(
    mut images: Vec<String>,
    mut labels: Vec<String>,
    valid_size: f64,
) -> ToolResult<SplitResult> {
    images.sort();
    labels.sort();

    let samples = images.len();
    if samples != labels.len() {
        return Err(ToolError::DatasetSize {
            images: samples,
            labels: labels.len(),
        });
    }

    let n_valid = (valid_size * samples as f64).ceil() as usize;
    if n_valid == 0 || n_valid >= samples {
        return Err(ToolError::SplitTooSmall { samples, valid_size });
    }

    let order = permutation(samples, SPLIT_SEED);
    let (valid_idx, train_idx) = order.split_at(n_valid);
    let pick = |items: &[String], idx: &[usize]| -> Vec<String> {
        idx.iter().map(|&i| items[i].clone()).collect()
    };

    Ok(SplitResult {
        train_images: pick(&images, train_idx),
        valid_images: pick(&images, valid_idx),
        train_labels: pick(&labels, train_idx),
        valid_labels: pick(&labels, valid_idx),
    })
}

/// Random permutation of `0..n` driven by MT19937.
///
/// Fisher-Yates from the back; each swap index is drawn from `0..=i` by
/// masking 32-bit outputs and rejecting values above `i`. Given the same seed
/// this reproduces the permutations of the reference statistical toolkit.
pub fn permutation(n: usize, seed: u32) -> Vec<usize> {
    let mut rng = Mt::new(seed);
    let mut order: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = bounded(&mut rng, i as u32) as usize;
        order.swap(i, j);
    }
    order
}

/// Uniform value in `0..=max` by rejection sampling under a bit mask.
fn bounded(rng: &mut Mt, max: u32) -> u32 {
    if max == 0 {
        return 0;
    }
    let mut mask = max;
    mask |= mask >> 1;
    mask |= mask >> 2;
    mask |= mask >> 4;
    mask |= mask >> 8;
    mask |= mask >> 16;
    loop {
        let value = rng.next_u32() & mask;
        if value <= max {
            return value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_matches_reference_sequences() {
        assert_eq!(permutation(5, 1), vec![2, 1, 4, 0, 3]);
        assert_eq!(permutation(10, 1), vec![2, 9, 6, 4, 0, 3, 1, 7, 8, 5]);
        assert_eq!(permutation(5, SPLIT_SEED), vec![1, 4, 2, 0, 3]);
    }

    #[test]
    fn trivial_permutations() {
        assert!(permutation(0, SPLIT_SEED).is_empty());
        assert_eq!(permutation(1, SPLIT_SEED), vec![0]);
    }

    #[test]
    fn empty_validation_set_is_rejected() {
        let images = vec!["1.jpg".to_string()];
        let labels = vec!["1.txt".to_string()];
        let err = train_valid_split(images, labels, 0.1).unwrap_err();
        assert!(matches!(err, ToolError::SplitTooSmall { samples: 1, .. }));
    }
}

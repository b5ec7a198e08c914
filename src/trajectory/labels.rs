//! Label helpers: arg-max class extraction, per-class counts, one-hot
//! encoding, row gathers and the shuffled train/validation split.

use ndarray::{Array, Array2, ArrayBase, ArrayView2, Axis, Data, RemoveAxis};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Result, StrataError};

/// Row-wise arg-max of a one-hot label matrix.
///
/// Ties resolve to the first maximal column.
pub fn class_indices(labels: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
    if labels.ncols() == 0 {
        return Err(StrataError::shape("label matrix has zero classes"));
    }

    Ok(labels
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (c, &value) in row.iter().enumerate() {
                if value > row[best] {
                    best = c;
                }
            }
            best
        })
        .collect())
}

/// Number of samples in each of `num_classes` classes.
pub fn class_counts(classes: &[usize], num_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; num_classes];
    for &c in classes {
        if c < num_classes {
            counts[c] += 1;
        }
    }
    counts
}

/// Encode class indices as a `[N, num_classes]` one-hot matrix.
pub fn one_hot(classes: &[usize], num_classes: usize) -> Result<Array2<f64>> {
    let mut labels = Array2::zeros((classes.len(), num_classes));
    for (i, &c) in classes.iter().enumerate() {
        if c >= num_classes {
            return Err(StrataError::shape(format!(
                "class {c} of sample {i} is outside 0..{num_classes}"
            )));
        }
        labels[[i, c]] = 1.0;
    }
    Ok(labels)
}

/// Gather the rows `indices` of `array` (any rank) into an owned array.
pub fn select_rows<A, S, D>(array: &ArrayBase<S, D>, indices: &[usize]) -> Result<Array<A, D>>
where
    A: Clone,
    S: Data<Elem = A>,
    D: RemoveAxis,
{
    let rows = array.len_of(Axis(0));
    if let Some(&bad) = indices.iter().find(|&&i| i >= rows) {
        return Err(StrataError::shape(format!(
            "row index {bad} is out of bounds for {rows} rows"
        )));
    }
    Ok(array.select(Axis(0), indices))
}

/// Shuffle `0..n` and split it into `(train, validation)` index lists.
///
/// The validation list holds `ceil(n * validation_split)` indices.
pub fn train_validation_split<R: Rng>(
    n: usize,
    validation_split: f64,
    rng: &mut R,
) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    let num_valid = ((n as f64 * validation_split).ceil() as usize).min(n);
    let valid = indices.split_off(n - num_valid);
    (indices, valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_class_indices_argmax() {
        let labels = array![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.1, 0.2, 0.7]];
        assert_eq!(class_indices(labels.view()).unwrap(), vec![1, 0, 2]);
    }

    #[test]
    fn test_class_indices_ties_pick_first() {
        let labels = array![[0.5, 0.5], [0.0, 0.0]];
        assert_eq!(class_indices(labels.view()).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_class_indices_zero_classes() {
        let labels = Array2::<f64>::zeros((3, 0));
        assert!(matches!(
            class_indices(labels.view()),
            Err(StrataError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_class_counts() {
        assert_eq!(class_counts(&[0, 1, 1, 2, 1], 4), vec![1, 3, 1, 0]);
    }

    #[test]
    fn test_one_hot_roundtrip_with_argmax() {
        let classes = vec![2, 0, 1, 1];
        let labels = one_hot(&classes, 3).unwrap();
        assert_eq!(labels.dim(), (4, 3));
        assert_eq!(class_indices(labels.view()).unwrap(), classes);
        assert!(one_hot(&[3], 3).is_err());
    }

    #[test]
    fn test_train_validation_split_partitions() {
        let mut rng = StdRng::seed_from_u64(7);
        let (train, valid) = train_validation_split(10, 0.2, &mut rng);
        assert_eq!(train.len(), 8);
        assert_eq!(valid.len(), 2);

        let mut all: Vec<usize> = train.iter().chain(valid.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_train_validation_split_rounds_validation_up() {
        let mut rng = StdRng::seed_from_u64(3);
        let (train, valid) = train_validation_split(11, 0.2, &mut rng);
        assert_eq!(train.len(), 8);
        assert_eq!(valid.len(), 3);
    }

    #[test]
    fn test_select_rows_any_rank() {
        let matrix = array![[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]];
        assert_eq!(
            select_rows(&matrix, &[2, 0]).unwrap(),
            array![[4.0, 5.0], [0.0, 1.0]]
        );

        let tensor = ndarray::Array4::from_shape_fn((3, 2, 1, 1), |(i, t, _, _)| (i * 10 + t) as f64);
        let picked = select_rows(&tensor, &[1]).unwrap();
        assert_eq!(picked.dim(), (1, 2, 1, 1));
        assert_eq!(picked[[0, 1, 0, 0]], 11.0);
    }

    #[test]
    fn test_select_rows_out_of_bounds() {
        let matrix = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            select_rows(&matrix, &[0, 2]),
            Err(StrataError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_train_validation_split_zero_fraction() {
        let mut rng = StdRng::seed_from_u64(7);
        let (train, valid) = train_validation_split(5, 0.0, &mut rng);
        assert_eq!(train.len(), 5);
        assert!(valid.is_empty());
    }
}

//! Train/validation partition of the labelled nodes.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Sorted node ids used for parameter updates.
    pub train: Vec<usize>,
    /// Sorted node ids held out for accuracy tracking.
    pub validation: Vec<usize>,
}

/// Hold out `val_size` of the labelled nodes (rounded up), keeping at least one for training.
///
/// Unlabelled nodes (`None`) are in neither set. The same `seed` gives the same split.
pub fn train_val_split(labels: &[Option<usize>], val_size: f64, seed: Option<u64>) -> Result<Split> {
    if !val_size.is_finite() || !(0.0..1.0).contains(&val_size) {
        return Err(Error::InvalidParameter(format!(
            "val_size must be in [0, 1) (got {val_size})"
        )));
    }
    let mut labelled: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_some())
        .map(|(i, _)| i)
        .collect();
    if labelled.is_empty() {
        return Err(Error::InvalidParameter(
            "at least one node must be labelled".to_string(),
        ));
    }

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    labelled.shuffle(&mut rng);

    let m = labelled.len();
    let n_val = ((val_size * m as f64).ceil() as usize).min(m - 1);
    let mut validation = labelled.split_off(m - n_val);
    let mut train = labelled;
    train.sort_unstable();
    validation.sort_unstable();
    Ok(Split { train, validation })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ten_labels() -> Vec<Option<usize>> {
        (0..10).map(|i| Some(i / 5)).collect()
    }

    #[test]
    fn sizes_follow_val_size() {
        let split = train_val_split(&ten_labels(), 0.2, Some(0)).unwrap();
        assert_eq!(split.validation.len(), 2);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn seeded_split_is_reproducible() {
        let a = train_val_split(&ten_labels(), 0.3, Some(42)).unwrap();
        let b = train_val_split(&ten_labels(), 0.3, Some(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unlabelled_nodes_are_excluded() {
        let labels = vec![Some(0), None, Some(1), None];
        let split = train_val_split(&labels, 0.0, Some(1)).unwrap();
        assert_eq!(split.train, vec![0, 2]);
        assert!(split.validation.is_empty());
    }

    #[test]
    fn keeps_one_training_node() {
        let labels = vec![Some(0), Some(1)];
        let split = train_val_split(&labels, 0.99, Some(1)).unwrap();
        assert_eq!(split.train.len(), 1);
        assert_eq!(split.validation.len(), 1);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(train_val_split(&ten_labels(), 1.0, None).is_err());
        assert!(train_val_split(&ten_labels(), -0.1, None).is_err());
        assert!(train_val_split(&[None, None], 0.1, None).is_err());
    }
}

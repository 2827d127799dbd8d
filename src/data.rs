//! Contiguous dataset helpers.
//!
//! The training loop operates on slices to avoid per-step allocations. `Inputs` and
//! `Dataset` provide validated, row-major storage for the design matrix (X) and the
//! one-hot label matrix (Y).

use rand::Rng;
use rand::seq::SliceRandom;

use crate::{Error, Result};

/// A collection of input samples (X).
///
/// Stored as a contiguous buffer with row-major layout:
/// - `inputs.len() == len * input_dim`
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs {
    inputs: Vec<f32>,
    len: usize,
    input_dim: usize,
}

impl Inputs {
    /// Build inputs from a flat buffer with shape `(len, input_dim)`.
    pub fn from_flat(inputs: Vec<f32>, input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidData("input_dim must be > 0".to_owned()));
        }
        if !inputs.len().is_multiple_of(input_dim) {
            return Err(Error::InvalidData(format!(
                "inputs length {} is not divisible by input_dim {}",
                inputs.len(),
                input_dim
            )));
        }

        let len = inputs.len() / input_dim;

        Ok(Self {
            inputs,
            len,
            input_dim,
        })
    }

    /// Build inputs from per-sample rows.
    ///
    /// This is a convenience constructor (it copies into contiguous storage).
    pub fn from_rows(inputs: &[Vec<f32>]) -> Result<Self> {
        if inputs.is_empty() {
            return Err(Error::InvalidData("inputs must not be empty".to_owned()));
        }

        let input_dim = inputs[0].len();
        if input_dim == 0 {
            return Err(Error::InvalidData("input_dim must be > 0".to_owned()));
        }

        for (i, row) in inputs.iter().enumerate() {
            if row.len() != input_dim {
                return Err(Error::InvalidData(format!(
                    "input row {i} has len {}, expected {input_dim}",
                    row.len()
                )));
            }
        }

        let len = inputs.len();
        let mut inputs_flat = Vec::with_capacity(len * input_dim);
        for row in inputs {
            inputs_flat.extend_from_slice(row);
        }

        Ok(Self {
            inputs: inputs_flat,
            len,
            input_dim,
        })
    }

    #[inline]
    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    /// Returns the per-sample input dimension.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[inline]
    /// Returns the `idx`-th input row (shape: `(input_dim,)`).
    ///
    /// Panics if `idx >= len`.
    pub fn input(&self, idx: usize) -> &[f32] {
        let start = idx * self.input_dim;
        &self.inputs[start..start + self.input_dim]
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.inputs.chunks_exact(self.input_dim)
    }

    #[inline]
    /// Row-major backing buffer.
    pub fn as_flat(&self) -> &[f32] {
        &self.inputs
    }

    pub fn into_flat(self) -> Vec<f32> {
        self.inputs
    }

    /// Stack `other` below `self`. Both must have the same `input_dim`.
    pub fn concat(&self, other: &Inputs) -> Result<Inputs> {
        if self.input_dim != other.input_dim {
            return Err(Error::Dimension(format!(
                "cannot stack inputs with input_dim {} and {}",
                self.input_dim, other.input_dim
            )));
        }
        let mut inputs = Vec::with_capacity(self.inputs.len() + other.inputs.len());
        inputs.extend_from_slice(&self.inputs);
        inputs.extend_from_slice(&other.inputs);
        Ok(Inputs {
            inputs,
            len: self.len + other.len,
            input_dim: self.input_dim,
        })
    }

    /// Split into rows `[0, mid)` and `[mid, len)`.
    pub fn split_at(self, mid: usize) -> Result<(Inputs, Inputs)> {
        if mid > self.len {
            return Err(Error::InvalidData(format!(
                "split index {mid} is past the end ({} rows)",
                self.len
            )));
        }
        let mut head = self.inputs;
        let tail = head.split_off(mid * self.input_dim);
        Ok((
            Inputs {
                inputs: head,
                len: mid,
                input_dim: self.input_dim,
            },
            Inputs {
                inputs: tail,
                len: self.len - mid,
                input_dim: self.input_dim,
            },
        ))
    }

    fn gather(&self, order: &[usize]) -> Inputs {
        let mut inputs = Vec::with_capacity(order.len() * self.input_dim);
        for &idx in order {
            inputs.extend_from_slice(self.input(idx));
        }
        Inputs {
            inputs,
            len: order.len(),
            input_dim: self.input_dim,
        }
    }
}

/// One-hot encode `label` over `num_classes` classes.
pub fn one_hot(label: usize, num_classes: usize) -> Result<Vec<f32>> {
    if label >= num_classes {
        return Err(Error::InvalidData(format!(
            "label {label} is out of range for {num_classes} classes"
        )));
    }
    let mut row = vec![0.0_f32; num_classes];
    row[label] = 1.0;
    Ok(row)
}

/// Index of the first maximum entry. Returns 0 for an empty slice.
#[inline]
pub fn argmax(xs: &[f32]) -> usize {
    let mut best = 0;
    for (i, &x) in xs.iter().enumerate().skip(1) {
        if x > xs[best] {
            best = i;
        }
    }
    best
}

/// A supervised dataset: inputs (X) and one-hot targets (Y).
///
/// Stored as contiguous buffers with row-major layout:
/// - `inputs.len() == len * input_dim`
/// - `targets.len() == len * target_dim`
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    inputs: Inputs,
    targets: Vec<f32>,
    target_dim: usize,
}

impl Dataset {
    /// Build a dataset from flat buffers.
    ///
    /// `inputs` is `(len, input_dim)` and `targets` is `(len, target_dim)`.
    pub fn from_flat(
        inputs: Vec<f32>,
        targets: Vec<f32>,
        input_dim: usize,
        target_dim: usize,
    ) -> Result<Self> {
        let inputs = Inputs::from_flat(inputs, input_dim)?;
        Self::from_inputs(inputs, targets, target_dim)
    }

    /// Pair existing inputs with a flat `(len, target_dim)` target buffer.
    pub fn from_inputs(inputs: Inputs, targets: Vec<f32>, target_dim: usize) -> Result<Self> {
        if target_dim == 0 {
            return Err(Error::InvalidData("target_dim must be > 0".to_owned()));
        }

        if targets.len() != inputs.len() * target_dim {
            return Err(Error::InvalidData(format!(
                "targets length {} does not match len * target_dim ({} * {})",
                targets.len(),
                inputs.len(),
                target_dim
            )));
        }

        Ok(Self {
            inputs,
            targets,
            target_dim,
        })
    }

    /// Pair inputs with class ids, one-hot encoding them over `num_classes`.
    pub fn from_labels(inputs: Inputs, labels: &[usize], num_classes: usize) -> Result<Self> {
        if labels.len() != inputs.len() {
            return Err(Error::InvalidData(format!(
                "inputs/labels length mismatch: {} vs {}",
                inputs.len(),
                labels.len()
            )));
        }
        let mut targets = Vec::with_capacity(labels.len() * num_classes);
        for &label in labels {
            targets.extend(one_hot(label, num_classes)?);
        }
        Self::from_inputs(inputs, targets, num_classes)
    }

    /// Build a dataset from per-sample rows.
    ///
    /// This is a convenience constructor (it copies into contiguous storage).
    pub fn from_rows(inputs: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<Self> {
        if inputs.len() != targets.len() {
            return Err(Error::InvalidData(format!(
                "inputs/targets length mismatch: {} vs {}",
                inputs.len(),
                targets.len()
            )));
        }

        let inputs = Inputs::from_rows(inputs)?;
        let target_dim = targets.first().map(|t| t.len()).unwrap_or(0);
        if target_dim == 0 {
            return Err(Error::InvalidData("target_dim must be > 0".to_owned()));
        }
        for (i, row) in targets.iter().enumerate() {
            if row.len() != target_dim {
                return Err(Error::InvalidData(format!(
                    "target row {i} has len {}, expected {target_dim}",
                    row.len()
                )));
            }
        }

        let targets_flat = targets.iter().flatten().copied().collect();
        Self::from_inputs(inputs, targets_flat, target_dim)
    }

    #[inline]
    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    #[inline]
    /// Returns the per-sample input dimension.
    pub fn input_dim(&self) -> usize {
        self.inputs.input_dim()
    }

    #[inline]
    /// Returns the per-sample target dimension.
    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    #[inline]
    /// Returns a view of the inputs (X).
    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    #[inline]
    /// Row-major target buffer (Y).
    pub fn targets(&self) -> &[f32] {
        &self.targets
    }

    #[inline]
    /// Returns the `idx`-th input row (shape: `(input_dim,)`).
    ///
    /// Panics if `idx >= len`.
    pub fn input(&self, idx: usize) -> &[f32] {
        self.inputs.input(idx)
    }

    #[inline]
    /// Returns the `idx`-th target row (shape: `(target_dim,)`).
    ///
    /// Panics if `idx >= len`.
    pub fn target(&self, idx: usize) -> &[f32] {
        let start = idx * self.target_dim;
        &self.targets[start..start + self.target_dim]
    }

    /// Class id of each row (argmax of its one-hot target).
    pub fn labels(&self) -> Vec<usize> {
        self.targets
            .chunks_exact(self.target_dim)
            .map(argmax)
            .collect()
    }

    pub fn into_parts(self) -> (Inputs, Vec<f32>) {
        (self.inputs, self.targets)
    }

    /// Permute rows with `rng`, keeping inputs and targets aligned.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);

        let mut targets = Vec::with_capacity(self.targets.len());
        for &idx in &order {
            targets.extend_from_slice(self.target(idx));
        }
        self.inputs = self.inputs.gather(&order);
        self.targets = targets;
    }

    /// Split into rows `[0, mid)` and `[mid, len)`.
    pub fn split_at(self, mid: usize) -> Result<(Dataset, Dataset)> {
        let target_dim = self.target_dim;
        let (head_x, tail_x) = self.inputs.split_at(mid)?;
        let mut head_y = self.targets;
        let tail_y = head_y.split_off(mid * target_dim);
        Ok((
            Dataset {
                inputs: head_x,
                targets: head_y,
                target_dim,
            },
            Dataset {
                inputs: tail_x,
                targets: tail_y,
                target_dim,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn numbered(len: usize) -> Dataset {
        let inputs: Vec<Vec<f32>> = (0..len).map(|i| vec![i as f32, -(i as f32)]).collect();
        let labels: Vec<usize> = (0..len).map(|i| i % 3).collect();
        Dataset::from_labels(Inputs::from_rows(&inputs).unwrap(), &labels, 3).unwrap()
    }

    #[test]
    fn dataset_from_flat_validates_shapes() {
        let ok = Dataset::from_flat(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0], 2, 1);
        assert!(ok.is_ok());

        let err = Dataset::from_flat(vec![0.0, 1.0, 2.0], vec![0.0], 2, 1);
        assert!(err.is_err());
    }

    #[test]
    fn from_labels_builds_one_hot_rows() {
        let data = numbered(5);
        for i in 0..data.len() {
            let row = data.target(i);
            assert_eq!(row.iter().sum::<f32>(), 1.0);
            assert_eq!(row[i % 3], 1.0);
        }
        assert_eq!(data.labels(), vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn one_hot_rejects_out_of_range_label() {
        assert!(one_hot(10, 10).is_err());
        assert_eq!(one_hot(2, 4).unwrap(), vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn argmax_picks_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), 1);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn shuffle_keeps_rows_aligned() {
        let mut data = numbered(20);
        let mut rng = StdRng::seed_from_u64(3);
        data.shuffle(&mut rng);

        assert_ne!(data.labels(), numbered(20).labels());
        for i in 0..data.len() {
            let x = data.input(i);
            let original = x[0] as usize;
            assert_eq!(x[1], -x[0]);
            assert_eq!(data.labels()[i], original % 3);
        }
    }

    #[test]
    fn shuffle_is_reproducible_for_a_seed() {
        let mut a = numbered(10);
        let mut b = numbered(10);
        a.shuffle(&mut StdRng::seed_from_u64(11));
        b.shuffle(&mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }

    #[test]
    fn split_at_partitions_rows() {
        let (head, tail) = numbered(7).split_at(4).unwrap();
        assert_eq!(head.len(), 4);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail.input(0), &[4.0, -4.0]);
        assert_eq!(tail.labels(), vec![1, 2, 0]);
        assert!(numbered(3).split_at(4).is_err());
    }

    #[test]
    fn concat_stacks_rows() {
        let a = Inputs::from_rows(&[vec![1.0, 2.0]]).unwrap();
        let b = Inputs::from_rows(&[vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        let c = a.concat(&b).unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c.input(2), &[5.0, 6.0]);

        let wide = Inputs::from_rows(&[vec![0.0; 3]]).unwrap();
        assert!(matches!(a.concat(&wide), Err(Error::Dimension(_))));
    }
}

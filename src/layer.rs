use rand::Rng;
use rand::distributions::{Distribution, Uniform};

use crate::{Activation, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Weight initialization scheme.
pub enum Init {
    /// Xavier/Glorot uniform: `U(-a, a)` with `a = sqrt(6 / (in_dim + out_dim))`.
    #[default]
    Xavier,
    /// All weights start at zero. Every hidden unit then receives the same
    /// gradient, so this is only useful for tests and debugging.
    Zeros,
}

#[derive(Debug, Clone)]
pub struct Layer {
    in_dim: usize,
    out_dim: usize,
    activation: Activation,
    /// Row-major matrix with shape (out_dim, in_dim).
    weights: Vec<f32>,
    biases: Vec<f32>,
}

impl Layer {
    #[inline]
    pub fn new(in_dim: usize, out_dim: usize, activation: Activation) -> Self {
        let weights = vec![0.0; in_dim * out_dim];
        let biases = vec![0.0; out_dim];
        Self {
            in_dim,
            out_dim,
            activation,
            weights,
            biases,
        }
    }

    /// Allocate a layer and initialize its weights with `init`. Biases start at zero.
    pub fn new_with_rng<R: Rng + ?Sized>(
        in_dim: usize,
        out_dim: usize,
        init: Init,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidConfig(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }

        let mut layer = Self::new(in_dim, out_dim, activation);
        match init {
            Init::Zeros => {}
            Init::Xavier => {
                let limit = (6.0 / (in_dim + out_dim) as f32).sqrt();
                let dist = Uniform::new_inclusive(-limit, limit);
                for w in layer.weights.iter_mut() {
                    *w = dist.sample(rng);
                }
            }
        }
        Ok(layer)
    }

    /// Build a layer from raw parameters.
    ///
    /// `weights` is row-major `(out_dim, in_dim)`.
    pub fn from_parts(
        in_dim: usize,
        out_dim: usize,
        activation: Activation,
        weights: Vec<f32>,
        biases: Vec<f32>,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::Dimension(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }
        let expected_w = in_dim
            .checked_mul(out_dim)
            .ok_or_else(|| Error::Dimension("layer weight shape overflow".to_owned()))?;
        if weights.len() != expected_w {
            return Err(Error::Dimension(format!(
                "weights length {} does not match out_dim * in_dim ({out_dim} * {in_dim})",
                weights.len()
            )));
        }
        if biases.len() != out_dim {
            return Err(Error::Dimension(format!(
                "biases length {} does not match out_dim {out_dim}",
                biases.len()
            )));
        }
        if weights.iter().chain(&biases).any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "layer parameters must be finite".to_owned(),
            ));
        }

        Ok(Self {
            in_dim,
            out_dim,
            activation,
            weights,
            biases,
        })
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    #[inline]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    #[inline]
    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    #[inline]
    pub fn biases_mut(&mut self) -> &mut [f32] {
        &mut self.biases
    }

    /// Forward pass for a single sample.
    ///
    /// Computes:
    /// - `nets = W * inputs + b`
    /// - `outputs = activation(nets)`
    ///
    /// Shape contract:
    /// - `inputs.len() == self.in_dim`
    /// - `nets.len() == outputs.len() == self.out_dim`
    #[inline]
    pub fn forward(&self, inputs: &[f32], nets: &mut [f32], outputs: &mut [f32]) {
        debug_assert_eq!(inputs.len(), self.in_dim);
        debug_assert_eq!(nets.len(), self.out_dim);
        debug_assert_eq!(outputs.len(), self.out_dim);

        for o in 0..self.out_dim {
            let mut sum = self.biases[o];
            let row = o * self.in_dim;
            for i in 0..self.in_dim {
                sum = self.weights[row + i].mul_add(inputs[i], sum);
            }
            nets[o] = sum;
        }
        self.activation.apply(nets, outputs);
    }

    /// Backward pass for a single sample.
    ///
    /// This uses overwrite semantics:
    /// - `d_inputs` is overwritten (and internally zeroed before accumulation)
    /// - `d_weights` is overwritten
    /// - `d_biases` is overwritten
    ///
    /// Inputs:
    /// - `inputs`: the same inputs passed to `forward`
    /// - `outputs`: the outputs previously produced by `forward` (post-activation)
    /// - `d_outputs`: upstream gradient. For sigmoid layers this is dL/d(outputs);
    ///   for the softmax output layer it is already dL/d(nets).
    #[inline]
    pub fn backward(
        &self,
        inputs: &[f32],
        outputs: &[f32],
        d_outputs: &[f32],
        d_inputs: &mut [f32],
        d_weights: &mut [f32],
        d_biases: &mut [f32],
    ) {
        debug_assert_eq!(inputs.len(), self.in_dim);
        debug_assert_eq!(outputs.len(), self.out_dim);
        debug_assert_eq!(d_outputs.len(), self.out_dim);
        debug_assert_eq!(d_inputs.len(), self.in_dim);
        debug_assert_eq!(d_weights.len(), self.weights.len());
        debug_assert_eq!(d_biases.len(), self.out_dim);

        // d_inputs accumulates contributions from all outputs.
        d_inputs.fill(0.0);

        for o in 0..self.out_dim {
            let d_net = d_outputs[o] * self.activation.grad_from_output(outputs[o]);
            d_biases[o] = d_net;

            let row = o * self.in_dim;
            for i in 0..self.in_dim {
                let w = self.weights[row + i];
                d_weights[row + i] = d_net * inputs[i];
                d_inputs[i] = w.mul_add(d_net, d_inputs[i]);
            }
        }
    }

    /// `param -= lr * d_param` for weights and biases.
    #[inline]
    pub fn sgd_step(&mut self, d_weights: &[f32], d_biases: &[f32], lr: f32) {
        debug_assert_eq!(d_weights.len(), self.weights.len());
        debug_assert_eq!(d_biases.len(), self.biases.len());

        for (w, &g) in self.weights.iter_mut().zip(d_weights) {
            *w -= lr * g;
        }
        for (b, &g) in self.biases.iter_mut().zip(d_biases) {
            *b -= lr * g;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn xavier_init_stays_within_limit() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = Layer::new_with_rng(30, 10, Init::Xavier, Activation::Sigmoid, &mut rng)
            .unwrap();
        let limit = (6.0_f32 / 40.0).sqrt();
        assert!(layer.weights().iter().all(|w| w.abs() <= limit));
        assert!(layer.weights().iter().any(|&w| w != 0.0));
        assert!(layer.biases().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn zero_init_leaves_weights_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer =
            Layer::new_with_rng(3, 2, Init::Zeros, Activation::Sigmoid, &mut rng).unwrap();
        assert!(layer.weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn from_parts_rejects_bad_lengths() {
        assert!(Layer::from_parts(2, 2, Activation::Sigmoid, vec![0.0; 3], vec![0.0; 2]).is_err());
        assert!(Layer::from_parts(2, 2, Activation::Sigmoid, vec![0.0; 4], vec![0.0; 1]).is_err());
        assert!(
            Layer::from_parts(1, 1, Activation::Sigmoid, vec![f32::NAN], vec![0.0]).is_err()
        );
    }

    #[test]
    fn forward_records_pre_activation_sums() {
        let layer =
            Layer::from_parts(2, 1, Activation::Sigmoid, vec![1.0, -2.0], vec![0.5]).unwrap();
        let mut nets = [0.0_f32];
        let mut out = [0.0_f32];
        layer.forward(&[3.0, 1.0], &mut nets, &mut out);
        assert!((nets[0] - 1.5).abs() < 1e-6);
        assert!((out[0] - crate::activation::sigmoid(1.5)).abs() < 1e-6);
    }

    #[test]
    fn sgd_step_moves_against_gradient() {
        let mut layer =
            Layer::from_parts(1, 1, Activation::Sigmoid, vec![1.0], vec![2.0]).unwrap();
        layer.sgd_step(&[3.0], &[4.0], 0.1);
        assert!((layer.weights()[0] - 0.7).abs() < 1e-6);
        assert!((layer.biases()[0] - 1.6).abs() < 1e-6);
    }
}

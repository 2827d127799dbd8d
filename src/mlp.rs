use crate::{Activation, Error, Result};
use crate::{Init, Layer};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A stack of fully-connected layers: sigmoid hidden layers and a softmax output.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Layer>,
}

/// Per-layer activations from a forward pass.
///
/// `f_nets[i]` is the post-activation output of layer `i`, `nets[i]` the
/// pre-activation sum. The output of the most recent forward pass lives in the
/// last `f_nets` entry. Reuse one `Scratch` across calls to `Mlp::forward` to
/// avoid allocating.
#[derive(Debug, Clone, PartialEq)]
pub struct Scratch {
    nets: Vec<Vec<f32>>,
    f_nets: Vec<Vec<f32>>,
}

/// Parameter gradients for an `Mlp` (overwrite semantics).
///
/// Allocate once via `Mlp::gradients()` and reuse across training steps.
#[derive(Debug, Clone)]
pub struct Gradients {
    d_weights: Vec<Vec<f32>>,
    d_biases: Vec<Vec<f32>>,

    // Backprop intermediate: gradient w.r.t each layer output.
    // The last entry is the upstream gradient written by the loss; `Mlp::backward`
    // reads it and fills the earlier entries layer by layer.
    d_layer_outputs: Vec<Vec<f32>>,

    d_input: Vec<f32>,
}

/// Name of the layer at position `idx` in a stack of `num_layers`.
///
/// The last layer is `output`. A single hidden layer is `hidden`; several are
/// `hidden1`, `hidden2`, ...
pub fn layer_name(idx: usize, num_layers: usize) -> String {
    if idx + 1 == num_layers {
        "output".to_owned()
    } else if num_layers == 2 {
        "hidden".to_owned()
    } else {
        format!("hidden{}", idx + 1)
    }
}

impl Mlp {
    /// Build an MLP with Xavier-initialized weights from a deterministic seed.
    ///
    /// `sizes` is `[input_dim, hidden..., output_dim]`.
    pub fn new_with_seed(sizes: &[usize], seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new_with_rng(sizes, &mut rng)
    }

    pub fn new_with_rng<R: Rng + ?Sized>(sizes: &[usize], rng: &mut R) -> Result<Self> {
        Self::new_with_init(sizes, Init::Xavier, rng)
    }

    pub fn new_with_init<R: Rng + ?Sized>(sizes: &[usize], init: Init, rng: &mut R) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(Error::InvalidConfig(
                "sizes must include input and output dims".to_owned(),
            ));
        }
        if sizes.contains(&0) {
            return Err(Error::InvalidConfig(
                "all layer sizes must be > 0".to_owned(),
            ));
        }

        let num_layers = sizes.len() - 1;
        let mut layers = Vec::with_capacity(num_layers);
        for (idx, w) in sizes.windows(2).enumerate() {
            let activation = Activation::for_position(idx, num_layers);
            layers.push(Layer::new_with_rng(w[0], w[1], init, activation, rng)?);
        }
        Ok(Self { layers })
    }

    /// Assemble a model from existing layers.
    ///
    /// Each layer's `in_dim` must equal the previous layer's `out_dim`.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::Dimension(
                "mlp must have at least one layer".to_owned(),
            ));
        }
        for i in 1..layers.len() {
            let prev_out = layers[i - 1].out_dim();
            if layers[i].in_dim() != prev_out {
                return Err(Error::Dimension(format!(
                    "layer {i} in_dim {} does not match previous out_dim {prev_out}",
                    layers[i].in_dim()
                )));
            }
        }
        Ok(Self { layers })
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.layers
            .first()
            .expect("mlp must have at least one layer")
            .in_dim()
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.layers
            .last()
            .expect("mlp must have at least one layer")
            .out_dim()
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Layer sizes in construction order: `[input_dim, out_dim of each layer...]`.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.layers.len() + 1);
        sizes.push(self.input_dim());
        sizes.extend(self.layers.iter().map(Layer::out_dim));
        sizes
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    #[inline]
    pub fn layer_mut(&mut self, idx: usize) -> Option<&mut Layer> {
        self.layers.get_mut(idx)
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Look up a layer by its positional name (`hidden`, `hidden2`, `output`, ...).
    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        let n = self.layers.len();
        (0..n)
            .find(|&i| layer_name(i, n) == name)
            .map(|i| &self.layers[i])
    }

    pub fn layer_names(&self) -> Vec<String> {
        let n = self.layers.len();
        (0..n).map(|i| layer_name(i, n)).collect()
    }

    pub fn scratch(&self) -> Scratch {
        Scratch::new(self)
    }

    pub fn gradients(&self) -> Gradients {
        Gradients::new(self)
    }

    /// Convenience constructor: allocate all training buffers.
    #[inline]
    pub fn trainer(&self) -> Trainer {
        Trainer::new(self)
    }

    /// Shape-checked forward pass for a single feature vector.
    ///
    /// Returns every layer's activations (`f_nets`) and pre-activation sums
    /// (`nets`). The last `f_nets` entry is the class distribution.
    pub fn solve(&self, input: &[f32]) -> Result<Scratch> {
        if input.len() != self.input_dim() {
            return Err(Error::Dimension(format!(
                "input len {} does not match model input_dim {}",
                input.len(),
                self.input_dim()
            )));
        }
        let mut scratch = self.scratch();
        self.forward(input, &mut scratch);
        Ok(scratch)
    }

    /// Forward pass for a single sample.
    ///
    /// Writes intermediate sums and activations into `scratch` and returns the
    /// final output slice.
    ///
    /// Shape contract:
    /// - `input.len() == self.input_dim()`
    /// - `scratch` must be built for this `Mlp` (same layer count and output sizes)
    pub fn forward<'a>(&self, input: &[f32], scratch: &'a mut Scratch) -> &'a [f32] {
        assert_eq!(
            input.len(),
            self.input_dim(),
            "input len {} does not match model input_dim {}",
            input.len(),
            self.input_dim()
        );
        assert_eq!(
            scratch.f_nets.len(),
            self.layers.len(),
            "scratch has {} layer outputs, model has {} layers",
            scratch.f_nets.len(),
            self.layers.len()
        );

        for (idx, layer) in self.layers.iter().enumerate() {
            assert_eq!(
                scratch.f_nets[idx].len(),
                layer.out_dim(),
                "scratch layer {idx} output len {} does not match layer out_dim {}",
                scratch.f_nets[idx].len(),
                layer.out_dim()
            );
            let nets = &mut scratch.nets[idx];
            if idx == 0 {
                layer.forward(input, nets, &mut scratch.f_nets[0]);
            } else {
                // Borrow the previous output immutably and the current output mutably.
                let (left, right) = scratch.f_nets.split_at_mut(idx);
                layer.forward(&left[idx - 1], nets, &mut right[0]);
            }
        }

        scratch.output()
    }

    /// Backward pass for a single sample, using the internal `d_output` buffer.
    ///
    /// You must call `forward` first using the same `input` and `scratch`.
    ///
    /// Before calling this, write the gradient of the loss with respect to the
    /// output layer's pre-activation sums into `grads.d_output_mut()` (see
    /// `loss::cross_entropy_backward`).
    ///
    /// Overwrite semantics:
    /// - `grads` is overwritten with gradients for this sample.
    ///
    /// Returns dL/d(input).
    pub fn backward<'a>(
        &self,
        input: &[f32],
        scratch: &Scratch,
        grads: &'a mut Gradients,
    ) -> &'a [f32] {
        assert_eq!(
            input.len(),
            self.input_dim(),
            "input len {} does not match model input_dim {}",
            input.len(),
            self.input_dim()
        );
        assert_eq!(
            scratch.f_nets.len(),
            self.layers.len(),
            "scratch has {} layer outputs, model has {} layers",
            scratch.f_nets.len(),
            self.layers.len()
        );
        assert_eq!(
            grads.d_weights.len(),
            self.layers.len(),
            "grads has {} d_weights entries, model has {} layers",
            grads.d_weights.len(),
            self.layers.len()
        );
        assert_eq!(
            grads.d_input.len(),
            self.input_dim(),
            "grads d_input len {} does not match model input_dim {}",
            grads.d_input.len(),
            self.input_dim()
        );

        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];

            let layer_input: &[f32] = if idx == 0 {
                input
            } else {
                &scratch.f_nets[idx - 1]
            };
            let layer_output: &[f32] = &scratch.f_nets[idx];

            if idx == 0 {
                layer.backward(
                    layer_input,
                    layer_output,
                    &grads.d_layer_outputs[0],
                    &mut grads.d_input,
                    &mut grads.d_weights[0],
                    &mut grads.d_biases[0],
                );
            } else {
                // `d_inputs` of the current layer becomes `d_outputs` of the previous one.
                let (left, right) = grads.d_layer_outputs.split_at_mut(idx);
                layer.backward(
                    layer_input,
                    layer_output,
                    &right[0],
                    &mut left[idx - 1],
                    &mut grads.d_weights[idx],
                    &mut grads.d_biases[idx],
                );
            }
        }

        &grads.d_input
    }

    /// Applies an SGD update to all layers.
    #[inline]
    pub fn sgd_step(&mut self, grads: &Gradients, lr: f32) {
        assert!(
            lr.is_finite() && lr > 0.0,
            "learning rate must be finite and > 0"
        );
        assert_eq!(
            self.layers.len(),
            grads.d_weights.len(),
            "grads has {} d_weights entries, model has {} layers",
            grads.d_weights.len(),
            self.layers.len()
        );

        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.sgd_step(&grads.d_weights[i], &grads.d_biases[i], lr);
        }
    }
}

/// Reusable buffers for training a specific `Mlp`.
#[derive(Debug, Clone)]
pub struct Trainer {
    pub scratch: Scratch,
    pub grads: Gradients,
}

impl Trainer {
    pub fn new(mlp: &Mlp) -> Self {
        Self {
            scratch: Scratch::new(mlp),
            grads: Gradients::new(mlp),
        }
    }
}

impl Scratch {
    pub fn new(mlp: &Mlp) -> Self {
        let nets: Vec<Vec<f32>> = mlp
            .layers
            .iter()
            .map(|layer| vec![0.0; layer.out_dim()])
            .collect();
        let f_nets = nets.clone();
        Self { nets, f_nets }
    }

    /// Output-layer activations of the last forward pass.
    #[inline]
    pub fn output(&self) -> &[f32] {
        self.f_nets
            .last()
            .expect("scratch must have at least one layer output")
            .as_slice()
    }

    /// Post-activation outputs, one entry per layer.
    #[inline]
    pub fn f_nets(&self) -> &[Vec<f32>] {
        &self.f_nets
    }

    /// Pre-activation sums, one entry per layer.
    #[inline]
    pub fn nets(&self) -> &[Vec<f32>] {
        &self.nets
    }
}

impl Gradients {
    pub fn new(mlp: &Mlp) -> Self {
        let mut d_weights = Vec::with_capacity(mlp.layers.len());
        let mut d_biases = Vec::with_capacity(mlp.layers.len());
        let mut d_layer_outputs = Vec::with_capacity(mlp.layers.len());

        for layer in &mlp.layers {
            d_weights.push(vec![0.0; layer.in_dim() * layer.out_dim()]);
            d_biases.push(vec![0.0; layer.out_dim()]);
            d_layer_outputs.push(vec![0.0; layer.out_dim()]);
        }

        Self {
            d_weights,
            d_biases,
            d_layer_outputs,
            d_input: vec![0.0; mlp.input_dim()],
        }
    }

    /// Mutable view of the upstream gradient buffer for the output layer.
    ///
    /// Typical training flow:
    /// - `mlp.forward(input, &mut scratch)`
    /// - loss writes `dL/d(net_out)` into `grads.d_output_mut()`
    /// - `mlp.backward(input, &scratch, &mut grads)`
    #[inline]
    pub fn d_output_mut(&mut self) -> &mut [f32] {
        self.d_layer_outputs
            .last_mut()
            .expect("mlp must have at least one layer")
            .as_mut_slice()
    }

    #[inline]
    pub fn d_input(&self) -> &[f32] {
        &self.d_input
    }

    #[inline]
    pub fn d_weights(&self, layer_idx: usize) -> &[f32] {
        &self.d_weights[layer_idx]
    }

    #[inline]
    pub fn d_biases(&self, layer_idx: usize) -> &[f32] {
        &self.d_biases[layer_idx]
    }

    #[inline]
    pub fn d_weights_mut(&mut self, layer_idx: usize) -> &mut [f32] {
        &mut self.d_weights[layer_idx]
    }

    #[inline]
    pub fn d_biases_mut(&mut self, layer_idx: usize) -> &mut [f32] {
        &mut self.d_biases[layer_idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loss_for_mlp(mlp: &Mlp, input: &[f32], target: &[f32], scratch: &mut Scratch) -> f32 {
        mlp.forward(input, scratch);
        crate::loss::cross_entropy(scratch.output(), target)
    }

    fn assert_close(analytic: f32, numeric: f32, abs_tol: f32, rel_tol: f32) {
        let diff = (analytic - numeric).abs();
        let scale = analytic.abs().max(numeric.abs()).max(1.0);
        assert!(
            diff <= abs_tol || diff / scale <= rel_tol,
            "analytic={analytic} numeric={numeric} diff={diff}"
        );
    }

    #[test]
    fn seeded_init_is_deterministic() {
        let a = Mlp::new_with_seed(&[2, 3, 2], 123).unwrap();
        let b = Mlp::new_with_seed(&[2, 3, 2], 123).unwrap();

        let input = [0.3_f32, -0.7_f32];
        let out_a = a.solve(&input).unwrap();
        let out_b = b.solve(&input).unwrap();
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn solve_is_pure() {
        let mlp = Mlp::new_with_seed(&[3, 4, 2], 9).unwrap();
        let input = [0.1_f32, 0.5, -0.2];
        let first = mlp.solve(&input).unwrap();
        let second = mlp.solve(&input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn solve_returns_every_layer() {
        let mlp = Mlp::new_with_seed(&[4, 3, 2], 0).unwrap();
        let s = mlp.solve(&[0.0, 1.0, 0.5, 0.25]).unwrap();
        assert_eq!(s.f_nets().len(), 2);
        assert_eq!(s.nets().len(), 2);
        assert_eq!(s.f_nets()[0].len(), 3);
        assert_eq!(s.output().len(), 2);

        // Hidden activations are sigmoid of the stored sums.
        for (z, y) in s.nets()[0].iter().zip(&s.f_nets()[0]) {
            assert!((crate::activation::sigmoid(*z) - y).abs() < 1e-6);
        }
        let total: f32 = s.output().iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn solve_rejects_wrong_input_len() {
        let mlp = Mlp::new_with_seed(&[4, 3, 2], 0).unwrap();
        assert!(matches!(mlp.solve(&[0.0; 3]), Err(Error::Dimension(_))));
    }

    #[test]
    fn construction_validates_sizes() {
        assert!(Mlp::new_with_seed(&[4], 0).is_err());
        assert!(Mlp::new_with_seed(&[4, 0, 2], 0).is_err());
    }

    #[test]
    fn from_layers_requires_chained_dims() {
        let a = Layer::new(2, 3, Activation::Sigmoid);
        let b = Layer::new(4, 2, Activation::Softmax);
        assert!(matches!(
            Mlp::from_layers(vec![a, b]),
            Err(Error::Dimension(_))
        ));
        assert!(Mlp::from_layers(vec![]).is_err());
    }

    #[test]
    fn layers_are_named_by_position() {
        let small = Mlp::new_with_seed(&[4, 3, 2], 0).unwrap();
        assert_eq!(small.layer_names(), vec!["hidden", "output"]);
        assert_eq!(small.layer_by_name("output").unwrap().out_dim(), 2);

        let deep = Mlp::new_with_seed(&[4, 5, 3, 2], 0).unwrap();
        assert_eq!(deep.layer_names(), vec!["hidden1", "hidden2", "output"]);
        assert_eq!(deep.layer_by_name("hidden2").unwrap().in_dim(), 5);
        assert!(deep.layer_by_name("hidden").is_none());
        assert_eq!(deep.sizes(), vec![4, 5, 3, 2]);
    }

    #[test]
    fn backward_matches_numeric_gradients() {
        let mut mlp = Mlp::new_with_seed(&[2, 3, 2], 0).unwrap();
        let mut scratch = mlp.scratch();
        let mut grads = mlp.gradients();

        let input = [0.3_f32, -0.7_f32];
        let target = [0.0_f32, 1.0_f32];

        mlp.forward(&input, &mut scratch);
        let _loss =
            crate::loss::cross_entropy_backward(scratch.output(), &target, grads.d_output_mut());
        let d_input = mlp.backward(&input, &scratch, &mut grads).to_vec();

        let eps = 1e-3_f32;
        let abs_tol = 1e-3_f32;
        let rel_tol = 1e-2_f32;

        let mut scratch_tmp = mlp.scratch();

        for layer_idx in 0..mlp.num_layers() {
            let w_len = grads.d_weights(layer_idx).len();
            for p in 0..w_len {
                let orig = mlp.layers[layer_idx].weights()[p];
                mlp.layers[layer_idx].weights_mut()[p] = orig + eps;
                let loss_plus = loss_for_mlp(&mlp, &input, &target, &mut scratch_tmp);
                mlp.layers[layer_idx].weights_mut()[p] = orig - eps;
                let loss_minus = loss_for_mlp(&mlp, &input, &target, &mut scratch_tmp);
                mlp.layers[layer_idx].weights_mut()[p] = orig;

                let numeric = (loss_plus - loss_minus) / (2.0 * eps);
                assert_close(grads.d_weights(layer_idx)[p], numeric, abs_tol, rel_tol);
            }

            let b_len = grads.d_biases(layer_idx).len();
            for p in 0..b_len {
                let orig = mlp.layers[layer_idx].biases()[p];
                mlp.layers[layer_idx].biases_mut()[p] = orig + eps;
                let loss_plus = loss_for_mlp(&mlp, &input, &target, &mut scratch_tmp);
                mlp.layers[layer_idx].biases_mut()[p] = orig - eps;
                let loss_minus = loss_for_mlp(&mlp, &input, &target, &mut scratch_tmp);
                mlp.layers[layer_idx].biases_mut()[p] = orig;

                let numeric = (loss_plus - loss_minus) / (2.0 * eps);
                assert_close(grads.d_biases(layer_idx)[p], numeric, abs_tol, rel_tol);
            }
        }

        let mut input_var = input;
        for i in 0..input_var.len() {
            let orig = input_var[i];
            input_var[i] = orig + eps;
            let loss_plus = loss_for_mlp(&mlp, &input_var, &target, &mut scratch_tmp);
            input_var[i] = orig - eps;
            let loss_minus = loss_for_mlp(&mlp, &input_var, &target, &mut scratch_tmp);
            input_var[i] = orig;

            let numeric = (loss_plus - loss_minus) / (2.0 * eps);
            assert_close(d_input[i], numeric, abs_tol, rel_tol);
        }
    }

    #[test]
    #[should_panic]
    fn forward_panics_on_input_shape_mismatch() {
        let mlp = Mlp::new_with_seed(&[2, 3, 1], 0).unwrap();
        let mut scratch = mlp.scratch();
        let input = [0.0_f32; 3];
        mlp.forward(&input, &mut scratch);
    }

    #[test]
    #[should_panic]
    fn forward_panics_on_scratch_mismatch() {
        let a = Mlp::new_with_seed(&[2, 3, 1], 0).unwrap();
        let b = Mlp::new_with_seed(&[2, 4, 1], 0).unwrap();
        let mut scratch_b = b.scratch();
        let input = [0.0_f32; 2];
        a.forward(&input, &mut scratch_b);
    }
}

//! Activation functions.
//!
//! A dense layer computes a pre-activation value `net = W x + b` and then applies an
//! activation: `f_net = activation(net)`.
//!
//! The activation family is fixed: hidden layers use the logistic sigmoid and the
//! output layer uses softmax. Softmax is paired with cross-entropy in training, so
//! its derivative is never needed on its own (the output error is `f_net - target`).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Layer activation.
pub enum Activation {
    /// Element-wise logistic sigmoid.
    Sigmoid,
    /// Softmax over the whole layer output.
    Softmax,
}

impl Activation {
    /// Activation used by a layer at position `idx` in a stack of `num_layers`.
    #[inline]
    pub fn for_position(idx: usize, num_layers: usize) -> Self {
        if idx + 1 == num_layers {
            Activation::Softmax
        } else {
            Activation::Sigmoid
        }
    }

    /// Apply the activation to `nets`, writing into `out`.
    ///
    /// Shape contract: `nets.len() == out.len()`.
    #[inline]
    pub(crate) fn apply(self, nets: &[f32], out: &mut [f32]) {
        debug_assert_eq!(nets.len(), out.len());
        match self {
            Activation::Sigmoid => {
                for (o, &z) in out.iter_mut().zip(nets) {
                    *o = sigmoid(z);
                }
            }
            Activation::Softmax => softmax(nets, out),
        }
    }

    /// Derivative of the sigmoid with respect to its input, expressed in terms
    /// of the cached post-activation output `y`.
    ///
    /// Softmax layers return 1.0: their upstream gradient is already taken with
    /// respect to `net` by the fused cross-entropy loss.
    #[inline]
    pub(crate) fn grad_from_output(self, y: f32) -> f32 {
        match self {
            Activation::Sigmoid => y * (1.0 - y),
            Activation::Softmax => 1.0,
        }
    }
}

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

#[inline]
fn softmax(xs: &[f32], out: &mut [f32]) {
    if xs.is_empty() {
        return;
    }
    let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0_f32;
    for (o, &x) in out.iter_mut().zip(xs) {
        *o = (x - max_x).exp();
        sum += *o;
    }
    let inv_sum = 1.0 / sum;
    for o in out.iter_mut() {
        *o *= inv_sum;
    }
}

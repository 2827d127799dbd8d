//! Loss functions.
//!
//! Training uses categorical cross-entropy on the softmax output layer. These are
//! small, allocation-free helpers intended to be used like:
//!
//! - run `model.forward(...)`
//! - compute `d_output` via `cross_entropy_backward`
//! - run `model.backward(...)`
//! - update parameters with an optimizer

/// Probabilities are clamped to this floor before taking the log.
const MIN_PROB: f32 = 1e-12;

/// Categorical cross-entropy of a probability vector against a one-hot target.
///
/// Returns `-sum_i target[i] * ln(probs[i])`.
#[inline]
pub fn cross_entropy(probs: &[f32], target: &[f32]) -> f32 {
    assert_eq!(
        probs.len(),
        target.len(),
        "pred len {} does not match target len {}",
        probs.len(),
        target.len()
    );

    let mut sum = 0.0_f32;
    for (&p, &t) in probs.iter().zip(target) {
        if t != 0.0 {
            sum -= t * p.max(MIN_PROB).ln();
        }
    }
    sum
}

/// Cross-entropy loss + gradient w.r.t. the softmax layer's pre-activation sums.
///
/// Writes `d_net = probs - target` into `d_net` and returns the loss. This fuses
/// the softmax Jacobian with the loss derivative, so `probs` must be a softmax
/// output and `target` must sum to 1.
///
/// Shape contract:
/// - `probs.len() == target.len()`
/// - `probs.len() == d_net.len()`
#[inline]
pub fn cross_entropy_backward(probs: &[f32], target: &[f32], d_net: &mut [f32]) -> f32 {
    assert_eq!(
        probs.len(),
        d_net.len(),
        "pred len {} does not match d_pred len {}",
        probs.len(),
        d_net.len()
    );

    let loss = cross_entropy(probs, target);
    for i in 0..probs.len() {
        d_net[i] = probs[i] - target[i];
    }
    loss
}

/// Mean squared error, `0.5 * mean((pred - target)^2)`.
///
/// Not used for training; reported alongside cross-entropy by evaluation.
#[inline]
pub fn mse(pred: &[f32], target: &[f32]) -> f32 {
    assert_eq!(
        pred.len(),
        target.len(),
        "pred len {} does not match target len {}",
        pred.len(),
        target.len()
    );

    if pred.is_empty() {
        return 0.0;
    }

    let inv_n = 1.0 / pred.len() as f32;
    let mut sum_sq = 0.0_f32;
    for i in 0..pred.len() {
        let diff = pred[i] - target[i];
        sum_sq = diff.mul_add(diff, sum_sq);
    }
    0.5 * sum_sq * inv_n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_entropy_prefers_correct_class() {
        let good = [0.8_f32, 0.1, 0.1];
        let bad = [0.1_f32, 0.1, 0.8];
        let target = [1.0_f32, 0.0, 0.0];
        assert!(cross_entropy(&good, &target) < cross_entropy(&bad, &target));
    }

    #[test]
    fn cross_entropy_is_finite_for_zero_probability() {
        let loss = cross_entropy(&[0.0, 1.0], &[1.0, 0.0]);
        assert!(loss.is_finite());
        assert!(loss > 20.0);
    }

    #[test]
    fn backward_is_prediction_minus_target() {
        let probs = [0.7_f32, 0.2, 0.1];
        let target = [0.0_f32, 1.0, 0.0];
        let mut d = [0.0_f32; 3];
        let loss = cross_entropy_backward(&probs, &target, &mut d);
        assert!((loss - (-(0.2_f32).ln())).abs() < 1e-6);
        assert!((d[0] - 0.7).abs() < 1e-6);
        assert!((d[1] + 0.8).abs() < 1e-6);
        assert!((d[2] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn mse_matches_hand_computation() {
        // 0.5 * mean([(-1)^2, (2)^2]) = 1.25
        assert!((mse(&[1.0, 3.0], &[2.0, 1.0]) - 1.25).abs() < 1e-6);
        assert_eq!(mse(&[1.0, -2.0], &[1.0, -2.0]), 0.0);
    }
}

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::{Dataset, Error, Mlp, Optimizer, Result, Trainer, loss};

/// Example visiting order within an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shuffle {
    /// Visit examples in dataset order.
    #[default]
    None,
    /// Reshuffle every epoch from an RNG seeded once with this value.
    Seeded(u64),
}

#[derive(Debug, Clone, Copy)]
pub struct TrainConfig {
    /// Stop once the epoch-average loss drops below this value.
    pub threshold: f32,
    /// Hard cap on the number of epochs.
    pub max_epochs: usize,
    pub lr: f32,
    pub optimizer: Optimizer,
    pub shuffle: Shuffle,
    /// Log the epoch loss at `info` level every this many epochs (0 disables).
    pub log_every: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            threshold: 0.005,
            max_epochs: 1000,
            lr: 0.1,
            optimizer: Optimizer::Sgd,
            shuffle: Shuffle::None,
            log_every: 10,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_epochs == 0 {
            return Err(Error::InvalidConfig("max_epochs must be > 0".to_owned()));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(Error::InvalidConfig("lr must be finite and > 0".to_owned()));
        }
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(Error::InvalidConfig(
                "threshold must be finite and >= 0".to_owned(),
            ));
        }
        self.optimizer.validate()
    }
}

/// Outcome of `Mlp::train`.
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Average cross-entropy of every completed epoch, in order.
    pub losses: Vec<f32>,
    /// True if the loss dropped below the threshold before the epoch cap.
    pub converged: bool,
}

impl TrainReport {
    #[inline]
    pub fn epochs(&self) -> usize {
        self.losses.len()
    }

    #[inline]
    pub fn first_loss(&self) -> f32 {
        self.losses.first().copied().unwrap_or(f32::NAN)
    }

    #[inline]
    pub fn final_loss(&self) -> f32 {
        self.losses.last().copied().unwrap_or(f32::NAN)
    }
}

impl Mlp {
    /// Train with per-example gradient descent until the epoch-average
    /// cross-entropy drops below `cfg.threshold` or `cfg.max_epochs` is reached.
    ///
    /// Hitting the epoch cap is not an error: the report has `converged == false`.
    pub fn train(&mut self, train: &Dataset, cfg: TrainConfig) -> Result<TrainReport> {
        if train.is_empty() {
            return Err(Error::InvalidData(
                "train dataset must not be empty".to_owned(),
            ));
        }
        if train.input_dim() != self.input_dim() {
            return Err(Error::Dimension(format!(
                "train input_dim {} does not match model input_dim {}",
                train.input_dim(),
                self.input_dim()
            )));
        }
        if train.target_dim() != self.output_dim() {
            return Err(Error::Dimension(format!(
                "train target_dim {} does not match model output_dim {}",
                train.target_dim(),
                self.output_dim()
            )));
        }
        cfg.validate()?;

        let mut opt = cfg.optimizer.state(self)?;
        let mut trainer = Trainer::new(self);
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut rng = match cfg.shuffle {
            Shuffle::None => None,
            Shuffle::Seeded(seed) => Some(StdRng::seed_from_u64(seed)),
        };

        info!(
            "training {:?} on {} examples (threshold {}, max {} epochs)",
            self.sizes(),
            train.len(),
            cfg.threshold,
            cfg.max_epochs
        );

        let mut losses = Vec::new();
        let mut converged = false;

        for epoch in 1..=cfg.max_epochs {
            if let Some(rng) = rng.as_mut() {
                order.shuffle(rng);
            }

            let mut epoch_loss = 0.0_f32;
            for &idx in &order {
                let input = train.input(idx);
                let target = train.target(idx);

                self.forward(input, &mut trainer.scratch);
                let pred = trainer.scratch.output();

                epoch_loss +=
                    loss::cross_entropy_backward(pred, target, trainer.grads.d_output_mut());

                self.backward(input, &trainer.scratch, &mut trainer.grads);
                opt.step(self, &trainer.grads, cfg.lr);
            }

            let avg = epoch_loss / train.len() as f32;
            if !avg.is_finite() {
                return Err(Error::InvalidData(format!(
                    "training diverged: epoch {epoch} loss is {avg}"
                )));
            }
            losses.push(avg);
            debug!("epoch {epoch}: loss {avg:.6}");
            if cfg.log_every > 0 && epoch % cfg.log_every == 0 {
                info!("epoch {epoch}/{}: loss {avg:.6}", cfg.max_epochs);
            }

            if avg < cfg.threshold {
                converged = true;
                info!("converged after {epoch} epochs (loss {avg:.6})");
                break;
            }
        }

        if !converged {
            info!(
                "stopped at epoch cap {} without reaching threshold (loss {:.6})",
                cfg.max_epochs,
                losses.last().copied().unwrap_or(f32::NAN)
            );
        }

        Ok(TrainReport { losses, converged })
    }
}

//! Handwritten digit classification with a small MLP and PCA.
//!
//! `digit-mlp` is a from-scratch dense feed-forward network (sigmoid hidden
//! layers, softmax output, cross-entropy loss) trained by per-example gradient
//! descent, plus the glue around it: a CSV loader for 28x28 digit images, a
//! binary cache for parsed data, PCA dimensionality reduction and evaluation.
//!
//! # Panics vs `Result`
//!
//! This crate exposes two layers of API:
//!
//! - Low-level hot path (panics on misuse):
//!   - [`mlp::Mlp::forward`], [`mlp::Mlp::backward`]
//!     Shape mismatches are treated as programmer error and will panic via `assert!`.
//!
//! - High-level convenience APIs (shape-checked):
//!   - [`Mlp::solve`], [`Mlp::train`], [`eval::evaluate`]
//!     These validate inputs and return [`Result`].
//!
//! # Data layout and shapes
//!
//! - Network scalars are `f32`; PCA runs in `f64`.
//! - [`Dataset`] and [`Inputs`] store samples contiguously in row-major layout.
//! - Layer weights are row-major with shape `(out_dim, in_dim)`.
//!
//! # Quick start
//!
//! ```rust
//! use digit_mlp::{Dataset, Inputs, Mlp, Shuffle, TrainConfig, eval};
//!
//! # fn main() -> digit_mlp::Result<()> {
//! let xs = vec![
//!     vec![0.0, 0.0],
//!     vec![0.0, 1.0],
//!     vec![1.0, 0.0],
//!     vec![1.0, 1.0],
//! ];
//! let train = Dataset::from_labels(Inputs::from_rows(&xs)?, &[0, 1, 1, 0], 2)?;
//!
//! let mut mlp = Mlp::new_with_seed(&[2, 8, 2], 0)?;
//! let report = mlp.train(
//!     &train,
//!     TrainConfig {
//!         threshold: 0.05,
//!         max_epochs: 200,
//!         lr: 0.5,
//!         shuffle: Shuffle::Seeded(0),
//!         ..TrainConfig::default()
//!     },
//! )?;
//! assert!(report.epochs() <= 200);
//!
//! let probs = mlp.solve(&[1.0, 0.0])?;
//! assert_eq!(probs.output().len(), 2);
//! let _accuracy = eval::evaluate(&mlp, &train)?.accuracy();
//! Ok(())
//! # }
//! ```
//!
//! # Driving training yourself
//!
//! Buffers can be allocated once and reused across steps:
//!
//! ```rust
//! use digit_mlp::{Mlp, loss};
//!
//! # fn main() -> digit_mlp::Result<()> {
//! let mut mlp = Mlp::new_with_seed(&[3, 8, 2], 0)?;
//!
//! let mut trainer = mlp.trainer();
//! let x = [0.1_f32, -0.2, 0.3];
//! let t = [0.0_f32, 1.0];
//!
//! let y = mlp.forward(&x, &mut trainer.scratch);
//! let _loss = loss::cross_entropy_backward(y, &t, trainer.grads.d_output_mut());
//! mlp.backward(&x, &trainer.scratch, &mut trainer.grads);
//! mlp.sgd_step(&trainer.grads, 1e-2);
//! Ok(())
//! # }
//! ```

pub mod activation;
pub mod cache;
pub mod data;
pub mod error;
pub mod eval;
pub mod layer;
pub mod loader;
pub mod loss;
pub mod mlp;
pub mod optim;
pub mod pca;
pub mod pipeline;
pub mod serde_model;
pub mod train;

pub use activation::Activation;
pub use data::{Dataset, Inputs, argmax, one_hot};
pub use error::{Error, NumericWarning, Result};
pub use eval::EvalReport;
pub use layer::{Init, Layer};
pub use mlp::Trainer;
pub use mlp::{Gradients, Mlp, Scratch};
pub use optim::{Optimizer, OptimizerState};
pub use pca::{BasisOrder, PcaBasis, Reduction};
pub use pipeline::{PipelineConfig, Prepared};
pub use train::{Shuffle, TrainConfig, TrainReport};

//! Evaluation.
//!
//! These helpers run inference only; they never touch the weights.

use std::io;

use log::{debug, info};

use crate::data::argmax;
use crate::{Dataset, Error, Inputs, Mlp, Result, loss};

/// Rows between progress records.
const PROGRESS_EVERY: usize = 100;

/// Classification results over a labeled split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    pub correct: usize,
    pub total: usize,
    /// Mean cross-entropy of the predictions.
    pub mean_loss: f32,
    /// Mean of `loss::mse` between predicted distributions and one-hot targets.
    pub mean_squared_error: f32,
}

impl EvalReport {
    /// Fraction of correctly classified rows, `0.0` for an empty split.
    pub fn accuracy(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f32 / self.total as f32
        }
    }
}

fn check_input_dim(mlp: &Mlp, input_dim: usize) -> Result<()> {
    if input_dim != mlp.input_dim() {
        return Err(Error::Dimension(format!(
            "data input_dim {input_dim} does not match model input_dim {}",
            mlp.input_dim()
        )));
    }
    Ok(())
}

fn log_progress(done: usize, total: usize) {
    if done % PROGRESS_EVERY == 0 {
        debug!("{:.1}%", 100.0 * done as f32 / total as f32);
    }
}

/// Classify every row of `data` and compare against its labels.
pub fn evaluate(mlp: &Mlp, data: &Dataset) -> Result<EvalReport> {
    check_input_dim(mlp, data.input_dim())?;
    if data.target_dim() != mlp.output_dim() {
        return Err(Error::Dimension(format!(
            "data target_dim {} does not match model output_dim {}",
            data.target_dim(),
            mlp.output_dim()
        )));
    }

    let mut scratch = mlp.scratch();
    let mut correct = 0;
    let mut total_loss = 0.0_f32;
    let mut total_sq = 0.0_f32;

    for idx in 0..data.len() {
        let target = data.target(idx);
        let probs = mlp.forward(data.input(idx), &mut scratch);
        total_loss += loss::cross_entropy(probs, target);
        total_sq += loss::mse(probs, target);
        if argmax(probs) == argmax(target) {
            correct += 1;
        }
        log_progress(idx + 1, data.len());
    }

    let rows = data.len().max(1) as f32;
    let report = EvalReport {
        correct,
        total: data.len(),
        mean_loss: total_loss / rows,
        mean_squared_error: total_sq / rows,
    };
    info!(
        "accuracy {}/{} ({:.2}%), mean loss {:.4}, mse {:.4}",
        report.correct,
        report.total,
        100.0 * report.accuracy(),
        report.mean_loss,
        report.mean_squared_error
    );
    Ok(report)
}

/// Predicted class id for every row of `inputs`.
pub fn predict_classes(mlp: &Mlp, inputs: &Inputs) -> Result<Vec<usize>> {
    check_input_dim(mlp, inputs.input_dim())?;

    let mut scratch = mlp.scratch();
    let mut out = Vec::with_capacity(inputs.len());
    for (idx, row) in inputs.rows().enumerate() {
        out.push(argmax(mlp.forward(row, &mut scratch)));
        log_progress(idx + 1, inputs.len());
    }
    Ok(out)
}

/// Write predictions as `ImageId,Label` rows with 1-based image ids.
pub fn write_submission<W: io::Write>(writer: W, predictions: &[usize]) -> Result<()> {
    let io_err = |e: csv::Error| Error::Io(format!("failed to write submission: {e}"));

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["ImageId", "Label"]).map_err(io_err)?;
    for (idx, label) in predictions.iter().enumerate() {
        wtr.write_record([(idx + 1).to_string(), label.to_string()])
            .map_err(io_err)?;
    }
    wtr.flush()
        .map_err(|e| Error::Io(format!("failed to write submission: {e}")))?;
    info!("wrote {} predictions", predictions.len());
    Ok(())
}

//! Model serialization/deserialization.
//!
//! A saved model is a directory holding one JSON artifact per named layer
//! (`hidden.json`, `output.json`, ...) and a `model.json` manifest listing the
//! layer names in order.
//!
//! Design notes:
//! - We do NOT directly serialize internal `Mlp`/`Layer` structs, to keep the
//!   file format stable even if internal representation changes.
//! - All deserialization validates dimensions, parameter lengths, and that
//!   all parameters are finite. Any mismatch is a `ModelShape` error.

use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::mlp::layer_name;
use crate::{Activation, Error, Layer, Mlp, Result};

pub const MODEL_FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "model.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Manifest {
    pub format_version: u32,
    /// Layer names in forward order.
    pub layers: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SerializedLayer {
    pub name: String,
    pub in_dim: usize,
    pub out_dim: usize,
    /// Row-major (out_dim, in_dim).
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

impl SerializedLayer {
    fn from_layer(name: String, layer: &Layer) -> Self {
        Self {
            name,
            in_dim: layer.in_dim(),
            out_dim: layer.out_dim(),
            weights: layer.weights().to_vec(),
            biases: layer.biases().to_vec(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.in_dim == 0 || self.out_dim == 0 {
            return Err(Error::ModelShape(format!(
                "layer {} dims must be > 0, got in_dim={} out_dim={}",
                self.name, self.in_dim, self.out_dim
            )));
        }

        let expected_w = self
            .in_dim
            .checked_mul(self.out_dim)
            .ok_or_else(|| Error::ModelShape("layer weight shape overflow".to_owned()))?;
        if self.weights.len() != expected_w {
            return Err(Error::ModelShape(format!(
                "layer {} weights length {} does not match out_dim * in_dim ({} * {})",
                self.name,
                self.weights.len(),
                self.out_dim,
                self.in_dim
            )));
        }
        if self.biases.len() != self.out_dim {
            return Err(Error::ModelShape(format!(
                "layer {} biases length {} does not match out_dim {}",
                self.name,
                self.biases.len(),
                self.out_dim
            )));
        }
        if self.weights.iter().chain(&self.biases).any(|v| !v.is_finite()) {
            return Err(Error::ModelShape(format!(
                "layer {} parameters must be finite",
                self.name
            )));
        }

        Ok(())
    }

    fn into_layer(self, activation: Activation) -> Result<Layer> {
        self.validate()?;
        Layer::from_parts(
            self.in_dim,
            self.out_dim,
            activation,
            self.weights,
            self.biases,
        )
        .map_err(|e| Error::ModelShape(format!("layer {} invalid: {e}", self.name)))
    }

    /// Serialize to a compact JSON string.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::InvalidData(format!("failed to serialize layer: {e}")))
    }

    /// Parse from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| Error::ModelShape(format!("failed to parse layer json: {e}")))
    }
}

impl Mlp {
    /// Save the model into `dir`, one artifact per named layer plus a manifest.
    ///
    /// The directory is created if needed; existing artifacts are overwritten.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::Io(format!("failed to create {}: {e}", dir.display())))?;

        let names = self.layer_names();
        for (name, layer) in names.iter().zip(self.layers()) {
            let ser = SerializedLayer::from_layer(name.clone(), layer);
            let path = dir.join(format!("{name}.json"));
            write_file(&path, &ser.to_json_string()?)?;
            debug!("wrote layer {name} to {}", path.display());
        }

        let manifest = Manifest {
            format_version: MODEL_FORMAT_VERSION,
            layers: names,
        };
        let s = serde_json::to_string_pretty(&manifest)
            .map_err(|e| Error::InvalidData(format!("failed to serialize manifest: {e}")))?;
        write_file(&dir.join(MANIFEST_FILE), &s)?;

        info!("saved model {:?} to {}", self.sizes(), dir.display());
        Ok(())
    }

    /// Load a model saved with [`Mlp::save`].
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let manifest: Manifest = serde_json::from_str(&read_file(&dir.join(MANIFEST_FILE))?)
            .map_err(|e| Error::ModelShape(format!("failed to parse manifest: {e}")))?;

        if manifest.format_version != MODEL_FORMAT_VERSION {
            return Err(Error::ModelShape(format!(
                "unsupported model format_version {}; expected {}",
                manifest.format_version, MODEL_FORMAT_VERSION
            )));
        }
        let n = manifest.layers.len();
        if n == 0 {
            return Err(Error::ModelShape(
                "saved model must have at least one layer".to_owned(),
            ));
        }

        let mut layers = Vec::with_capacity(n);
        for (idx, name) in manifest.layers.iter().enumerate() {
            let expected = layer_name(idx, n);
            if *name != expected {
                return Err(Error::ModelShape(format!(
                    "layer {idx} is named {name}, expected {expected}"
                )));
            }
            let ser = SerializedLayer::from_json_str(&read_file(&dir.join(format!("{name}.json")))?)?;
            if ser.name != *name {
                return Err(Error::ModelShape(format!(
                    "artifact {name}.json holds layer {}",
                    ser.name
                )));
            }
            layers.push(ser.into_layer(Activation::for_position(idx, n))?);
        }

        let mlp = Mlp::from_layers(layers).map_err(|e| match e {
            Error::Dimension(msg) => Error::ModelShape(msg),
            other => other,
        })?;
        info!("loaded model {:?} from {}", mlp.sizes(), dir.display());
        Ok(mlp)
    }

    /// Load a model and check it has exactly the layer sizes `sizes`.
    pub fn load_with_sizes<P: AsRef<Path>>(dir: P, sizes: &[usize]) -> Result<Self> {
        let mlp = Self::load(dir)?;
        if mlp.sizes() != sizes {
            return Err(Error::ModelShape(format!(
                "saved model has sizes {:?}, expected {sizes:?}",
                mlp.sizes()
            )));
        }
        Ok(mlp)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents)
        .map_err(|e| Error::Io(format!("failed to write {}: {e}", path.display())))
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("failed to read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "digit-mlp-serde-{}-{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn save_load_roundtrip_is_bit_identical() {
        let mlp = Mlp::new_with_seed(&[5, 4, 3], 42).unwrap();
        let dir = tmp_dir("roundtrip");
        mlp.save(&dir).unwrap();

        assert!(dir.join("hidden.json").exists());
        assert!(dir.join("output.json").exists());

        let loaded = Mlp::load(&dir).unwrap();
        assert_eq!(loaded.sizes(), mlp.sizes());
        for (a, b) in mlp.layers().iter().zip(loaded.layers()) {
            assert_eq!(a.weights(), b.weights());
            assert_eq!(a.biases(), b.biases());
            assert_eq!(a.activation(), b.activation());
        }

        let x = [0.1_f32, 0.2, 0.3, 0.4, 0.5];
        assert_eq!(mlp.solve(&x).unwrap(), loaded.solve(&x).unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_with_sizes_rejects_other_architecture() {
        let mlp = Mlp::new_with_seed(&[3, 2, 2], 0).unwrap();
        let dir = tmp_dir("sizes");
        mlp.save(&dir).unwrap();

        assert!(Mlp::load_with_sizes(&dir, &[3, 2, 2]).is_ok());
        let err = Mlp::load_with_sizes(&dir, &[3, 4, 2]).unwrap_err();
        assert!(matches!(err, Error::ModelShape(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_rejects_inconsistent_layers() {
        let mlp = Mlp::new_with_seed(&[3, 2, 2], 0).unwrap();
        let dir = tmp_dir("inconsistent");
        mlp.save(&dir).unwrap();

        // Replace the output layer with one that does not chain onto `hidden`.
        let other = Mlp::new_with_seed(&[3, 5, 2], 0).unwrap();
        let bad = SerializedLayer::from_layer("output".to_owned(), other.layer(1).unwrap());
        std::fs::write(dir.join("output.json"), bad.to_json_string().unwrap()).unwrap();

        let err = Mlp::load(&dir).unwrap_err();
        assert!(matches!(err, Error::ModelShape(_)), "{err}");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_wrong_weight_count() {
        let bad = r#"{"name":"output","in_dim":2,"out_dim":2,"weights":[1.0],"biases":[0.0,0.0]}"#;
        let ser = SerializedLayer::from_json_str(bad).unwrap();
        assert!(matches!(
            ser.into_layer(Activation::Softmax),
            Err(Error::ModelShape(_))
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let dir = tmp_dir("version");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(MANIFEST_FILE),
            r#"{"format_version":999,"layers":["output"]}"#,
        )
        .unwrap();
        let err = Mlp::load(&dir).unwrap_err();
        assert!(format!("{err}").contains("format_version"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}

//! Binary matrix cache.
//!
//! Parsing the CSV dataset is slow, so parsed matrices are stored next to it in a
//! small binary format and reloaded on later runs:
//!
//! ```text
//! magic   b"DMAT"
//! version u32 (LE)
//! rows    u64 (LE)
//! cols    u64 (LE)
//! data    rows * cols f32 (LE, row-major)
//! ```
//!
//! Floats are stored as raw IEEE-754 bits, so a reload is bit-identical.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};

use crate::loader::{IMAGE_PIXELS, NUM_CLASSES};
use crate::{Dataset, Error, Inputs, Result};

const MAGIC: &[u8; 4] = b"DMAT";
const VERSION: u32 = 1;
/// magic + version + rows + cols
const HEADER_BYTES: u64 = 4 + 4 + 8 + 8;

pub const TRAIN_FEATURES: &str = "train_x";
pub const TRAIN_LABELS: &str = "train_y";
pub const TEST_FEATURES: &str = "test";

/// A dense row-major `f32` matrix as stored in the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

/// Parsed (pre-PCA) training and test data.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSplits {
    pub train: Dataset,
    pub test: Inputs,
}

/// Path of the artifact for logical name `name` under `dir`.
pub fn artifact_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.mat"))
}

pub fn write_matrix(path: &Path, rows: usize, cols: usize, data: &[f32]) -> Result<()> {
    if data.len() != rows * cols {
        return Err(Error::Dimension(format!(
            "matrix data length {} does not match {rows} x {cols}",
            data.len()
        )));
    }
    let io_err = |e: io::Error| Error::Io(format!("failed to write {}: {e}", path.display()));

    let file = File::create(path).map_err(io_err)?;
    let mut w = BufWriter::new(file);
    w.write_all(MAGIC).map_err(io_err)?;
    w.write_u32::<LittleEndian>(VERSION).map_err(io_err)?;
    w.write_u64::<LittleEndian>(rows as u64).map_err(io_err)?;
    w.write_u64::<LittleEndian>(cols as u64).map_err(io_err)?;
    for &v in data {
        w.write_f32::<LittleEndian>(v).map_err(io_err)?;
    }
    w.flush().map_err(io_err)?;
    debug!("cached {rows}x{cols} matrix at {}", path.display());
    Ok(())
}

pub fn read_matrix(path: &Path) -> Result<Matrix> {
    let file = File::open(path)
        .map_err(|e| Error::Io(format!("failed to open {}: {e}", path.display())))?;
    let file_len = file
        .metadata()
        .map_err(|e| Error::Io(format!("failed to stat {}: {e}", path.display())))?
        .len();
    read_matrix_from(BufReader::new(file), file_len.saturating_sub(HEADER_BYTES))
        .map_err(|e| Error::Parse(format!("{}: {e}", path.display())))
}

/// `data_bytes` is the payload size following the header; the declared shape
/// must account for exactly that many bytes.
fn read_matrix_from<R: Read>(mut r: R, data_bytes: u64) -> std::result::Result<Matrix, String> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(|e| e.to_string())?;
    if &magic != MAGIC {
        return Err("not a cached matrix (bad magic)".to_owned());
    }
    let version = r.read_u32::<LittleEndian>().map_err(|e| e.to_string())?;
    if version != VERSION {
        return Err(format!("unsupported cache version {version}"));
    }
    let rows = r.read_u64::<LittleEndian>().map_err(|e| e.to_string())? as usize;
    let cols = r.read_u64::<LittleEndian>().map_err(|e| e.to_string())? as usize;
    let len = rows
        .checked_mul(cols)
        .ok_or_else(|| format!("matrix shape {rows} x {cols} overflows"))?;
    if (len as u64).checked_mul(4) != Some(data_bytes) {
        return Err(format!(
            "header declares {rows} x {cols} floats but {data_bytes} data bytes follow"
        ));
    }

    let mut data = vec![0.0_f32; len];
    r.read_f32_into::<LittleEndian>(&mut data)
        .map_err(|e| format!("truncated matrix data: {e}"))?;

    let mut rest = [0u8; 1];
    if r.read(&mut rest).map_err(|e| e.to_string())? != 0 {
        return Err("trailing bytes after matrix data".to_owned());
    }

    Ok(Matrix { rows, cols, data })
}

/// Look for cached splits under `dir` holding `train_rows` labeled and
/// `test_rows` unlabeled examples.
///
/// Returns `Ok(None)` when any artifact is missing or was cached with other row
/// counts (a cache miss), and an error when an artifact exists but cannot be
/// read back.
pub fn probe(dir: &Path, train_rows: usize, test_rows: usize) -> Result<Option<RawSplits>> {
    let names = [TRAIN_FEATURES, TRAIN_LABELS, TEST_FEATURES];
    if let Some(missing) = names
        .iter()
        .map(|name| artifact_path(dir, name))
        .find(|path| !path.is_file())
    {
        debug!("cache miss: {} not found", missing.display());
        return Ok(None);
    }

    let x = read_matrix(&artifact_path(dir, TRAIN_FEATURES))?;
    let y = read_matrix(&artifact_path(dir, TRAIN_LABELS))?;
    let test = read_matrix(&artifact_path(dir, TEST_FEATURES))?;

    if x.cols != IMAGE_PIXELS || test.cols != IMAGE_PIXELS || y.cols != NUM_CLASSES {
        return Err(Error::Dimension(format!(
            "cached shapes {}x{}, {}x{}, {}x{} do not match the dataset layout",
            x.rows, x.cols, y.rows, y.cols, test.rows, test.cols
        )));
    }
    if x.rows != y.rows {
        return Err(Error::Dimension(format!(
            "cached train features have {} rows but labels have {}",
            x.rows, y.rows
        )));
    }
    if x.rows != train_rows || test.rows != test_rows {
        info!(
            "cache miss: {} holds {} train and {} test rows, want {train_rows} and {test_rows}",
            dir.display(),
            x.rows,
            test.rows
        );
        return Ok(None);
    }

    let train = Dataset::from_flat(x.data, y.data, x.cols, y.cols)?;
    let test = Inputs::from_flat(test.data, test.cols)?;
    info!(
        "loaded {} train and {} test examples from cache {}",
        train.len(),
        test.len(),
        dir.display()
    );
    Ok(Some(RawSplits { train, test }))
}

/// Write all three artifacts under `dir`, creating it if needed.
pub fn store(dir: &Path, splits: &RawSplits) -> Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::Io(format!("failed to create {}: {e}", dir.display())))?;

    let train = &splits.train;
    write_matrix(
        &artifact_path(dir, TRAIN_FEATURES),
        train.len(),
        train.input_dim(),
        train.inputs().as_flat(),
    )?;
    write_matrix(
        &artifact_path(dir, TRAIN_LABELS),
        train.len(),
        train.target_dim(),
        train.targets(),
    )?;
    write_matrix(
        &artifact_path(dir, TEST_FEATURES),
        splits.test.len(),
        splits.test.input_dim(),
        splits.test.as_flat(),
    )?;
    info!("cached parsed dataset in {}", dir.display());
    Ok(())
}

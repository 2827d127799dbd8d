//! Data preparation for the digit classifier.
//!
//! Parsed data comes from the binary cache when present, otherwise from the CSV
//! files (and is then cached). Features are PCA-reduced, the labeled rows are
//! shuffled and split into a training set and a holdout set.

use std::path::PathBuf;

use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::cache::{self, RawSplits};
use crate::loader::{self, NUM_CLASSES};
use crate::pca::{self, BasisOrder};
use crate::{Dataset, Error, Inputs, NumericWarning, Result};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub train_csv: PathBuf,
    pub test_csv: PathBuf,
    /// Directory for parsed matrices. `None` disables caching.
    pub cache_dir: Option<PathBuf>,
    /// Whether the CSV files start with a header line.
    pub has_header: bool,
    pub train_count: usize,
    pub test_count: usize,
    /// Principal components kept.
    pub components: usize,
    /// `None` fits one basis on train and test stacked together. `Some(order)`
    /// reduces the test features on their own basis.
    pub basis_order: Option<BasisOrder>,
    pub seed: u64,
    pub train_size: usize,
    pub holdout_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            train_csv: PathBuf::from("train.csv"),
            test_csv: PathBuf::from("test.csv"),
            cache_dir: Some(PathBuf::from("cache")),
            has_header: true,
            train_count: 42_000,
            test_count: 28_000,
            components: 40,
            basis_order: None,
            seed: 0,
            train_size: 10_000,
            holdout_size: 10_000,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.components == 0 {
            return Err(Error::InvalidConfig("components must be > 0".to_owned()));
        }
        if self.train_size == 0 {
            return Err(Error::InvalidConfig("train_size must be > 0".to_owned()));
        }
        let needed = self.train_size + self.holdout_size;
        if needed > self.train_count {
            return Err(Error::InvalidConfig(format!(
                "train_size + holdout_size ({needed}) exceeds train_count {}",
                self.train_count
            )));
        }
        Ok(())
    }
}

/// Reduced, shuffled and split data ready for training.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub train: Dataset,
    pub holdout: Dataset,
    /// Unlabeled rows in file order.
    pub test: Inputs,
    pub warnings: Vec<NumericWarning>,
}

/// Parse both CSV files.
pub fn parse(cfg: &PipelineConfig) -> Result<RawSplits> {
    let train = loader::load(&cfg.train_csv, cfg.train_count, true, cfg.has_header)?
        .into_dataset()?;
    let test = loader::load(&cfg.test_csv, cfg.test_count, false, cfg.has_header)?.inputs;
    Ok(RawSplits { train, test })
}

/// Parsed data from the cache, or from the CSV files on a miss.
pub fn raw_splits(cfg: &PipelineConfig) -> Result<RawSplits> {
    let Some(dir) = cfg.cache_dir.as_deref() else {
        return parse(cfg);
    };
    match cache::probe(dir, cfg.train_count, cfg.test_count)? {
        Some(raw) => Ok(raw),
        None => {
            let raw = parse(cfg)?;
            cache::store(dir, &raw)?;
            Ok(raw)
        }
    }
}

pub fn prepare(cfg: &PipelineConfig) -> Result<Prepared> {
    cfg.validate()?;
    let RawSplits { train, test } = raw_splits(cfg)?;
    if train.len() < cfg.train_size + cfg.holdout_size {
        return Err(Error::InvalidData(format!(
            "{} labeled rows available, need {}",
            train.len(),
            cfg.train_size + cfg.holdout_size
        )));
    }

    let n_train = train.len();
    let (train_x, targets) = train.into_parts();

    info!(
        "reducing {} features to {} components",
        train_x.input_dim(),
        cfg.components
    );
    let (train_x, test_x, warnings) = match cfg.basis_order {
        None => {
            let combined = train_x.concat(&test)?;
            drop(train_x);
            let reduced = pca::reduce(&combined, None, cfg.components, BasisOrder::default())?;
            let (train_x, test_x) = reduced.primary.split_at(n_train)?;
            (train_x, test_x, reduced.warnings)
        }
        Some(order) => {
            let reduced = pca::reduce(&train_x, Some(&test), cfg.components, order)?;
            let test_x = reduced.secondary.ok_or_else(|| {
                Error::InvalidData("reduction returned no test projection".to_owned())
            })?;
            (reduced.primary, test_x, reduced.warnings)
        }
    };

    let mut labeled = Dataset::from_inputs(train_x, targets, NUM_CLASSES)?;
    labeled.shuffle(&mut StdRng::seed_from_u64(cfg.seed));
    let (train, rest) = labeled.split_at(cfg.train_size)?;
    let (holdout, _) = rest.split_at(cfg.holdout_size)?;

    info!(
        "prepared {} train, {} holdout and {} test rows",
        train.len(),
        holdout.len(),
        test_x.len()
    );
    Ok(Prepared {
        train,
        holdout,
        test: test_x,
        warnings,
    })
}

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use env_logger::Env;

use digit_mlp::pca::BasisOrder;
use digit_mlp::{Error, Optimizer, PipelineConfig, Result, Shuffle, TrainConfig};

#[derive(Parser, Debug)]
#[command(name = "digit-mlp", about = "Train and run an MLP digit classifier on PCA-reduced images")]
pub struct Cli {
    /// level of logging details (into stderr), overridden by RUST_LOG
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// labeled training CSV (label followed by 784 pixels)
    #[arg(long, default_value = "train.csv")]
    pub train_csv: PathBuf,

    /// unlabeled test CSV (784 pixels)
    #[arg(long, default_value = "test.csv")]
    pub test_csv: PathBuf,

    /// directory for the parsed-data cache
    #[arg(long, default_value = "cache")]
    pub cache_dir: PathBuf,

    /// do not read or write the parsed-data cache
    #[arg(long)]
    pub no_cache: bool,

    /// the CSV files have no header line
    #[arg(long)]
    pub no_header: bool,

    /// rows to read from the training CSV
    #[arg(long, default_value_t = 42_000)]
    pub train_count: usize,

    /// rows to read from the test CSV
    #[arg(long, default_value_t = 28_000)]
    pub test_count: usize,

    /// principal components kept
    #[arg(short = 'k', long, default_value_t = 40)]
    pub components: usize,

    /// reduce the test features on their own basis instead of jointly with the training features
    #[arg(long, value_enum)]
    pub separate_basis: Option<BasisOrderArg>,

    /// hidden layer sizes separated by commas
    #[arg(long, value_delimiter = ',', default_value = "20")]
    pub hidden: Vec<usize>,

    /// learning rate
    #[arg(long, default_value_t = 0.1)]
    pub learning_rate: f32,

    /// learning momentum, must be larger or equal to 0 and smaller than 1
    #[arg(long, default_value_t = 0.0)]
    pub momentum: f32,

    /// training stops once the epoch-average loss is below this value
    #[arg(long, default_value_t = 0.005)]
    pub threshold: f32,

    /// maximum number of training epochs
    #[arg(long, default_value_t = 1000)]
    pub max_epochs: usize,

    /// seed for weight initialization and shuffling
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// labeled rows used for training
    #[arg(long, default_value_t = 10_000)]
    pub train_size: usize,

    /// labeled rows held out for evaluation
    #[arg(long, default_value_t = 10_000)]
    pub holdout_size: usize,

    /// write predictions for the test CSV to this file ("-" for stdout) instead of evaluating
    #[arg(long)]
    pub submission: Option<PathBuf>,

    /// directory to save the trained model to
    #[arg(long)]
    pub save_model: Option<PathBuf>,

    /// directory to load a trained model from instead of training
    #[arg(long)]
    pub load_model: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn filter(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "digit_mlp=error",
            LogLevel::Warn => "digit_mlp=warn",
            LogLevel::Info => "digit_mlp=info",
            LogLevel::Debug => "digit_mlp=debug",
            LogLevel::Trace => "digit_mlp=trace",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BasisOrderArg {
    Independent,
    ReusePrimary,
}

impl From<BasisOrderArg> for BasisOrder {
    fn from(arg: BasisOrderArg) -> Self {
        match arg {
            BasisOrderArg::Independent => BasisOrder::Independent,
            BasisOrderArg::ReusePrimary => BasisOrder::ReusePrimary,
        }
    }
}

/// Parse arguments and set up logging.
pub fn init() -> Cli {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(cli.log_level.filter())).init();
    cli
}

impl Cli {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            train_csv: self.train_csv.clone(),
            test_csv: self.test_csv.clone(),
            cache_dir: (!self.no_cache).then(|| self.cache_dir.clone()),
            has_header: !self.no_header,
            train_count: self.train_count,
            test_count: self.test_count,
            components: self.components,
            basis_order: self.separate_basis.map(BasisOrder::from),
            seed: self.seed,
            train_size: self.train_size,
            holdout_size: self.holdout_size,
        }
    }

    pub fn train_config(&self) -> Result<TrainConfig> {
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(Error::InvalidConfig(format!(
                "momentum must be in [0, 1), got {}",
                self.momentum
            )));
        }
        let optimizer = if self.momentum > 0.0 {
            Optimizer::SgdMomentum {
                momentum: self.momentum,
            }
        } else {
            Optimizer::Sgd
        };
        let cfg = TrainConfig {
            threshold: self.threshold,
            max_epochs: self.max_epochs,
            lr: self.learning_rate,
            optimizer,
            shuffle: Shuffle::Seeded(self.seed),
            ..TrainConfig::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Layer sizes `[components, hidden..., classes]`.
    pub fn layer_sizes(&self, classes: usize) -> Result<Vec<usize>> {
        if self.hidden.contains(&0) {
            return Err(Error::InvalidConfig(
                "hidden layer sizes must be > 0".to_owned(),
            ));
        }
        let mut sizes = Vec::with_capacity(self.hidden.len() + 2);
        sizes.push(self.components);
        sizes.extend_from_slice(&self.hidden);
        sizes.push(classes);
        Ok(sizes)
    }
}

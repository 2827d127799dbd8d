use std::fmt;

#[derive(Debug, Clone)]
pub enum Error {
    InvalidData(String),
    InvalidConfig(String),
    /// Malformed dataset row or cache file.
    Parse(String),
    /// Shape mismatch between layers, inputs and model, or PCA component count.
    Dimension(String),
    /// Saved model incompatible with the expected architecture.
    ModelShape(String),
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Error::Parse(msg) => write!(f, "parse error: {msg}"),
            Error::Dimension(msg) => write!(f, "dimension mismatch: {msg}"),
            Error::ModelShape(msg) => write!(f, "model shape mismatch: {msg}"),
            Error::Io(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Non-fatal numeric conditions. These are logged and reported alongside a
/// result, never returned as an `Err`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericWarning {
    /// A covariance eigenvalue came out negative beyond rounding tolerance.
    NegativeEigenvalue { index: usize, value: f64 },
    /// A retained component carries (almost) no variance.
    NearSingularCovariance { index: usize, value: f64 },
}

impl fmt::Display for NumericWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericWarning::NegativeEigenvalue { index, value } => {
                write!(f, "eigenvalue {index} is negative ({value:.3e})")
            }
            NumericWarning::NearSingularCovariance { index, value } => {
                write!(
                    f,
                    "retained component {index} has near-zero variance ({value:.3e})"
                )
            }
        }
    }
}

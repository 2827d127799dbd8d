//! CSV dataset loader.
//!
//! One example per line: an optional class label followed by `IMAGE_PIXELS`
//! pixel intensities in `0..=255`. Pixels are normalized and inverted to `[0, 1]`.

use std::io;
use std::path::Path;

use log::{debug, info};

use crate::{Dataset, Error, Inputs, Result};

/// Pixels per 28x28 image.
pub const IMAGE_PIXELS: usize = 28 * 28;
/// Digit classes.
pub const NUM_CLASSES: usize = 10;

/// Map a raw intensity to `(255 - p) / 255`: 0 becomes 1.0 and 255 becomes 0.0.
#[inline]
pub fn normalize_pixel(p: u8) -> f32 {
    (255.0 - f32::from(p)) / 255.0
}

/// Parsed dataset file.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub inputs: Inputs,
    /// Class ids, present when the file carries a label column.
    pub labels: Option<Vec<usize>>,
}

impl Loaded {
    /// Pair the inputs with one-hot targets. Fails if the file had no labels.
    pub fn into_dataset(self) -> Result<Dataset> {
        let labels = self
            .labels
            .ok_or_else(|| Error::InvalidData("dataset has no labels".to_owned()))?;
        Dataset::from_labels(self.inputs, &labels, NUM_CLASSES)
    }
}

/// Load exactly `count` examples from a CSV file.
///
/// Blank lines are skipped and do not consume a row. A file holding fewer than
/// `count` examples is a parse error; extra examples are ignored.
pub fn load<P: AsRef<Path>>(
    path: P,
    count: usize,
    with_labels: bool,
    has_header: bool,
) -> Result<Loaded> {
    let path = path.as_ref();
    info!("reading {count} examples from {}", path.display());
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Io(format!("failed to open {}: {e}", path.display())))?;
    load_from_reader(io::BufReader::new(file), count, with_labels, has_header)
        .map_err(|e| match e {
            Error::Parse(msg) => Error::Parse(format!("{}: {msg}", path.display())),
            other => other,
        })
}

/// Same as [`load`], reading from any byte stream.
pub fn load_from_reader<R: io::Read>(
    reader: R,
    count: usize,
    with_labels: bool,
    has_header: bool,
) -> Result<Loaded> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let fields = IMAGE_PIXELS + usize::from(with_labels);
    let mut pixels = Vec::with_capacity(count * IMAGE_PIXELS);
    let mut labels = with_labels.then(|| Vec::with_capacity(count));
    let mut rows = 0;

    for result in rdr.records() {
        if rows == count {
            break;
        }
        let record = result.map_err(|e| {
            if e.is_io_error() {
                Error::Io(e.to_string())
            } else {
                Error::Parse(e.to_string())
            }
        })?;
        let line = record.position().map_or(0, |p| p.line());

        // Whitespace-only lines come through as a single empty field.
        if record.len() == 1 && record[0].is_empty() {
            debug!("skipping blank line {line}");
            continue;
        }
        if record.len() != fields {
            return Err(Error::Parse(format!(
                "line {line}: expected {fields} fields, found {}",
                record.len()
            )));
        }

        let mut fields_iter = record.iter();
        if let Some(labels) = labels.as_mut() {
            let raw = fields_iter.next().unwrap_or_default();
            let label: usize = raw
                .parse()
                .map_err(|_| Error::Parse(format!("line {line}: invalid label {raw:?}")))?;
            if label >= NUM_CLASSES {
                return Err(Error::Parse(format!(
                    "line {line}: label {label} is not a digit"
                )));
            }
            labels.push(label);
        }
        for raw in fields_iter {
            let p: u8 = raw.parse().map_err(|_| {
                Error::Parse(format!("line {line}: invalid pixel value {raw:?}"))
            })?;
            pixels.push(normalize_pixel(p));
        }
        rows += 1;
    }

    if rows < count {
        return Err(Error::Parse(format!(
            "expected {count} examples, found {rows}"
        )));
    }

    debug!("parsed {rows} examples");
    Ok(Loaded {
        inputs: Inputs::from_flat(pixels, IMAGE_PIXELS)?,
        labels,
    })
}

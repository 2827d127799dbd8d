//! PCA dimensionality reduction.
//!
//! Data is centered on its per-feature mean, the sample covariance (`n - 1`
//! denominator) is decomposed with a symmetric eigensolver, and the rows are
//! projected onto the eigenvectors with the largest eigenvalues.
//!
//! The covariance is symmetric, so eigenpairs are always real. Eigenvectors are
//! only defined up to sign.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use crate::{Error, Inputs, NumericWarning, Result};

/// Relative tolerance (against the largest eigenvalue) below which an
/// eigenvalue is treated as zero.
const EIGEN_TOL: f64 = 1e-10;

/// How the second matrix passed to [`reduce`] orders its eigenpairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BasisOrder {
    /// Sort the second matrix's eigenpairs by its own eigenvalues.
    #[default]
    Independent,
    /// Reorder the second matrix's eigenvectors with the permutation that sorts
    /// the *first* matrix's eigenvalues. The eigensolver returns pairs in no
    /// particular order, so the retained basis is generally not the top-k of the
    /// second matrix. Kept for reproducing older outputs.
    ReusePrimary,
}

/// A fitted projection: mean vector plus the top-k eigenvectors as columns.
#[derive(Debug, Clone)]
pub struct PcaBasis {
    mean: DVector<f64>,
    /// Shape (d, k); column `j` is the `j`-th principal direction.
    components: DMatrix<f64>,
    eigenvalues: Vec<f64>,
}

/// Result of [`reduce`].
#[derive(Debug, Clone)]
pub struct Reduction {
    /// The first matrix projected onto its top-k basis.
    pub primary: Inputs,
    /// The second matrix projected onto its own basis, when one was supplied.
    pub secondary: Option<Inputs>,
    /// Retained eigenvalues of the first matrix, descending.
    pub eigenvalues: Vec<f64>,
    pub warnings: Vec<NumericWarning>,
}

/// Full decomposition of one matrix, before truncation.
struct Decomposition {
    mean: DVector<f64>,
    centered: DMatrix<f64>,
    eigenvectors: DMatrix<f64>,
    eigenvalues: DVector<f64>,
}

impl Decomposition {
    fn new(data: &Inputs) -> Result<Self> {
        let n = data.len();
        if n < 2 {
            return Err(Error::InvalidData(format!(
                "pca needs at least 2 rows, got {n}"
            )));
        }
        let d = data.input_dim();

        let mut centered =
            DMatrix::from_row_iterator(n, d, data.as_flat().iter().map(|&v| f64::from(v)));
        let mean = centered.row_mean().transpose();
        for j in 0..d {
            let m = mean[j];
            for v in centered.column_mut(j).iter_mut() {
                *v -= m;
            }
        }

        let cov = centered.tr_mul(&centered) / (n - 1) as f64;
        debug!("decomposing {d}x{d} covariance of {n} rows");
        let eig = cov.symmetric_eigen();

        Ok(Self {
            mean,
            centered,
            eigenvectors: eig.eigenvectors,
            eigenvalues: eig.eigenvalues,
        })
    }

    /// Indices of the eigenvalues, largest first.
    fn descending_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.eigenvalues.len()).collect();
        order.sort_by(|&a, &b| self.eigenvalues[b].total_cmp(&self.eigenvalues[a]));
        order
    }

    fn basis(&self, order: &[usize], k: usize, warnings: &mut Vec<NumericWarning>) -> PcaBasis {
        let d = self.eigenvectors.nrows();
        let components = DMatrix::from_fn(d, k, |r, c| self.eigenvectors[(r, order[c])]);
        let eigenvalues: Vec<f64> = order[..k].iter().map(|&i| self.eigenvalues[i]).collect();

        let scale = self.eigenvalues.amax().max(f64::MIN_POSITIVE);
        for (index, &value) in self.eigenvalues.iter().enumerate() {
            if value < -EIGEN_TOL * scale {
                warnings.push(NumericWarning::NegativeEigenvalue { index, value });
            }
        }
        for (index, &value) in eigenvalues.iter().enumerate() {
            if value.abs() <= EIGEN_TOL * scale {
                warnings.push(NumericWarning::NearSingularCovariance { index, value });
            }
        }

        PcaBasis {
            mean: self.mean.clone(),
            components,
            eigenvalues,
        }
    }
}

impl PcaBasis {
    /// Fit a `k`-component basis to `data`.
    pub fn fit(data: &Inputs, k: usize) -> Result<(Self, Vec<NumericWarning>)> {
        check_components(data.input_dim(), k)?;
        let dec = Decomposition::new(data)?;
        let mut warnings = Vec::new();
        let basis = dec.basis(&dec.descending_order(), k, &mut warnings);
        log_warnings(&warnings);
        Ok((basis, warnings))
    }

    #[inline]
    pub fn components(&self) -> usize {
        self.components.ncols()
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.components.nrows()
    }

    #[inline]
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Retained eigenvalues, largest first.
    #[inline]
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    /// Center `data` on this basis' mean and project it: `(n, d) -> (n, k)`.
    pub fn project(&self, data: &Inputs) -> Result<Inputs> {
        if data.input_dim() != self.input_dim() {
            return Err(Error::Dimension(format!(
                "data has {} features, basis expects {}",
                data.input_dim(),
                self.input_dim()
            )));
        }
        let mut x =
            DMatrix::from_row_iterator(data.len(), self.input_dim(), data.as_flat().iter().map(|&v| f64::from(v)));
        for j in 0..x.ncols() {
            let m = self.mean[j];
            for v in x.column_mut(j).iter_mut() {
                *v -= m;
            }
        }
        to_inputs(&(x * &self.components))
    }

    /// Map projected rows back to feature space: `(n, k) -> (n, d)`.
    pub fn reconstruct(&self, projected: &Inputs) -> Result<Inputs> {
        if projected.input_dim() != self.components() {
            return Err(Error::Dimension(format!(
                "projected data has {} columns, basis has {} components",
                projected.input_dim(),
                self.components()
            )));
        }
        let y = DMatrix::from_row_iterator(
            projected.len(),
            self.components(),
            projected.as_flat().iter().map(|&v| f64::from(v)),
        );
        let mut x = y * self.components.transpose();
        for j in 0..x.ncols() {
            let m = self.mean[j];
            for v in x.column_mut(j).iter_mut() {
                *v += m;
            }
        }
        to_inputs(&x)
    }
}

/// Reduce `a` (and optionally `b`) to `k` principal components.
///
/// `a` is projected onto its own top-k basis. `b` is centered on its own mean and
/// projected onto its own eigenvectors, ordered according to `order`.
pub fn reduce(a: &Inputs, b: Option<&Inputs>, k: usize, order: BasisOrder) -> Result<Reduction> {
    check_components(a.input_dim(), k)?;
    if let Some(b) = b {
        if b.input_dim() != a.input_dim() {
            return Err(Error::Dimension(format!(
                "second matrix has {} features, first has {}",
                b.input_dim(),
                a.input_dim()
            )));
        }
    }

    let mut warnings = Vec::new();

    let dec_a = Decomposition::new(a)?;
    let order_a = dec_a.descending_order();
    let basis_a = dec_a.basis(&order_a, k, &mut warnings);
    let primary = to_inputs(&(&dec_a.centered * &basis_a.components))?;
    drop(dec_a);

    let secondary = match b {
        None => None,
        Some(b) => {
            let dec_b = Decomposition::new(b)?;
            let order_b = match order {
                BasisOrder::Independent => dec_b.descending_order(),
                BasisOrder::ReusePrimary => order_a.clone(),
            };
            let basis_b = dec_b.basis(&order_b, k, &mut warnings);
            Some(to_inputs(&(&dec_b.centered * &basis_b.components))?)
        }
    };

    log_warnings(&warnings);
    debug!(
        "reduced {} features to {k} components (top eigenvalue {:.4e})",
        a.input_dim(),
        basis_a.eigenvalues.first().copied().unwrap_or(0.0)
    );

    Ok(Reduction {
        primary,
        secondary,
        eigenvalues: basis_a.eigenvalues,
        warnings,
    })
}

fn check_components(d: usize, k: usize) -> Result<()> {
    if k == 0 || k > d {
        return Err(Error::Dimension(format!(
            "component count {k} must be in 1..={d}"
        )));
    }
    Ok(())
}

fn log_warnings(warnings: &[NumericWarning]) {
    for w in warnings {
        warn!("pca: {w}");
    }
}

fn to_inputs(m: &DMatrix<f64>) -> Result<Inputs> {
    let mut flat = Vec::with_capacity(m.nrows() * m.ncols());
    for row in m.row_iter() {
        flat.extend(row.iter().map(|&v| v as f32));
    }
    Inputs::from_flat(flat, m.ncols())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_inputs(rows: usize, cols: usize, seed: u64) -> Inputs {
        let mut rng = StdRng::seed_from_u64(seed);
        let data: Vec<f32> = (0..rows * cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
        Inputs::from_flat(data, cols).unwrap()
    }

    /// Rows spread along feature 0 with scale `s0` and feature 1 with scale `s1`.
    fn stretched(rows: usize, s0: f32, s1: f32, seed: u64) -> Inputs {
        let mut rng = StdRng::seed_from_u64(seed);
        let data: Vec<f32> = (0..rows)
            .flat_map(|_| {
                [
                    s0 * rng.gen_range(-1.0..1.0),
                    s1 * rng.gen_range(-1.0..1.0),
                    0.01 * rng.gen_range(-1.0..1.0),
                ]
            })
            .collect();
        Inputs::from_flat(data, 3).unwrap()
    }

    fn column_variance(x: &Inputs, j: usize) -> f32 {
        let n = x.len() as f32;
        let mean = x.rows().map(|r| r[j]).sum::<f32>() / n;
        x.rows().map(|r| (r[j] - mean).powi(2)).sum::<f32>() / (n - 1.0)
    }

    #[test]
    fn output_has_k_columns() {
        let a = random_inputs(20, 5, 0);
        for k in 1..=5 {
            let r = reduce(&a, None, k, BasisOrder::Independent).unwrap();
            assert_eq!(r.primary.input_dim(), k);
            assert_eq!(r.primary.len(), 20);
            assert_eq!(r.eigenvalues.len(), k);
        }
    }

    #[test]
    fn too_many_components_is_a_dimension_error() {
        let a = random_inputs(10, 3, 0);
        assert!(matches!(
            reduce(&a, None, 4, BasisOrder::Independent),
            Err(Error::Dimension(_))
        ));
        assert!(matches!(
            reduce(&a, None, 0, BasisOrder::Independent),
            Err(Error::Dimension(_))
        ));
    }

    #[test]
    fn needs_two_rows() {
        let a = random_inputs(1, 3, 0);
        assert!(matches!(
            reduce(&a, None, 1, BasisOrder::Independent),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn full_basis_roundtrip_reconstructs_input() {
        let a = random_inputs(30, 4, 1);
        let (basis, _) = PcaBasis::fit(&a, 4).unwrap();
        let back = basis.reconstruct(&basis.project(&a).unwrap()).unwrap();
        for (x, y) in a.as_flat().iter().zip(back.as_flat()) {
            assert!((x - y).abs() < 1e-4, "{x} vs {y}");
        }
    }

    #[test]
    fn eigenvalues_are_descending() {
        let a = stretched(200, 3.0, 1.0, 2);
        let r = reduce(&a, None, 3, BasisOrder::Independent).unwrap();
        assert!(r.eigenvalues.windows(2).all(|w| w[0] >= w[1]));
        assert!(column_variance(&r.primary, 0) >= column_variance(&r.primary, 1));
    }

    #[test]
    fn single_axis_variance_projects_onto_that_axis() {
        let ts = [-2.0_f32, -1.0, 0.5, 1.5, 4.0];
        let rows: Vec<Vec<f32>> = ts.iter().map(|&t| vec![t, 3.0, -1.0]).collect();
        let a = Inputs::from_rows(&rows).unwrap();
        let mean = ts.iter().sum::<f32>() / ts.len() as f32;

        let r = reduce(&a, None, 1, BasisOrder::Independent).unwrap();
        assert_eq!(r.primary.input_dim(), 1);

        let col: Vec<f32> = r.primary.rows().map(|row| row[0]).collect();
        let sign = if col[0] * (ts[0] - mean) >= 0.0 { 1.0 } else { -1.0 };
        for (&c, &t) in col.iter().zip(&ts) {
            assert!((sign * c - (t - mean)).abs() < 1e-4);
        }
    }

    #[test]
    fn constant_features_produce_near_singular_warning() {
        let rows: Vec<Vec<f32>> = (0..6).map(|i| vec![i as f32, 5.0]).collect();
        let a = Inputs::from_rows(&rows).unwrap();
        let r = reduce(&a, None, 2, BasisOrder::Independent).unwrap();
        assert!(
            r.warnings
                .iter()
                .any(|w| matches!(w, NumericWarning::NearSingularCovariance { index: 1, .. }))
        );
    }

    #[test]
    fn secondary_is_projected_on_its_own_basis() {
        let a = stretched(200, 3.0, 1.0, 3);
        // The second matrix varies mostly along feature 1.
        let b = stretched(150, 1.0, 4.0, 4);

        let r = reduce(&a, Some(&b), 2, BasisOrder::Independent).unwrap();
        let bp = r.secondary.unwrap();
        assert_eq!(bp.len(), 150);
        assert_eq!(bp.input_dim(), 2);
        assert!(column_variance(&bp, 0) > column_variance(&bp, 1));
        assert!(column_variance(&bp, 0) > 3.0);
    }

    #[test]
    fn reuse_primary_order_matches_independent_for_identical_data() {
        let a = stretched(100, 2.0, 1.0, 5);
        let ind = reduce(&a, Some(&a), 2, BasisOrder::Independent).unwrap();
        let reuse = reduce(&a, Some(&a), 2, BasisOrder::ReusePrimary).unwrap();
        assert_eq!(ind.secondary, reuse.secondary);
    }

    /// Rows `±s[j] * e_j`, two per axis: zero mean and an exactly diagonal covariance.
    fn axis_aligned(scales: [f32; 3]) -> Inputs {
        let mut rows = Vec::new();
        for (j, &scale) in scales.iter().enumerate() {
            for sign in [1.0_f32, -1.0] {
                let mut row = vec![0.0; 3];
                row[j] = sign * scale;
                rows.push(row);
            }
        }
        Inputs::from_rows(&rows).unwrap()
    }

    #[test]
    fn reuse_primary_keeps_first_matrix_permutation() {
        // A varies most along axis 0, B along axis 2.
        let a = axis_aligned([3.0, 2.0, 1.0]);
        let b = axis_aligned([1.0, 2.0, 3.0]);

        let dec_a = Decomposition::new(&a).unwrap();
        let dec_b = Decomposition::new(&b).unwrap();
        let order_a = dec_a.descending_order();
        assert_ne!(order_a, dec_b.descending_order());

        let reuse = reduce(&a, Some(&b), 2, BasisOrder::ReusePrimary)
            .unwrap()
            .secondary
            .unwrap();
        for (j, &idx) in order_a[..2].iter().enumerate() {
            let expected = &dec_b.centered * dec_b.eigenvectors.column(idx);
            for (i, row) in reuse.rows().enumerate() {
                assert!((f64::from(row[j]) - expected[i]).abs() < 1e-5);
            }
        }

        // B's first column lies along A's top axis (0), where B has little variance.
        let independent = reduce(&a, Some(&b), 2, BasisOrder::Independent)
            .unwrap()
            .secondary
            .unwrap();
        assert!((column_variance(&reuse, 0) - 0.4).abs() < 1e-4);
        assert!((column_variance(&independent, 0) - 3.6).abs() < 1e-4);
    }

    #[test]
    fn negative_eigenvalues_are_reported() {
        let dec = Decomposition {
            mean: DVector::zeros(2),
            centered: DMatrix::zeros(2, 2),
            eigenvectors: DMatrix::identity(2, 2),
            eigenvalues: DVector::from_vec(vec![2.0, -0.5]),
        };
        let mut warnings = Vec::new();
        let basis = dec.basis(&dec.descending_order(), 1, &mut warnings);
        assert_eq!(basis.eigenvalues(), &[2.0]);
        assert_eq!(
            warnings,
            vec![NumericWarning::NegativeEigenvalue {
                index: 1,
                value: -0.5
            }]
        );
    }

    #[test]
    fn secondary_must_match_feature_count() {
        let a = random_inputs(10, 3, 0);
        let b = random_inputs(10, 4, 0);
        assert!(matches!(
            reduce(&a, Some(&b), 2, BasisOrder::Independent),
            Err(Error::Dimension(_))
        ));
    }
}

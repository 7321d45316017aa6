use super::{FeatureLayer, PcaConfig};
use crate::error::{FeatureError, Result};
use facerec_core::{io, linalg, Matrix};
use std::io::{Read, Write};

/// Principal Component Analysis.
///
/// After [`compute`](FeatureLayer::compute), `w` holds the orthonormal basis
/// (`rows x k`, leading component first) and `d` the matching eigenvalues of
/// the sample covariance (`k x 1`, descending).
#[derive(Debug, Clone, Default)]
pub struct PcaLayer {
    pub config: PcaConfig,
    pub w: Option<Matrix>,
    pub d: Option<Matrix>,
}

/// Eigenvalues below this fraction of the largest one are treated as zero.
const RELATIVE_EIGEN_FLOOR: f64 = 1e-10;

/// Leading eigenpairs of a symmetric matrix, descending, positive eigenvalues only.
fn descending_positive(m: &Matrix) -> Result<(Vec<f64>, Matrix)> {
    let eig = linalg::eigen(m)?;
    let n = eig.values.rows();
    let largest = eig.values.as_slice().iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let floor = RELATIVE_EIGEN_FLOOR * largest;

    // Ascending -> descending, dropping the null space
    let order: Vec<usize> = (0..n).rev().filter(|&i| eig.values[(i, 0)] > floor).collect();
    if order.is_empty() {
        return Err(FeatureError::NoVariance);
    }
    if order.len() < n {
        log::debug!("Discarding {} non-positive eigenvalues", n - order.len());
    }

    let values = order.iter().map(|&i| eig.values[(i, 0)]).collect();
    let mut vectors = Matrix::zeros(eig.vectors.rows(), order.len())?;
    for (j, &i) in order.iter().enumerate() {
        vectors.assign_column(j, &eig.vectors, i)?;
    }
    Ok((values, vectors))
}

impl PcaLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(config: PcaConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    fn basis(&self) -> Result<&Matrix> {
        self.w.as_ref().ok_or(FeatureError::NotComputed("PCA"))
    }

    /// Solves the small `n x n` problem on `A^T A` and lifts each eigenvector
    /// back to pixel space with `A v / |A v|`.
    fn snapshot(a: &Matrix) -> Result<(Vec<f64>, Matrix)> {
        let mut l = linalg::product_transposed(a, a)?;
        l.elem_mult(1.0 / (a.cols() - 1).max(1) as f64);
        let (values, v) = descending_positive(&l)?;

        let mut w = linalg::product(a, &v)?;
        for j in 0..w.cols() {
            let norm = w.column(j).iter().map(|x| x * x).sum::<f64>().sqrt();
            w.column_mut(j).iter_mut().for_each(|x| *x /= norm);
        }
        Ok((values, w))
    }
}

impl FeatureLayer for PcaLayer {
    fn name(&self) -> &'static str {
        "PCA"
    }

    fn compute(&mut self, x: &Matrix, labels: &[usize], num_classes: usize) -> Result<Option<Matrix>> {
        self.validate_inputs(x, labels, num_classes)?;

        let (values, vectors) = if x.rows() > x.cols() {
            let mut a = x.copy();
            a.subtract_columns(&x.mean_column())?;
            log::debug!("PCA: {}x{} sample-space eigenproblem", x.cols(), x.cols());
            Self::snapshot(&a)?
        } else {
            log::debug!("PCA: {}x{} covariance eigenproblem", x.rows(), x.rows());
            descending_positive(&linalg::covariance(x)?)?
        };

        let k = self.config.select(&values)?;
        let w = vectors.copy_columns(0, k)?;
        let d = Matrix::from_column_major(k, 1, values[..k].to_vec())?;
        log::info!(
            "PCA: kept {} of {} components ({} pixels, {} samples)",
            k,
            values.len(),
            x.rows(),
            x.cols()
        );

        self.w = Some(w.copy());
        self.d = Some(d);
        Ok(Some(w))
    }

    /// `W^T X`.
    fn project(&self, x: &Matrix) -> Result<Matrix> {
        Ok(linalg::product_transposed(self.basis()?, x)?)
    }

    fn save(&self, w: &mut dyn Write) -> Result<()> {
        let d = self.d.as_ref().ok_or(FeatureError::NotComputed("PCA"))?;
        io::write_binary(self.basis()?, w)?;
        io::write_binary(d, w)?;
        Ok(())
    }

    fn load(&mut self, r: &mut dyn Read) -> Result<()> {
        let w = io::read_binary(r)?;
        let d = io::read_binary(r)?;
        if d.dims() != (w.cols(), 1) {
            return Err(FeatureError::InvalidInput(format!(
                "PCA eigenvalues are {}x{}, basis has {} columns",
                d.rows(),
                d.cols(),
                w.cols()
            )));
        }
        self.w = Some(w);
        self.d = Some(d);
        Ok(())
    }

    fn describe(&self) -> String {
        match (&self.w, &self.d) {
            (Some(w), Some(d)) => {
                let total: f64 = d.as_slice().iter().sum();
                format!(
                    "PCA\n  pixels: {}\n  components: {}\n  leading eigenvalue: {:.6}\n  retained variance: {:.6}",
                    w.rows(),
                    w.cols(),
                    d[(0, 0)],
                    total
                )
            }
            _ => format!("PCA (not computed, components: {:?})", self.config.components),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::ComponentCount;
    use approx::assert_abs_diff_eq;

    fn assert_orthonormal(w: &Matrix) {
        let g = linalg::product_transposed(w, w).unwrap();
        for i in 0..g.rows() {
            for j in 0..g.cols() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(g[(i, j)], expected, epsilon = 1e-10);
            }
        }
    }

    /// Leading eigenvectors agree up to sign.
    fn assert_same_subspace(a: &Matrix, b: &Matrix) {
        assert_eq!(a.dims(), b.dims());
        for j in 0..a.cols() {
            let dot: f64 = a.column(j).iter().zip(b.column(j)).map(|(x, y)| x * y).sum();
            assert_abs_diff_eq!(dot.abs(), 1.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_covariance_path() {
        // More samples than pixels
        let x = Matrix::random_normal_seeded(3, 20, 5).unwrap();
        let mut pca = PcaLayer::new();
        let w = pca.compute(&x, &[0; 20], 1).unwrap().unwrap();
        assert_eq!(w.dims(), (3, 3));
        assert_orthonormal(&w);

        let d = pca.d.as_ref().unwrap();
        assert!(d.as_slice().windows(2).all(|p| p[0] >= p[1]));

        // Eigenvalues are the variances along the basis
        let c = linalg::covariance(&x).unwrap();
        let cw = linalg::product(&c, &w).unwrap();
        for j in 0..3 {
            for i in 0..3 {
                assert_abs_diff_eq!(cw[(i, j)], d[(j, 0)] * w[(i, j)], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_snapshot_matches_covariance() {
        // More pixels than samples: rank is at most cols - 1
        let x = Matrix::random_normal_seeded(12, 5, 8).unwrap();
        let mut pca = PcaLayer::new();
        let w = pca.compute(&x, &[0, 0, 1, 1, 1], 2).unwrap().unwrap();
        assert_eq!(w.dims(), (12, 4));
        assert_orthonormal(&w);

        let direct = linalg::eigen(&linalg::covariance(&x).unwrap()).unwrap();
        let mut leading = direct.vectors.copy_columns(8, 12).unwrap();
        leading.flip_columns();
        assert_same_subspace(&w, &leading);

        let d = pca.d.as_ref().unwrap();
        for j in 0..4 {
            assert_abs_diff_eq!(d[(j, 0)], direct.values[(11 - j, 0)], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_fixed_components_and_projection() {
        let x = Matrix::random_normal_seeded(6, 4, 3).unwrap();
        let mut pca = PcaLayer::with_params(PcaConfig::with_params(ComponentCount::Fixed(2)));
        pca.compute(&x, &[0, 1, 2, 3], 4).unwrap();
        let p = pca.project(&x).unwrap();
        assert_eq!(p.dims(), (2, 4));
    }

    #[test]
    fn test_constant_data_has_no_variance() {
        let x = Matrix::ones(4, 3).unwrap();
        let mut pca = PcaLayer::new();
        assert!(matches!(pca.compute(&x, &[0, 0, 0], 1), Err(FeatureError::NoVariance)));
        assert!(matches!(pca.project(&x), Err(FeatureError::NotComputed("PCA"))));
    }

    #[test]
    fn test_save_load_round_trip() {
        let x = Matrix::random_normal_seeded(5, 7, 12).unwrap();
        let mut pca = PcaLayer::new();
        pca.compute(&x, &[0; 7], 1).unwrap();

        let mut buf = Vec::new();
        pca.save(&mut buf).unwrap();
        let mut loaded = PcaLayer::new();
        loaded.load(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded.w, pca.w);
        assert_eq!(loaded.d, pca.d);
        assert_eq!(loaded.project(&x).unwrap(), pca.project(&x).unwrap());
        assert!(loaded.describe().starts_with("PCA\n"));
    }
}

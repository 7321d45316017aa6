//! Per-entry transforms, reductions and column bookkeeping.
//!
//! None of these dispatch to a backend: they are host loops on every build.
//! In-place operations mark any device mirror stale.

use crate::error::{FaceCoreError, Result};
use crate::matrix::Matrix;

impl Matrix {
    fn ensure_same_dims(&self, other: &Matrix, op: &str) -> Result<()> {
        if self.dims() != other.dims() {
            return Err(FaceCoreError::InvalidDimensions(format!(
                "{}: {}x{} vs {}x{}",
                op,
                self.rows(),
                self.cols(),
                other.rows(),
                other.cols()
            )));
        }
        Ok(())
    }

    // --- Elementwise transforms ---

    pub fn elem_apply(&mut self, f: impl Fn(f64) -> f64) {
        self.as_mut_slice().iter_mut().for_each(|v| *v = f(*v));
    }

    pub fn elem_sqrt(&mut self) {
        self.elem_apply(f64::sqrt);
    }

    pub fn elem_exp(&mut self) {
        self.elem_apply(f64::exp);
    }

    pub fn elem_acos(&mut self) {
        self.elem_apply(f64::acos);
    }

    pub fn elem_negate(&mut self) {
        self.elem_apply(|v| -v);
    }

    /// Truncates every entry toward zero.
    pub fn elem_truncate(&mut self) {
        self.elem_apply(f64::trunc);
    }

    pub fn elem_pow(&mut self, exponent: f64) {
        self.elem_apply(|v| v.powf(exponent));
    }

    /// Adds a scalar to every entry.
    pub fn elem_add(&mut self, x: f64) {
        self.elem_apply(|v| v + x);
    }

    /// Multiplies every entry by a scalar.
    pub fn elem_mult(&mut self, c: f64) {
        self.elem_apply(|v| v * c);
    }

    /// Replaces every entry `v` with `c / v`.
    pub fn elem_divide_into(&mut self, c: f64) {
        self.elem_apply(|v| c / v);
    }

    /// Min-max scaling of all entries into `[0, 1]`. A constant matrix becomes all zeros.
    pub fn normalize(&mut self) {
        let (min, max) = self
            .as_slice()
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        if range == 0.0 {
            self.elem_apply(|_| 0.0);
        } else {
            self.elem_apply(|v| (v - min) / range);
        }
    }

    // --- Matrix-matrix updates ---

    pub fn add(&mut self, other: &Matrix) -> Result<()> {
        self.ensure_same_dims(other, "add")?;
        self.as_mut_slice()
            .iter_mut()
            .zip(other.as_slice())
            .for_each(|(a, b)| *a += b);
        Ok(())
    }

    pub fn subtract(&mut self, other: &Matrix) -> Result<()> {
        self.ensure_same_dims(other, "subtract")?;
        self.as_mut_slice()
            .iter_mut()
            .zip(other.as_slice())
            .for_each(|(a, b)| *a -= b);
        Ok(())
    }

    /// `M - a * 1^T`: subtracts the `rows x 1` vector `a` from every column.
    pub fn subtract_columns(&mut self, a: &Matrix) -> Result<()> {
        if a.dims() != (self.rows(), 1) {
            return Err(FaceCoreError::InvalidDimensions(format!(
                "subtract_columns expects a {}x1 vector, got {}x{}",
                self.rows(),
                a.rows(),
                a.cols()
            )));
        }
        let rows = self.rows();
        let mean = a.as_slice().to_vec();
        for col in self.as_mut_slice().chunks_exact_mut(rows) {
            col.iter_mut().zip(&mean).for_each(|(v, m)| *v -= m);
        }
        Ok(())
    }

    /// `M - 1 * a`: subtracts the `1 x cols` vector `a` from every row.
    pub fn subtract_rows(&mut self, a: &Matrix) -> Result<()> {
        if a.dims() != (1, self.cols()) {
            return Err(FaceCoreError::InvalidDimensions(format!(
                "subtract_rows expects a 1x{} vector, got {}x{}",
                self.cols(),
                a.rows(),
                a.cols()
            )));
        }
        let rows = self.rows();
        let offsets = a.as_slice().to_vec();
        for (col, offset) in self.as_mut_slice().chunks_exact_mut(rows).zip(offsets) {
            col.iter_mut().for_each(|v| *v -= offset);
        }
        Ok(())
    }

    // --- Reductions ---

    /// Average of the columns, `rows x 1`.
    pub fn mean_column(&self) -> Matrix {
        let mut mean = self.sum_rows();
        mean.elem_mult(1.0 / self.cols() as f64);
        mean
    }

    /// Average of the rows, `1 x cols`.
    pub fn mean_row(&self) -> Matrix {
        let mut mean = self.sum_columns();
        mean.elem_mult(1.0 / self.rows() as f64);
        mean
    }

    /// Sum of each column, `1 x cols`.
    pub fn sum_columns(&self) -> Matrix {
        let sums = self
            .as_slice()
            .chunks_exact(self.rows())
            .map(|col| col.iter().sum())
            .collect();
        Matrix::from_parts(1, self.cols(), sums)
    }

    /// Sum of each row, `rows x 1`.
    pub fn sum_rows(&self) -> Matrix {
        let mut sums = vec![0.0; self.rows()];
        for col in self.as_slice().chunks_exact(self.rows()) {
            sums.iter_mut().zip(col).for_each(|(s, v)| *s += v);
        }
        Matrix::from_parts(self.rows(), 1, sums)
    }

    /// Euclidean norm of all entries taken as one vector.
    pub fn norm(&self) -> f64 {
        self.as_slice().iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// 1-based row indices of the non-zero entries, scanned row by row,
    /// in a `rows*cols x 1` vector padded with zeros.
    pub fn find_nonzeros(&self) -> Matrix {
        let mut found = vec![0.0; self.len()];
        let mut count = 0;
        for i in 0..self.rows() {
            for j in 0..self.cols() {
                if self[(i, j)] != 0.0 {
                    found[count] = (i + 1) as f64;
                    count += 1;
                }
            }
        }
        Matrix::from_parts(self.len(), 1, found)
    }

    // --- Shape and column order ---

    /// Square matrix with the entries of the vector `v` on its diagonal.
    pub fn diagonalize(v: &Matrix) -> Result<Matrix> {
        if v.rows() != 1 && v.cols() != 1 {
            return Err(FaceCoreError::InvalidDimensions(format!(
                "diagonalize expects a vector, got {}x{}",
                v.rows(),
                v.cols()
            )));
        }
        let n = v.len();
        let mut d = Matrix::zeros(n, n)?;
        for (i, &value) in v.as_slice().iter().enumerate() {
            d[(i, i)] = value;
        }
        Ok(d)
    }

    /// Reshapes by walking both the source and the target in row-major order.
    ///
    /// This is not a reinterpretation of the column-major buffer; persisted
    /// artifacts produced by the legacy library depend on this traversal.
    /// See [`Matrix::reshape_column_major`] for the storage-order variant.
    pub fn reshape(&self, new_rows: usize, new_cols: usize) -> Result<Matrix> {
        self.ensure_reshape(new_rows, new_cols)?;
        let mut r = Matrix::zeros(new_rows, new_cols)?;
        for i in 0..new_rows * new_cols {
            r[(i / new_cols, i % new_cols)] = self[(i / self.cols(), i % self.cols())];
        }
        Ok(r)
    }

    /// Reshapes by keeping the column-major buffer as is.
    pub fn reshape_column_major(&self, new_rows: usize, new_cols: usize) -> Result<Matrix> {
        self.ensure_reshape(new_rows, new_cols)?;
        Ok(Matrix::from_parts(new_rows, new_cols, self.as_slice().to_vec()))
    }

    fn ensure_reshape(&self, new_rows: usize, new_cols: usize) -> Result<()> {
        if new_rows * new_cols != self.len() || new_rows == 0 {
            return Err(FaceCoreError::InvalidDimensions(format!(
                "Cannot reshape {}x{} into {}x{}",
                self.rows(),
                self.cols(),
                new_rows,
                new_cols
            )));
        }
        Ok(())
    }

    /// Reverses the column order in place.
    pub fn flip_columns(&mut self) {
        let cols = self.cols();
        for j in 0..cols / 2 {
            self.swap_columns(j, cols - j - 1);
        }
    }

    /// Randomly permutes the columns in place (Fisher-Yates).
    pub fn shuffle_columns(&mut self) {
        self.shuffle_columns_with(&mut fastrand::Rng::new());
    }

    pub fn shuffle_columns_with(&mut self, rng: &mut fastrand::Rng) {
        for j in (1..self.cols()).rev() {
            let k = rng.usize(..=j);
            self.swap_columns(j, k);
        }
    }

    fn swap_columns(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let rows = self.rows();
        let (lo, hi) = (a.min(b), a.max(b));
        let (left, right) = self.as_mut_slice().split_at_mut(hi * rows);
        left[lo * rows..(lo + 1) * rows].swap_with_slice(&mut right[..rows]);
    }

    /// New matrix whose column `j` is column `order[j]` of `self`.
    pub fn reorder_columns(&self, order: &[usize]) -> Result<Matrix> {
        if order.len() != self.cols() {
            return Err(FaceCoreError::InvalidDimensions(format!(
                "reorder_columns expects {} indices, got {}",
                self.cols(),
                order.len()
            )));
        }
        let mut r = Matrix::zeros(self.rows(), self.cols())?;
        for (j, &src) in order.iter().enumerate() {
            r.assign_column(j, self, src)?;
        }
        Ok(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_elem_transforms() {
        let mut a = Matrix::from_rows(&[[1.0, 0.0, 4.0], [9.0, 1.0, 16.0]]).unwrap();
        a.elem_sqrt();
        assert_eq!(a, Matrix::from_rows(&[[1.0, 0.0, 2.0], [3.0, 1.0, 4.0]]).unwrap());
        a.elem_mult(3.0);
        assert_eq!(a[(1, 2)], 12.0);
        a.elem_negate();
        a.elem_add(1.0);
        assert_eq!(a[(0, 0)], -2.0);
        a.elem_divide_into(4.0);
        assert_eq!(a[(0, 0)], -2.0);
        a.elem_pow(2.0);
        assert_eq!(a[(0, 0)], 4.0);
    }

    #[test]
    fn test_elem_truncate_and_acos() {
        let mut a = Matrix::from_rows(&[[1.7, -1.7], [0.2, -0.0]]).unwrap();
        a.elem_truncate();
        assert_eq!(a.as_slice(), &[1.0, 0.0, -1.0, -0.0]);

        let mut b = Matrix::from_rows(&[[1.0, 0.0]]).unwrap();
        b.elem_acos();
        assert_abs_diff_eq!(b[(0, 1)], std::f64::consts::FRAC_PI_2, epsilon = 1e-15);
        b.elem_exp();
        assert_eq!(b[(0, 0)], 1.0);
    }

    #[test]
    fn test_normalize() {
        let mut a = Matrix::from_rows(&[[2.0, 4.0], [6.0, 10.0]]).unwrap();
        a.normalize();
        assert_eq!(a, Matrix::from_rows(&[[0.0, 0.25], [0.5, 1.0]]).unwrap());

        let mut flat = Matrix::ones(2, 2).unwrap();
        flat.normalize();
        assert_eq!(flat, Matrix::zeros(2, 2).unwrap());
    }

    #[test]
    fn test_add_subtract() {
        let mut a = Matrix::from_rows(&[[1.0, 0.0], [2.0, 4.0]]).unwrap();
        let b = Matrix::from_rows(&[[5.0, 9.0], [2.0, 1.0]]).unwrap();
        a.add(&b).unwrap();
        assert_eq!(a, Matrix::from_rows(&[[6.0, 9.0], [4.0, 5.0]]).unwrap());
        a.subtract(&b).unwrap();
        a.subtract(&b).unwrap();
        assert_eq!(a, Matrix::from_rows(&[[-4.0, -9.0], [0.0, 3.0]]).unwrap());
        assert!(a.add(&Matrix::zeros(3, 2).unwrap()).is_err());
    }

    #[test]
    fn test_subtract_columns_and_rows() {
        let m = Matrix::from_rows(&[
            [0.0, 2.0, 1.0, 4.0],
            [1.0, 3.0, 3.0, 2.0],
            [1.0, 2.0, 2.0, 2.0],
        ])
        .unwrap();

        let mut by_col = m.copy();
        let a = Matrix::from_rows(&[[0.0], [1.0], [1.0]]).unwrap();
        by_col.subtract_columns(&a).unwrap();
        assert_eq!(
            by_col,
            Matrix::from_rows(&[
                [0.0, 2.0, 1.0, 4.0],
                [0.0, 2.0, 2.0, 1.0],
                [0.0, 1.0, 1.0, 1.0],
            ])
            .unwrap()
        );

        let mut by_row = m.copy();
        let r = Matrix::from_rows(&[[0.0, 2.0, 1.0, 4.0]]).unwrap();
        by_row.subtract_rows(&r).unwrap();
        assert_eq!(by_row.column(1), &[0.0, 1.0, 0.0]);
        assert_eq!(by_row.column(3), &[0.0, -2.0, -2.0]);

        assert!(by_row.subtract_columns(&r).is_err());
    }

    #[test]
    fn test_means_and_sums() {
        let a = Matrix::from_rows(&[[0.0, 1.0, 1.0], [2.0, 3.0, 2.0]]).unwrap();
        let mc = a.mean_column();
        assert_eq!(mc.dims(), (2, 1));
        assert_abs_diff_eq!(mc[(0, 0)], 2.0 / 3.0, epsilon = 1e-15);
        assert_abs_diff_eq!(mc[(1, 0)], 7.0 / 3.0, epsilon = 1e-15);

        let mr = a.mean_row();
        assert_eq!(mr, Matrix::from_rows(&[[1.0, 2.0, 1.5]]).unwrap());

        assert_eq!(a.sum_columns(), Matrix::from_rows(&[[2.0, 4.0, 3.0]]).unwrap());
        assert_eq!(a.sum_rows(), Matrix::from_rows(&[[2.0], [7.0]]).unwrap());
    }

    #[test]
    fn test_norm_and_diagonalize() {
        let v = Matrix::from_rows(&[[-2.0, 3.0, 1.0]]).unwrap();
        assert_abs_diff_eq!(v.norm(), 14.0_f64.sqrt(), epsilon = 1e-15);

        let d = Matrix::diagonalize(&Matrix::from_rows(&[[2.0, 1.0, -1.0, -2.0, -5.0]]).unwrap())
            .unwrap();
        assert_eq!(d.dims(), (5, 5));
        assert_eq!(d[(4, 4)], -5.0);
        assert_eq!(d[(0, 1)], 0.0);
        assert!(Matrix::diagonalize(&Matrix::zeros(2, 2).unwrap()).is_err());
    }

    #[test]
    fn test_find_nonzeros() {
        let a = Matrix::from_rows(&[[0.0, 3.0], [5.0, 0.0]]).unwrap();
        let f = a.find_nonzeros();
        assert_eq!(f.as_slice(), &[1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_reshape_is_row_major() {
        let a = Matrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        let r = a.reshape(3, 2).unwrap();
        assert_eq!(r, Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).unwrap());

        let c = a.reshape_column_major(3, 2).unwrap();
        assert_eq!(c, Matrix::from_rows(&[[1.0, 5.0], [4.0, 3.0], [2.0, 6.0]]).unwrap());

        assert!(a.reshape(4, 2).is_err());
    }

    #[test]
    fn test_flip_and_reorder_columns() {
        let mut a = Matrix::from_rows(&[[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]]).unwrap();
        a.flip_columns();
        assert_eq!(a, Matrix::from_rows(&[[4.0, 3.0, 2.0, 1.0], [8.0, 7.0, 6.0, 5.0]]).unwrap());

        let r = a.reorder_columns(&[3, 3, 0, 1]).unwrap();
        assert_eq!(r.column(0), &[1.0, 5.0]);
        assert_eq!(r.column(1), &[1.0, 5.0]);
        assert_eq!(r.column(3), &[3.0, 7.0]);
        assert!(a.reorder_columns(&[0, 1]).is_err());
        assert!(a.reorder_columns(&[0, 1, 2, 9]).is_err());
    }

    #[test]
    fn test_shuffle_columns_is_permutation() {
        let a = Matrix::from_rows(&[[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]]).unwrap();
        let mut s = a.copy();
        s.shuffle_columns_with(&mut fastrand::Rng::with_seed(3));
        let mut firsts: Vec<f64> = (0..4).map(|j| s[(0, j)]).collect();
        firsts.sort_by(f64::total_cmp);
        assert_eq!(firsts, vec![1.0, 2.0, 3.0, 4.0]);
        for j in 0..4 {
            assert_eq!(s[(1, j)], s[(0, j)] + 4.0);
        }
    }
}

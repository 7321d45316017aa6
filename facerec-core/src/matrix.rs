use crate::error::{FaceCoreError, Result};
use std::fmt;
use std::ops::{Index, IndexMut};

#[cfg(feature = "gpu")]
use crate::mirror::DeviceMirror;
#[cfg(feature = "gpu")]
use std::cell::RefCell;

/// A dense `f64` matrix stored in column-major order.
///
/// Element `(i, j)` lives at `i + j * rows`. Every derived matrix (copies,
/// products, transposes) owns a fresh buffer, so two matrices never alias.
/// With the `gpu` feature the matrix may additionally own a device-side
/// mirror; see [`Matrix::push`] and [`Matrix::pull`].
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    #[cfg(feature = "gpu")]
    pub(crate) mirror: RefCell<Option<DeviceMirror>>,
}

fn check_dims(rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(FaceCoreError::InvalidDimensions(format!(
            "Matrix dimensions must be positive, got {}x{}",
            rows, cols
        )));
    }
    Ok(())
}

impl Matrix {
    /// Wraps an already validated buffer.
    pub(crate) fn from_parts(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self {
            rows,
            cols,
            data,
            #[cfg(feature = "gpu")]
            mirror: RefCell::new(None),
        }
    }

    /// Allocates a `rows x cols` matrix. The buffer is zero-filled.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        Self::zeros(rows, cols)
    }

    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        check_dims(rows, cols)?;
        Ok(Self::from_parts(rows, cols, vec![0.0; rows * cols]))
    }

    pub fn ones(rows: usize, cols: usize) -> Result<Self> {
        check_dims(rows, cols)?;
        Ok(Self::from_parts(rows, cols, vec![1.0; rows * cols]))
    }

    pub fn identity(n: usize) -> Result<Self> {
        let mut m = Self::zeros(n, n)?;
        for i in 0..n {
            m.data[i + i * n] = 1.0;
        }
        Ok(m)
    }

    /// Standard normal entries (Box-Muller) from a thread-local generator.
    pub fn random_normal(rows: usize, cols: usize) -> Result<Self> {
        Self::random_normal_with(rows, cols, &mut fastrand::Rng::new())
    }

    /// Standard normal entries from a seeded generator, reproducible across runs.
    pub fn random_normal_seeded(rows: usize, cols: usize, seed: u64) -> Result<Self> {
        Self::random_normal_with(rows, cols, &mut fastrand::Rng::with_seed(seed))
    }

    fn random_normal_with(rows: usize, cols: usize, rng: &mut fastrand::Rng) -> Result<Self> {
        check_dims(rows, cols)?;
        let len = rows * cols;
        let mut data = Vec::with_capacity(len + 1);
        while data.len() < len {
            // 1 - f64() lies in (0, 1], keeping ln finite
            let u1 = 1.0 - rng.f64();
            let u2 = rng.f64();
            let radius = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f64::consts::PI * u2;
            data.push(radius * theta.cos());
            data.push(radius * theta.sin());
        }
        data.truncate(len);
        Ok(Self::from_parts(rows, cols, data))
    }

    /// Creates a matrix from a column-major buffer.
    pub fn from_column_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        check_dims(rows, cols)?;
        if data.len() != rows * cols {
            return Err(FaceCoreError::InvalidDimensions(format!(
                "Data length ({}) does not match dimensions ({}x{})",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self::from_parts(rows, cols, data))
    }

    /// Creates a matrix from a list of rows, the way matrices are written on paper.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut m = Self::zeros(n_rows, n_cols)?;
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != n_cols {
                return Err(FaceCoreError::InvalidDimensions(format!(
                    "Row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n_cols
                )));
            }
            for (j, &value) in row.iter().enumerate() {
                m.data[i + j * n_rows] = value;
            }
        }
        Ok(m)
    }

    // --- Getters ---

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of elements, `rows * cols`.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Returns the element at `(row, col)`, or `None` when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(self.data[row + col * self.rows])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(FaceCoreError::IndexOutOfRange(format!(
                "({}, {}) in {}x{} matrix",
                row, col, self.rows, self.cols
            )));
        }
        self.touch();
        self.data[row + col * self.rows] = value;
        Ok(())
    }

    /// Host buffer in column-major order.
    pub fn as_slice(&self) -> &[f64] {
        self.debug_assert_host_current();
        &self.data
    }

    /// Mutable host buffer. Marks the device mirror stale.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.touch();
        &mut self.data
    }

    /// Consumes the matrix, returning its column-major buffer.
    pub fn into_vec(self) -> Vec<f64> {
        self.debug_assert_host_current();
        self.data
    }

    pub fn column(&self, col: usize) -> &[f64] {
        assert!(col < self.cols, "column {} out of range ({} cols)", col, self.cols);
        &self.as_slice()[col * self.rows..(col + 1) * self.rows]
    }

    pub fn column_mut(&mut self, col: usize) -> &mut [f64] {
        assert!(col < self.cols, "column {} out of range ({} cols)", col, self.cols);
        let rows = self.rows;
        &mut self.as_mut_slice()[col * rows..(col + 1) * rows]
    }

    pub(crate) fn check_column(&self, col: usize) -> Result<()> {
        if col >= self.cols {
            return Err(FaceCoreError::IndexOutOfRange(format!(
                "column {} in {}x{} matrix",
                col, self.rows, self.cols
            )));
        }
        Ok(())
    }

    // --- Copies ---

    /// Deep copy of the host contents. The copy has no device mirror.
    pub fn copy(&self) -> Matrix {
        Self::from_parts(self.rows, self.cols, self.as_slice().to_vec())
    }

    /// Deep copy of columns `[begin, end)`.
    pub fn copy_columns(&self, begin: usize, end: usize) -> Result<Matrix> {
        if !(begin < end && end <= self.cols) {
            return Err(FaceCoreError::IndexOutOfRange(format!(
                "column range [{}, {}) in matrix with {} columns",
                begin, end, self.cols
            )));
        }
        let data = self.as_slice()[begin * self.rows..end * self.rows].to_vec();
        Ok(Self::from_parts(self.rows, end - begin, data))
    }

    /// Copies column `src_col` of `src` into column `col` of `self`.
    pub fn assign_column(&mut self, col: usize, src: &Matrix, src_col: usize) -> Result<()> {
        if self.rows != src.rows {
            return Err(FaceCoreError::InvalidDimensions(format!(
                "Cannot assign column of {} rows into matrix with {} rows",
                src.rows, self.rows
            )));
        }
        self.check_column(col)?;
        src.check_column(src_col)?;
        self.column_mut(col).copy_from_slice(src.column(src_col));
        Ok(())
    }

    /// Releases the host buffer and the device mirror together.
    pub fn release(self) {
        log::trace!("Releasing {}x{} matrix", self.rows, self.cols);
    }

    // --- Host/device bookkeeping ---

    /// Records a host-side mutation. Any device mirror becomes stale.
    #[inline]
    pub(crate) fn touch(&mut self) {
        #[cfg(feature = "gpu")]
        {
            if let Some(mirror) = self.mirror.get_mut() {
                mirror.mark_host_ahead();
            }
        }
    }

    #[inline]
    fn debug_assert_host_current(&self) {
        #[cfg(feature = "gpu")]
        debug_assert!(
            self.mirror
                .borrow()
                .as_ref()
                .map_or(true, |m| !m.is_device_ahead()),
            "host read of a matrix whose device mirror holds unpulled results"
        );
    }

    /// Host buffer without the staleness check, for the push path itself.
    #[cfg(feature = "gpu")]
    pub(crate) fn host_data(&self) -> &[f64] {
        &self.data
    }

    /// Replaces the host buffer with data read back from the device.
    #[cfg(feature = "gpu")]
    pub(crate) fn overwrite_host(&mut self, data: Vec<f64>) {
        debug_assert_eq!(data.len(), self.rows * self.cols);
        self.data = data;
    }
}

impl Clone for Matrix {
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl PartialEq for Matrix {
    fn eq(&self, other: &Self) -> bool {
        self.dims() == other.dims() && self.as_slice() == other.as_slice()
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Matrix");
        s.field("rows", &self.rows).field("cols", &self.cols);
        #[cfg(feature = "gpu")]
        s.field(
            "mirror",
            &self.mirror.borrow().as_ref().map(|m| m.state()),
        );
        if self.data.len() <= 64 {
            s.field("data", &self.data);
        }
        s.finish()
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of range for {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
        &self.as_slice()[row + col * self.rows]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of range for {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
        let rows = self.rows;
        &mut self.as_mut_slice()[row + col * rows]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn magic4() -> Matrix {
        Matrix::from_rows(&[
            [16.0, 2.0, 3.0, 13.0],
            [5.0, 11.0, 10.0, 8.0],
            [9.0, 7.0, 6.0, 12.0],
            [4.0, 14.0, 15.0, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            Matrix::zeros(0, 3),
            Err(FaceCoreError::InvalidDimensions(_))
        ));
        assert!(Matrix::ones(2, 0).is_err());
    }

    #[test]
    fn test_from_rows_is_column_major() {
        let m = Matrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m.dims(), (2, 3));
        assert_eq!(m.as_slice(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(m[(1, 2)], 6.0);
        assert_eq!(m.get(2, 0), None);
    }

    #[test]
    fn test_from_rows_ragged() {
        let rows: Vec<Vec<f64>> = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(Matrix::from_rows(&rows).is_err());
    }

    #[test]
    fn test_identity() {
        let id = Matrix::identity(3).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(id[(i, j)], if i == j { 1.0 } else { 0.0 });
            }
        }
    }

    #[test]
    fn test_copy_and_copy_columns() {
        let a = magic4();
        let c1 = a.copy();
        assert_eq!(c1, a);

        let c2 = a.copy_columns(1, 3).unwrap();
        assert_eq!(c2.dims(), (4, 2));
        for i in 0..4 {
            assert_eq!(c2[(i, 0)], a[(i, 1)]);
            assert_eq!(c2[(i, 1)], a[(i, 2)]);
        }
    }

    #[test]
    fn test_copy_columns_bad_range() {
        let a = magic4();
        assert!(a.copy_columns(2, 2).is_err());
        assert!(a.copy_columns(3, 1).is_err());
        assert!(a.copy_columns(0, 5).is_err());
    }

    #[test]
    fn test_copy_does_not_alias() {
        let a = magic4();
        let mut b = a.copy();
        b[(0, 0)] = -1.0;
        assert_eq!(a[(0, 0)], 16.0);
    }

    #[test]
    fn test_assign_column() {
        let mut a = magic4();
        let zeros = Matrix::zeros(4, 1).unwrap();
        a.assign_column(2, &zeros, 0).unwrap();
        assert_eq!(a.column(2), &[0.0; 4]);
        assert_eq!(a.column(1), &[2.0, 11.0, 7.0, 14.0]);
        assert!(a.assign_column(4, &zeros, 0).is_err());
    }

    #[test]
    fn test_random_normal_seeded_is_reproducible() {
        let a = Matrix::random_normal_seeded(5, 5, 42).unwrap();
        let b = Matrix::random_normal_seeded(5, 5, 42).unwrap();
        assert_eq!(a, b);
        assert!(a.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_random_normal_moments() {
        let m = Matrix::random_normal_seeded(100, 100, 7).unwrap();
        let n = m.len() as f64;
        let mean = m.as_slice().iter().sum::<f64>() / n;
        let var = m.as_slice().iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.1, "variance {}", var);
    }
}

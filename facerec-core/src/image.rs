//! Pixel buffers as matrix columns.
//!
//! Decoding and encoding image files happens elsewhere; this module only
//! moves interleaved samples in and out of a column.

use crate::error::{FaceCoreError, Result};
use crate::matrix::Matrix;
use num_traits::{Bounded, NumCast, ToPrimitive};

/// Interleaved samples of a decoded image, `channels * height * width` long.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer<T = u8> {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub samples: Vec<T>,
}

impl<T: Clone + Default> PixelBuffer<T> {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
            samples: vec![T::default(); channels * height * width],
        }
    }
}

impl<T> PixelBuffer<T> {
    pub fn from_samples(channels: usize, height: usize, width: usize, samples: Vec<T>) -> Result<Self> {
        if samples.len() != channels * height * width {
            return Err(FaceCoreError::InvalidDimensions(format!(
                "{} samples for a {}x{}x{} image",
                samples.len(),
                channels,
                height,
                width
            )));
        }
        Ok(Self {
            channels,
            height,
            width,
            samples,
        })
    }

    /// Number of samples, the row count of a matching column.
    pub fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn ensure_fits<T>(m: &Matrix, col: usize, image: &PixelBuffer<T>) -> Result<()> {
    if m.rows() != image.len() {
        return Err(FaceCoreError::InvalidDimensions(format!(
            "{}-row matrix cannot hold a {}x{}x{} image",
            m.rows(),
            image.channels,
            image.height,
            image.width
        )));
    }
    m.check_column(col)
}

/// Copies the samples of `image` into column `col` of `m`.
pub fn load_column_from_image<T: ToPrimitive>(
    m: &mut Matrix,
    col: usize,
    image: &PixelBuffer<T>,
) -> Result<()> {
    ensure_fits(m, col, image)?;
    for (dst, s) in m.column_mut(col).iter_mut().zip(&image.samples) {
        *dst = s.to_f64().unwrap_or(f64::NAN);
    }
    Ok(())
}

/// Writes column `col` of `m` into `image`, saturating to the sample range.
///
/// Fractional values are truncated toward zero; NaN becomes zero.
pub fn store_column_to_image<T: NumCast + Bounded + Copy>(
    m: &Matrix,
    col: usize,
    image: &mut PixelBuffer<T>,
) -> Result<()> {
    ensure_fits(m, col, image)?;
    let lo = T::min_value().to_f64().unwrap_or(f64::MIN);
    let hi = T::max_value().to_f64().unwrap_or(f64::MAX);
    for (dst, &v) in image.samples.iter_mut().zip(m.column(col)) {
        let clamped = if v.is_nan() { 0.0 } else { v.clamp(lo, hi) };
        *dst = match T::from(clamped) {
            Some(s) => s,
            None if clamped <= lo => T::min_value(),
            None => T::max_value(),
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_store_round_trip() {
        let image = PixelBuffer::from_samples(1, 2, 2, vec![0u8, 17, 128, 255]).unwrap();
        let mut m = Matrix::zeros(4, 3).unwrap();
        load_column_from_image(&mut m, 1, &image).unwrap();
        assert_eq!(m.column(1), &[0.0, 17.0, 128.0, 255.0]);
        assert_eq!(m.column(0), &[0.0; 4]);

        let mut out = PixelBuffer::<u8>::new(1, 2, 2);
        store_column_to_image(&m, 1, &mut out).unwrap();
        assert_eq!(out, image);
    }

    #[test]
    fn test_store_saturates() {
        let m = Matrix::from_rows(&[[-4.0], [300.0], [12.9], [f64::NAN]]).unwrap();
        let mut out = PixelBuffer::<u8>::new(1, 1, 4);
        store_column_to_image(&m, 0, &mut out).unwrap();
        assert_eq!(out.samples, vec![0, 255, 12, 0]);

        let mut wide = PixelBuffer::<u16>::new(1, 1, 4);
        store_column_to_image(&m, 0, &mut wide).unwrap();
        assert_eq!(wide.samples, vec![0, 300, 12, 0]);
    }

    #[test]
    fn test_size_mismatch() {
        let image = PixelBuffer::<u8>::new(3, 2, 2);
        let mut m = Matrix::zeros(4, 1).unwrap();
        assert!(load_column_from_image(&mut m, 0, &image).is_err());
        let mut m = Matrix::zeros(12, 1).unwrap();
        assert!(load_column_from_image(&mut m, 1, &image).is_err());
        assert!(PixelBuffer::from_samples(1, 2, 2, vec![0u8; 3]).is_err());
    }
}

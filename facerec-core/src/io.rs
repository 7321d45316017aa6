//! Matrix persistence.
//!
//! Binary: `i32 rows`, `i32 cols`, then `rows * cols` `f64` values in
//! column-major order, all little-endian. Text: a `rows cols` header line
//! followed by `rows` lines of space-separated values. Both formats can be
//! concatenated in a single stream; readers consume exactly one matrix.

use crate::error::{FaceCoreError, Result};
use crate::matrix::Matrix;
use std::io::{BufRead, Read, Write};

fn header_dim(value: i32, what: &str) -> Result<usize> {
    if value <= 0 {
        return Err(FaceCoreError::Parse(format!(
            "matrix header has non-positive {}: {}",
            what, value
        )));
    }
    Ok(value as usize)
}

/// Element count for a parsed header, or `Parse` when it cannot be addressed.
fn element_count(rows: usize, cols: usize, elem_size: usize) -> Result<usize> {
    rows.checked_mul(cols)
        .and_then(|n| n.checked_mul(elem_size).map(|_| n))
        .ok_or_else(|| {
            FaceCoreError::Parse(format!("matrix header {}x{} is too large", rows, cols))
        })
}

fn dim_to_i32(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        FaceCoreError::InvalidDimensions(format!("{} does not fit the binary header", value))
    })
}

/// Writes `m` in the binary format.
pub fn write_binary<W: Write + ?Sized>(m: &Matrix, w: &mut W) -> Result<()> {
    w.write_all(&dim_to_i32(m.rows())?.to_le_bytes())?;
    w.write_all(&dim_to_i32(m.cols())?.to_le_bytes())?;
    let mut buf = Vec::with_capacity(m.len() * 8);
    for v in m.as_slice() {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    w.write_all(&buf)?;
    Ok(())
}

/// Reads one matrix in the binary format.
///
/// A stream that ends before the header or payload is complete yields
/// an `UnexpectedEof` I/O error.
pub fn read_binary<R: Read + ?Sized>(r: &mut R) -> Result<Matrix> {
    let mut word = [0u8; 4];
    r.read_exact(&mut word)?;
    let rows = header_dim(i32::from_le_bytes(word), "row count")?;
    r.read_exact(&mut word)?;
    let cols = header_dim(i32::from_le_bytes(word), "column count")?;

    let byte_len = element_count(rows, cols, 8)? * 8;

    // Grows with the bytes actually present, not with the header's claim
    let mut bytes = Vec::new();
    (&mut *r).take(byte_len as u64).read_to_end(&mut bytes)?;
    if bytes.len() < byte_len {
        return Err(FaceCoreError::IoError(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("matrix payload has {} of {} bytes", bytes.len(), byte_len),
        )));
    }
    let data = bytes
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            f64::from_le_bytes(b)
        })
        .collect();
    Matrix::from_column_major(rows, cols, data)
}

/// Writes `m` in the text format.
pub fn write_text<W: Write + ?Sized>(m: &Matrix, w: &mut W) -> Result<()> {
    writeln!(w, "{} {}", m.rows(), m.cols())?;
    for i in 0..m.rows() {
        let line = (0..m.cols())
            .map(|j| m[(i, j)].to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(w, "{}", line)?;
    }
    Ok(())
}

/// Reads one matrix in the text format.
///
/// Values are consumed as whitespace-separated tokens, so line breaks
/// inside the body are not significant. Reading stops at the end of the
/// line holding the last value.
pub fn read_text<R: BufRead + ?Sized>(r: &mut R) -> Result<Matrix> {
    let mut line = String::new();
    let header = loop {
        line.clear();
        if r.read_line(&mut line)? == 0 {
            return Err(FaceCoreError::Parse("missing matrix header".to_string()));
        }
        if !line.trim().is_empty() {
            break line.trim().to_string();
        }
    };

    let dims: Vec<i32> = header
        .split_whitespace()
        .map(|t| {
            t.parse::<i32>()
                .map_err(|e| FaceCoreError::Parse(format!("bad header token '{}': {}", t, e)))
        })
        .collect::<Result<_>>()?;
    let (rows, cols) = match dims.as_slice() {
        [r, c] => (header_dim(*r, "row count")?, header_dim(*c, "column count")?),
        _ => {
            return Err(FaceCoreError::Parse(format!(
                "expected 'rows cols' header, got '{}'",
                header
            )))
        }
    };

    let count = element_count(rows, cols, std::mem::size_of::<f64>())?;
    let mut values = Vec::new();
    while values.len() < count {
        line.clear();
        if r.read_line(&mut line)? == 0 {
            return Err(FaceCoreError::Parse(format!(
                "expected {} values, found {}",
                count,
                values.len()
            )));
        }
        for token in line.split_whitespace() {
            let v = token
                .parse::<f64>()
                .map_err(|e| FaceCoreError::Parse(format!("bad value '{}': {}", token, e)))?;
            values.push(v);
        }
    }
    if values.len() != count {
        return Err(FaceCoreError::Parse(format!(
            "expected {} values, found {}",
            count,
            values.len()
        )));
    }

    // Text is row-major
    let mut m = Matrix::zeros(rows, cols)?;
    for (k, v) in values.into_iter().enumerate() {
        m[(k / cols, k % cols)] = v;
    }
    Ok(m)
}

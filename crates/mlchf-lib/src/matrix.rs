//! Dense feature matrix handed to [`Booster::predict`](crate::Booster::predict).

use crate::error::{Error, Result};

/// Row-major dense matrix of `f32` features.
///
/// A cell is treated as missing when it is NaN or equals the `missing`
/// sentinel. Missing cells follow each split's default direction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
    missing: f32,
}

impl FeatureMatrix {
    /// Build a matrix from row-major data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MatrixShape`] when `data.len() != rows * cols`.
    pub fn from_dense(data: &[f32], rows: usize, cols: usize, missing: f32) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(Error::MatrixShape {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self {
            data: data.to_vec(),
            rows,
            cols,
            missing,
        })
    }

    /// Convenience constructor for a single observation.
    pub fn from_row(row: &[f32], missing: f32) -> Self {
        Self {
            data: row.to_vec(),
            rows: 1,
            cols: row.len(),
            missing,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn missing(&self) -> f32 {
        self.missing
    }

    /// Borrow a single row.
    ///
    /// # Panics
    ///
    /// Panics if `index >= rows()`.
    pub fn row(&self, index: usize) -> &[f32] {
        let start = index * self.cols;
        &self.data[start..start + self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact(0) panics; a zero-width matrix still has `rows` empty rows.
        let cols = self.cols.max(1);
        let rows = self.rows;
        self.data
            .chunks_exact(cols)
            .chain(std::iter::repeat(&[][..]))
            .take(rows)
    }

    #[inline]
    pub fn is_missing(&self, value: f32) -> bool {
        value.is_nan() || value == self.missing
    }
}

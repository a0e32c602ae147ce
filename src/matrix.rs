use anyhow::{ensure, Result};

/// Marker written into cells whose (row, column) pair must not be matched.
///
/// An explicit sentinel keeps legitimately zero-weight edges distinguishable
/// from forbidden ones.
pub const FORBIDDEN: f64 = f64::NEG_INFINITY;

/// Dense row-major weight matrix of a rectangular assignment instance.
///
/// Rows must not outnumber columns. Cells are either finite weights or
/// [`FORBIDDEN`]; a forbidden cell contributes no arc to the instance.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightMatrix {
    num_rows: usize,
    num_cols: usize,
    values: Vec<f64>,
}

impl WeightMatrix {
    pub fn new(num_rows: usize, num_cols: usize, values: Vec<f64>) -> Result<WeightMatrix> {
        ensure!(num_rows > 0 && num_cols > 0, "matrix dimensions must be positive");
        ensure!(
            num_rows <= num_cols,
            "expecting at most as many rows as columns, got {}x{}",
            num_rows,
            num_cols
        );
        ensure!(
            values.len() == num_rows * num_cols,
            "expecting {} cells, got {}",
            num_rows * num_cols,
            values.len()
        );
        ensure!(
            values.iter().all(|v| v.is_finite() || *v == FORBIDDEN),
            "cells must be finite weights or the FORBIDDEN sentinel"
        );
        Ok(WeightMatrix {
            num_rows,
            num_cols,
            values,
        })
    }

    /// Builds a matrix from row slices. All rows must have equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<WeightMatrix> {
        ensure!(!rows.is_empty(), "matrix must have at least one row");
        let num_cols = rows[0].len();
        ensure!(
            rows.iter().all(|r| r.len() == num_cols),
            "rows must have equal length"
        );
        let mut values = Vec::with_capacity(rows.len() * num_cols);
        for row in rows {
            values.extend_from_slice(row.as_slice());
        }
        WeightMatrix::new(rows.len(), num_cols, values)
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[inline]
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    #[inline]
    pub fn at(&self, row: usize, column: usize) -> f64 {
        self.values[row * self.num_cols + column]
    }

    /// True when the cell holds a matchable weight.
    #[inline]
    pub fn is_open(&self, row: usize, column: usize) -> bool {
        self.at(row, column).is_finite()
    }

    /// Forbids one (row, column) pair.
    #[inline]
    pub fn lock(&mut self, row: usize, column: usize) {
        self.values[row * self.num_cols + column] = FORBIDDEN;
    }

    /// Forces the edge (row, column): forbids every other use of its row and
    /// of its column, then restores the cell itself to `weight`.
    pub fn force(&mut self, row: usize, column: usize, weight: f64) {
        for r in 0..self.num_rows {
            self.values[r * self.num_cols + column] = FORBIDDEN;
        }
        let row_start = row * self.num_cols;
        for c in 0..self.num_cols {
            self.values[row_start + c] = FORBIDDEN;
        }
        self.values[row_start + column] = weight;
    }

    pub fn values(&self) -> &[f64] {
        self.values.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::{WeightMatrix, FORBIDDEN};

    #[test]
    fn rejects_malformed_input() {
        assert!(WeightMatrix::new(0, 1, vec![]).is_err());
        assert!(WeightMatrix::new(2, 1, vec![1., 2.]).is_err());
        assert!(WeightMatrix::new(2, 2, vec![1., 2., 3.]).is_err());
        assert!(WeightMatrix::new(1, 2, vec![1., f64::NAN]).is_err());
        assert!(WeightMatrix::new(1, 2, vec![1., f64::INFINITY]).is_err());
    }

    #[test]
    fn accepts_forbidden_cells() {
        let m = WeightMatrix::new(1, 2, vec![1., FORBIDDEN]).unwrap();
        assert!(m.is_open(0, 0));
        assert!(!m.is_open(0, 1));
    }

    #[test]
    fn lock_forbids_single_cell() {
        let mut m = WeightMatrix::from_rows(&[vec![1., 2.], vec![3., 4.]]).unwrap();
        m.lock(0, 1);
        assert!(!m.is_open(0, 1));
        assert_eq!(m.at(0, 0), 1.);
        assert_eq!(m.at(1, 1), 4.);
    }

    #[test]
    fn force_isolates_edge() {
        let mut m =
            WeightMatrix::from_rows(&[vec![1., 2., 3.], vec![4., 5., 6.], vec![7., 8., 9.]])
                .unwrap();
        m.force(1, 1, 5.);
        assert_eq!(m.at(1, 1), 5.);
        assert!(!m.is_open(1, 0));
        assert!(!m.is_open(1, 2));
        assert!(!m.is_open(0, 1));
        assert!(!m.is_open(2, 1));
        // cells outside row 1 and column 1 are untouched
        assert_eq!(m.at(0, 0), 1.);
        assert_eq!(m.at(2, 2), 9.);
    }
}

//! Square integer matrices stored row-major.

use message_passing::Element;

use crate::partition::RowRange;

/// An `n`×`n` matrix of [`Element`]s, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    n: usize,
    data: Vec<Element>,
}

impl Matrix {
    /// An `n`×`n` matrix of zeros.
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0; n * n],
        }
    }

    /// Builds a matrix whose cell `(i, j)` is `f(i, j)`.
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> Element) -> Self {
        let mut data = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                data.push(f(i, j));
            }
        }
        Self { n, data }
    }

    /// Builds a matrix from row-major data, or `None` if `data.len() != n * n`.
    pub fn from_vec(n: usize, data: Vec<Element>) -> Option<Self> {
        (n.checked_mul(n) == Some(data.len())).then_some(Self { n, data })
    }

    pub(crate) fn from_raw(n: usize, data: Vec<Element>) -> Self {
        debug_assert_eq!(data.len(), n * n);
        Self { n, data }
    }

    /// Builds a matrix from rows. The size is the number of rows; rows of
    /// another width are zero-padded or truncated without complaint.
    pub fn from_rows(rows: Vec<Vec<Element>>) -> Self {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for mut row in rows {
            row.resize(n, 0);
            data.extend(row);
        }
        Self { n, data }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn row(&self, i: usize) -> &[Element] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [Element] {
        &mut self.data[i * self.n..(i + 1) * self.n]
    }

    /// The contiguous block of rows in `range`.
    pub fn rows_in(&self, range: RowRange) -> &[Element] {
        &self.data[range.start * self.n..range.end * self.n]
    }

    pub fn rows_in_mut(&mut self, range: RowRange) -> &mut [Element] {
        &mut self.data[range.start * self.n..range.end * self.n]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Element]> {
        // chunks_exact panics on 0, and a 0x0 matrix has no rows anyway.
        self.data.chunks_exact(self.n.max(1))
    }

    pub fn get(&self, i: usize, j: usize) -> Element {
        self.data[i * self.n + j]
    }

    pub fn as_slice(&self) -> &[Element] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Element] {
        &mut self.data
    }

    /// First cell, in row-major order, where `self` and `other` differ.
    ///
    /// Matrices of different sizes differ at `(0, 0)`.
    pub fn first_difference(&self, other: &Matrix) -> Option<(usize, usize)> {
        if self.n != other.n {
            return Some((0, 0));
        }
        self.data
            .iter()
            .zip(&other.data)
            .position(|(a, b)| a != b)
            .map(|idx| (idx / self.n, idx % self.n))
    }
}

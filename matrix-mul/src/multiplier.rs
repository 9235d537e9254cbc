//! Naive triple-loop multiplication over a block of rows.

use message_passing::Element;

use crate::partition::RowRange;
use crate::{Error, Matrix};

/// Result rows computed by one rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialResult {
    n: usize,
    range: RowRange,
    data: Vec<Element>,
}

impl PartialResult {
    pub fn range(&self) -> RowRange {
        self.range
    }

    /// Result row `i`, by global row index.
    ///
    /// # Panics
    ///
    /// Panics if `i` is outside [`range`](Self::range).
    pub fn row(&self, i: usize) -> &[Element] {
        assert!(self.range.contains(i), "row {i} not in {:?}", self.range);
        let local = i - self.range.start;
        &self.data[local * self.n..(local + 1) * self.n]
    }

    /// All owned rows, contiguous and row-major.
    pub fn as_slice(&self) -> &[Element] {
        &self.data
    }
}

/// Multiplies the rows `range` of A by the full `b`.
///
/// `a_rows` holds exactly those rows of A, row-major. Arithmetic wraps on
/// overflow.
///
/// # Panics
///
/// Panics if `a_rows.len() != range.len() * b.n()`.
pub fn multiply_rows(a_rows: &[Element], range: RowRange, b: &Matrix) -> PartialResult {
    let n = b.n();
    assert_eq!(a_rows.len(), range.len() * n, "A block does not match {range:?}");

    let mut data = vec![0; range.len() * n];
    for (a_row, out_row) in a_rows.chunks_exact(n.max(1)).zip(data.chunks_exact_mut(n.max(1))) {
        for (j, out) in out_row.iter_mut().enumerate() {
            let mut sum: Element = 0;
            for (k, &a) in a_row.iter().enumerate() {
                sum = sum.wrapping_add(a.wrapping_mul(b.get(k, j)));
            }
            *out = sum;
        }
    }

    PartialResult { n, range, data }
}

/// Full product `a * b` computed in one process.
pub fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    let n = a.n();
    let partial = multiply_rows(a.as_slice(), RowRange::new(0, n), b);
    Matrix::from_raw(n, partial.data)
}

/// Runs a multiplication kernel on tokio's blocking pool.
///
/// The kernels never yield, so they must not run on a runtime worker thread
/// shared with other ranks' tasks.
pub async fn run_kernel<T, F>(kernel: F) -> Result<T, Error>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(kernel).await?)
}

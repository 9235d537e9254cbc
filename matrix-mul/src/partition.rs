//! Row ownership: which rank computes which rows of the result.
//!
//! `n` rows are split over `p` ranks in contiguous blocks. With
//! `base = n / p` and `extra = n % p`, the first `extra` ranks own
//! `base + 1` rows and the rest own `base`, so row counts differ by at most
//! one. Ranks past the last row (when `p > n`) own an empty range.

use std::ops::Range;

use message_passing::Rank;

/// Half-open interval `[start, end)` of row indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    /// # Panics
    ///
    /// Panics if `start > end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "row range {start}..{end} is inverted");
        Self { start, end }
    }

    /// Number of rows. A range built from inverted fields is empty.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, row: usize) -> bool {
        self.start <= row && row < self.end
    }

    pub fn iter(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl IntoIterator for RowRange {
    type Item = usize;
    type IntoIter = Range<usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Rows of an `n`-row problem owned by `rank` out of `p` ranks.
///
/// # Panics
///
/// Panics if `p == 0` or `rank >= p`.
pub fn row_range(n: usize, p: usize, rank: Rank) -> RowRange {
    assert!(rank < p, "rank {rank} out of range for {p} ranks");
    let base = n / p;
    let extra = n % p;
    let start = rank * base + rank.min(extra);
    let len = if rank < extra { base + 1 } else { base };
    RowRange::new(start, start + len)
}

/// Rank owning `row` of an `n`-row problem split over `p` ranks.
///
/// Computed from the row index alone, without scanning ranges. Always
/// agrees with [`row_range`].
///
/// # Panics
///
/// Panics if `p == 0` or `row >= n`.
pub fn owner_of(n: usize, p: usize, row: usize) -> Rank {
    assert!(row < n, "row {row} out of range for {n} rows");
    let base = n / p;
    let extra = n % p;
    let wide = extra * (base + 1);
    if row < wide {
        row / (base + 1)
    } else {
        // row >= wide implies some narrow rank exists, hence base > 0.
        extra + (row - wide) / base
    }
}

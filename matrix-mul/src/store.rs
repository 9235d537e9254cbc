//! Generation and plain-text persistence of operand and result matrices.
//!
//! # File format
//!
//! One line per row; each value is written in base 10 followed by a single
//! space, and each row ends with a newline. There is no header: the size is
//! the number of non-blank lines. Blank lines are skipped on read, so an
//! all-blank trailing section does not survive a round trip.
//!
//! # Layout
//!
//! - **Operands**: `<matrices>/1-<n>.txt` and `<matrices>/2-<n>.txt`
//! - **Results**: `<results>/result-<n>.txt`
//! - **Timings**: `<results>/stats.txt` (sequential) and
//!   `<results>/stats_mpi.txt` (distributed)

use std::fmt::Write;
use std::path::{Path, PathBuf};

use message_passing::Element;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::IoContext;
use crate::timing::{RunKind, TimingSample, format_samples};
use crate::{Error, Matrix};

/// Generated values are drawn uniformly from `[0, VALUE_BOUND)`.
pub const VALUE_BOUND: Element = 100;

/// Generates an `n`×`n` matrix of values in `[0, VALUE_BOUND)`.
pub fn generate<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Matrix {
    Matrix::from_fn(n, |_, _| rng.gen_range(0..VALUE_BOUND))
}

/// Renders a matrix in the plain-text format.
pub fn format_matrix(matrix: &Matrix) -> String {
    let mut out = String::new();
    for row in matrix.rows() {
        for value in row {
            let _ = write!(out, "{value} ");
        }
        out.push('\n');
    }
    out
}

/// Parses the plain-text format.
///
/// Each line is read up to its first token that is not an integer; the rest
/// of that line is dropped. Row widths are not checked against the row
/// count: a non-square result is logged and then padded or truncated to
/// square.
pub fn parse_matrix(text: &str) -> Matrix {
    let mut rows = Vec::new();
    for line in text.lines() {
        let row: Vec<Element> = line
            .split_whitespace()
            .map_while(|token| token.parse().ok())
            .collect();
        if !row.is_empty() {
            rows.push(row);
        }
    }

    if let Some(first) = rows.first() {
        if first.len() != rows.len() {
            warn!(
                rows = rows.len(),
                width = first.len(),
                "matrix is not square, rows will be padded or truncated"
            );
        }
    }

    Matrix::from_rows(rows)
}

pub async fn read_matrix(path: &Path) -> Result<Matrix, Error> {
    let text = tokio::fs::read_to_string(path).await.with_path(path)?;
    Ok(parse_matrix(&text))
}

pub async fn write_matrix(path: &Path, matrix: &Matrix) -> Result<(), Error> {
    tokio::fs::write(path, format_matrix(matrix))
        .await
        .with_path(path)
}

/// Operand, result and timing files of a benchmark run.
#[derive(Debug, Clone)]
pub struct MatrixStore {
    matrices_dir: PathBuf,
    results_dir: PathBuf,
}

impl MatrixStore {
    pub fn new(matrices_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            matrices_dir: matrices_dir.into(),
            results_dir: results_dir.into(),
        }
    }

    /// Path of operand `index` (1 or 2) for size `n`.
    pub fn operand_path(&self, index: u8, n: usize) -> PathBuf {
        self.matrices_dir.join(format!("{index}-{n}.txt"))
    }

    pub fn result_path(&self, n: usize) -> PathBuf {
        self.results_dir.join(format!("result-{n}.txt"))
    }

    pub fn stats_path(&self, kind: RunKind) -> PathBuf {
        let name = match kind {
            RunKind::Sequential => "stats.txt",
            RunKind::Distributed => "stats_mpi.txt",
        };
        self.results_dir.join(name)
    }

    /// Creates the matrices and results directories if missing.
    pub async fn ensure_dirs(&self) -> Result<(), Error> {
        for dir in [&self.matrices_dir, &self.results_dir] {
            tokio::fs::create_dir_all(dir).await.with_path(dir)?;
        }
        Ok(())
    }

    /// Generates and writes both operands for size `n` unless both files
    /// already exist. Returns whether new operands were written.
    pub async fn ensure_operands<R: Rng + Send>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<bool, Error> {
        let paths = [self.operand_path(1, n), self.operand_path(2, n)];
        let mut present = true;
        for path in &paths {
            present &= tokio::fs::try_exists(path).await.with_path(path)?;
        }
        if present {
            debug!(n, "reusing existing operands");
            return Ok(false);
        }

        let operands = [generate(n, rng), generate(n, rng)];
        for (path, matrix) in paths.iter().zip(&operands) {
            write_matrix(path, matrix).await?;
        }
        debug!(n, "generated operands");
        Ok(true)
    }

    pub async fn load_operands(&self, n: usize) -> Result<(Matrix, Matrix), Error> {
        let a = read_matrix(&self.operand_path(1, n)).await?;
        let b = read_matrix(&self.operand_path(2, n)).await?;
        Ok((a, b))
    }

    pub async fn write_result(&self, n: usize, matrix: &Matrix) -> Result<(), Error> {
        write_matrix(&self.result_path(n), matrix).await
    }

    pub async fn write_stats(&self, kind: RunKind, samples: &[TimingSample]) -> Result<(), Error> {
        let path = self.stats_path(kind);
        tokio::fs::write(&path, format_samples(samples))
            .await
            .with_path(path)
    }
}

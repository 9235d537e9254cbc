//! Elapsed-time samples recorded per problem size.

use std::fmt::Write;
use std::time::Duration;

/// Which benchmark a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// One process multiplying the whole matrix.
    Sequential,
    /// All ranks cooperating through the message-passing layer.
    Distributed,
}

/// Wall time of one benchmark run at one problem size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSample {
    pub size: usize,
    pub elapsed_ms: f64,
}

impl TimingSample {
    pub fn new(size: usize, elapsed: Duration) -> Self {
        Self {
            size,
            elapsed_ms: elapsed.as_nanos() as f64 / 1_000_000.0,
        }
    }
}

/// Renders samples one per line as `size elapsed_ms `, the same
/// space-terminated layout used for matrix rows.
pub fn format_samples(samples: &[TimingSample]) -> String {
    let mut out = String::new();
    for sample in samples {
        let _ = writeln!(out, "{} {} ", sample.size, sample.elapsed_ms);
    }
    out
}

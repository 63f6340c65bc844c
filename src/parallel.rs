//! # Parallel execution helpers
//!
//! Block matching runs on the rayon pool of the calling thread. Its rows are split into
//! contiguous partitions which are processed independently.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::ops::Range;

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Number of threads in the pool the algorithms will run on.
pub fn current_threads() -> usize {
    rayon::current_num_threads()
}

/// Split `rows` into at most `partitions` contiguous ranges of near equal length.
///
/// The first `len % partitions` ranges are one row longer than the rest. Empty ranges are never
/// returned.
pub fn partition_rows(rows: Range<usize>, partitions: usize) -> Vec<Range<usize>> {
    let len = rows.end.saturating_sub(rows.start);
    let parts = partitions.max(1).min(len);
    if parts == 0 {
        return Vec::new();
    }

    let (base, extra) = (len / parts, len % parts);
    let mut out = Vec::with_capacity(parts);
    let mut start = rows.start;
    for i in 0..parts {
        let end = start + base + if i < extra { 1 } else { 0 };
        out.push(start..end);
        start = end;
    }
    out
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

//! Row chunking for memory-bounded, strictly sequential processing.

pub const MIN_CHUNKSIZE: usize = 5_000;
pub const MAX_CHUNKSIZE: usize = 60_000;

/// Picks a chunksize when the caller did not supply one: scales with the
/// dataset (rows / 50) and clamps to [MIN_CHUNKSIZE, MAX_CHUNKSIZE].
pub fn resolve_chunksize(explicit: Option<usize>, total_rows: usize) -> usize {
    match explicit {
        Some(c) if c > 0 => c,
        _ => (total_rows / 50).clamp(MIN_CHUNKSIZE, MAX_CHUNKSIZE),
    }
}

/// Splits `rows` into contiguous partitions of at most `chunksize` rows,
/// preserving order. `None` or zero yields a single partition with
/// everything in it.
pub fn partition<T>(rows: &[T], chunksize: Option<usize>) -> Vec<&[T]> {
    match chunksize {
        None | Some(0) => vec![rows],
        Some(c) => rows.chunks(c).collect(),
    }
}

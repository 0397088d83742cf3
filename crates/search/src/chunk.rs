//! Batch chunking for bulk backend calls.

use crate::error::{CoreResult, ValidationError};

/// Splits `items` into consecutive groups of at most `limit` elements.
///
/// Order is preserved and every group except possibly the last holds exactly
/// `limit` elements. An empty input yields no groups.
///
/// # Errors
///
/// * `ValidationError::InvalidChunkLimit` - if `limit` is zero
///
/// # Example
///
/// ```
/// use civreg_search::chunk::create_chunks;
///
/// let chunks = create_chunks(vec![1, 2, 3, 4, 5], 2).unwrap();
/// assert_eq!(chunks, vec![vec![1, 2], vec![3, 4], vec![5]]);
/// ```
pub fn create_chunks<T>(items: Vec<T>, limit: usize) -> CoreResult<Vec<Vec<T>>> {
    if limit == 0 {
        return Err(ValidationError::InvalidChunkLimit { limit: 0 }.into());
    }

    let mut chunks = Vec::with_capacity(items.len().div_ceil(limit));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(limit).collect());
    }
    Ok(chunks)
}

/// Converts a signed limit from untyped input into a chunk limit.
///
/// # Errors
///
/// * `ValidationError::InvalidChunkLimit` - if `limit <= 0`
pub fn chunk_limit(limit: i64) -> CoreResult<usize> {
    if limit <= 0 {
        return Err(ValidationError::InvalidChunkLimit { limit }.into());
    }
    usize::try_from(limit).map_err(|_| ValidationError::InvalidChunkLimit { limit }.into())
}

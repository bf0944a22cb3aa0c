//! Byte range sources.

use crate::error::Nh5Error;

use bytes::Bytes;
use std::sync::Arc;

/// Byte range source trait.
///
/// Defines the interface used by the reader to retrieve parts of a remote container.
/// Implementations must be shareable between tasks so that a single client can serve many
/// concurrent queries.
pub trait RangeSource: Send + Sync {
    /// Retrieve bytes `start..=end` of the container.
    ///
    /// Returns bytes. Fewer bytes than requested may be returned if the range extends past the
    /// end of the container.
    ///
    /// # Arguments
    ///
    /// * `start`: Offset of the first byte
    /// * `end`: Offset of the last byte (inclusive)
    fn get_range(
        &self,
        start: u64,
        end: u64,
    ) -> impl std::future::Future<Output = Result<Bytes, Nh5Error>> + Send;
}

impl<T: RangeSource> RangeSource for Arc<T> {
    fn get_range(
        &self,
        start: u64,
        end: u64,
    ) -> impl std::future::Future<Output = Result<Bytes, Nh5Error>> + Send {
        self.as_ref().get_range(start, end)
    }
}

/// Return an optional inclusive byte range based on the offset and size.
///
/// Returns `None` when `size` is zero since an empty range cannot be requested.
///
/// # Arguments
///
/// * `offset`: Offset of data in bytes
/// * `size`: Size of data in bytes
pub fn get_range(offset: u64, size: u64) -> Result<Option<(u64, u64)>, Nh5Error> {
    let Some(last) = size.checked_sub(1) else {
        return Ok(None);
    };
    // Range-end is inclusive.
    let end = offset
        .checked_add(last)
        .ok_or(Nh5Error::RangeOverflow { offset, size })?;
    Ok(Some((offset, end)))
}

/// Return a byte range string compatible with the HTTP Range header.
pub fn range_header(start: u64, end: u64) -> String {
    format!("bytes={}-{}", start, end)
}

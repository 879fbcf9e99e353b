//! Storage layer errors.

use thiserror::Error;

use crate::storage::PageId;

/// Errors from the raw page device.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The page has not been allocated. Use `allocate_page` to grow the file.
    #[error("page {0} not found in storage")]
    PageNotFound(PageId),

    /// A read/write buffer was not exactly `PAGE_SIZE` bytes.
    #[error("invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },

    /// I/O error from the underlying file system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The storage file has an invalid format or size.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

//! Buffer pool errors.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors from buffer pool operations.
#[derive(Debug, Error)]
pub enum BufferPoolError {
    /// Every frame holds a pinned page; nothing can be evicted.
    #[error("no free frames: all pages are pinned")]
    NoFreeFrames,

    /// Error from the underlying page device.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

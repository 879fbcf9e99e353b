//! Error types for the heap module.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::{BufferPoolError, PageId, StorageError};

/// Errors from heap file operations.
#[derive(Debug, Error)]
pub enum HeapError {
    /// `create_heap_file` was asked to create a file that already exists.
    #[error("heap file already exists: {0}")]
    FileExists(PathBuf),

    /// A record id carried a negative page number.
    #[error("invalid page number {0} in record id")]
    BadPageNo(i32),

    /// A scan filter failed parameter validation.
    #[error("invalid scan parameter: {0}")]
    BadScanParm(&'static str),

    /// A scan was started on a file with no data pages.
    #[error("heap file has no data pages")]
    NoRecords,

    /// A scan ran off the end of the page chain.
    #[error("scan reached the end of the file")]
    FileEof,

    /// The addressed slot is out of bounds or not occupied.
    #[error("slot {slot} of page {page} is not occupied")]
    InvalidSlot { page: PageId, slot: u16 },

    /// A page cannot fit the record.
    #[error("page full: need {required} bytes, have {available} available")]
    PageFull { required: usize, available: usize },

    /// A cursor operation was called before the scan yielded a record.
    #[error("scan has no current record")]
    NoCurrentRecord,

    /// Error from the buffer pool.
    #[error(transparent)]
    Buffer(#[from] BufferPoolError),

    /// Error from the page device.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// I/O error outside the page device (file probe or deletion).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! File-backed storage implementation.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use super::Storage;
use crate::storage::error::StorageError;
use crate::storage::page::{PageId, PAGE_SIZE};

/// Disk-backed storage: one file, pages stored as contiguous blocks.
///
/// ```text
/// +------------------+------------------+------------------+
/// | Page 0           | Page 1           | Page 2           | ...
/// +------------------+------------------+------------------+
/// ^ offset 0         ^ offset PAGE_SIZE ^ offset 2*PAGE_SIZE
/// ```
///
/// A mutex around the file handle serializes seeks against reads/writes.
/// Durability requires an explicit [`Storage::sync_all`]; plain writes only
/// reach the OS cache.
pub struct FileStorage {
    path: PathBuf,
    file: Mutex<File>,
    page_count: AtomicU32,
}

impl FileStorage {
    /// Creates a new, empty storage file.
    ///
    /// # Errors
    ///
    /// Fails with an `AlreadyExists` I/O error if the path is taken.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            page_count: AtomicU32::new(0),
        })
    }

    /// Opens an existing storage file.
    ///
    /// # Errors
    ///
    /// Fails with a `NotFound` I/O error if the file does not exist, and
    /// with `StorageError::Corrupted` if its size is not a whole number of
    /// pages.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        if file_size % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::Corrupted(format!(
                "file size {} is not a multiple of page size {}",
                file_size, PAGE_SIZE
            )));
        }

        Ok(Self {
            path,
            file: Mutex::new(file),
            page_count: AtomicU32::new((file_size / PAGE_SIZE as u64) as u32),
        })
    }

    /// Deletes a storage file from disk.
    ///
    /// The caller must ensure no handle to the file is still open.
    pub fn remove(path: impl AsRef<Path>) -> Result<(), StorageError> {
        std::fs::remove_file(path.as_ref())?;
        Ok(())
    }

    /// Returns the path to the storage file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }
        let count = self.page_count.load(Ordering::Acquire);
        if !page_id.is_valid() || page_id.page_no() as u32 >= count {
            return Err(StorageError::PageNotFound(page_id));
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_id.byte_offset()))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }
        let count = self.page_count.load(Ordering::Acquire);
        if !page_id.is_valid() || page_id.page_no() as u32 >= count {
            return Err(StorageError::PageNotFound(page_id));
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_id.byte_offset()))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId, StorageError> {
        let mut file = self.file.lock();
        let page_no = self.page_count.load(Ordering::Acquire);
        let page_id = PageId::new(page_no as i32);

        // Extend the file with a zeroed page.
        file.seek(SeekFrom::Start(page_id.byte_offset()))?;
        file.write_all(&[0u8; PAGE_SIZE])?;

        self.page_count.store(page_no + 1, Ordering::Release);
        Ok(page_id)
    }

    fn page_count(&self) -> usize {
        self.page_count.load(Ordering::Acquire) as usize
    }

    fn sync_all(&self) -> Result<(), StorageError> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

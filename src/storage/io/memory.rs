//! In-memory storage backend.

use parking_lot::Mutex;

use super::Storage;
use crate::storage::error::StorageError;
use crate::storage::page::{PageData, PageId, PAGE_SIZE};

/// Page storage backed by a vector of in-memory pages.
///
/// Primarily a test backend; it honors the full [`Storage`] contract so the
/// buffer pool behaves identically over it and over [`super::FileStorage`].
pub struct MemoryStorage {
    pages: Mutex<Vec<PageData>>,
}

impl MemoryStorage {
    /// Creates an empty in-memory storage.
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }
        let pages = self.pages.lock();
        if !page_id.is_valid() || page_id.page_no() as usize >= pages.len() {
            return Err(StorageError::PageNotFound(page_id));
        }
        buf.copy_from_slice(pages[page_id.page_no() as usize].as_slice());
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }
        let mut pages = self.pages.lock();
        if !page_id.is_valid() || page_id.page_no() as usize >= pages.len() {
            return Err(StorageError::PageNotFound(page_id));
        }
        pages[page_id.page_no() as usize]
            .as_mut_slice()
            .copy_from_slice(buf);
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId, StorageError> {
        let mut pages = self.pages.lock();
        let page_id = PageId::new(pages.len() as i32);
        pages.push(PageData::new());
        Ok(page_id)
    }

    fn page_count(&self) -> usize {
        self.pages.lock().len()
    }

    fn sync_all(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_starts_at_zero() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.page_count(), 0);
        assert_eq!(storage.first_page(), None);

        assert_eq!(storage.allocate_page().unwrap(), PageId::new(0));
        assert_eq!(storage.allocate_page().unwrap(), PageId::new(1));
        assert_eq!(storage.page_count(), 2);
        assert_eq!(storage.first_page(), Some(PageId::new(0)));
    }

    #[test]
    fn test_write_then_read() {
        let storage = MemoryStorage::new();
        let page_id = storage.allocate_page().unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        buf[0] = 0xAB;
        buf[PAGE_SIZE - 1] = 0xCD;
        storage.write_page(page_id, &buf).unwrap();

        let mut out = vec![0u8; PAGE_SIZE];
        storage.read_page(page_id, &mut out).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn test_fresh_page_is_zeroed() {
        let storage = MemoryStorage::new();
        let page_id = storage.allocate_page().unwrap();

        let mut buf = vec![0xFFu8; PAGE_SIZE];
        storage.read_page(page_id, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_page_not_found() {
        let storage = MemoryStorage::new();
        let mut buf = vec![0u8; PAGE_SIZE];
        assert!(matches!(
            storage.read_page(PageId::new(0), &mut buf),
            Err(StorageError::PageNotFound(_))
        ));
        assert!(matches!(
            storage.read_page(PageId::new(-1), &mut buf),
            Err(StorageError::PageNotFound(_))
        ));
        assert!(matches!(
            storage.write_page(PageId::new(5), &buf),
            Err(StorageError::PageNotFound(_))
        ));
    }

    #[test]
    fn test_buffer_size_validation() {
        let storage = MemoryStorage::new();
        let page_id = storage.allocate_page().unwrap();

        let mut small = vec![0u8; 100];
        assert!(matches!(
            storage.read_page(page_id, &mut small),
            Err(StorageError::InvalidBufferSize { .. })
        ));
        assert!(matches!(
            storage.write_page(page_id, &small),
            Err(StorageError::InvalidBufferSize { .. })
        ));
    }
}

//! Heap file lifecycle and the open-file handle.
//!
//! A heap file is one storage file: a header page followed by a singly
//! linked chain of slotted data pages. [`create_heap_file`] bootstraps a
//! new file, [`destroy_heap_file`] deletes one, and [`HeapFile`] is the
//! open handle that pins the header page for its whole lifetime and keeps
//! at most one data page pinned as the cursor's current page.

use std::ops::Deref;
use std::path::Path;

use log::{debug, error, warn};
use parking_lot::MappedRwLockReadGuard;

use crate::storage::{BufferPool, FileStorage, LruReplacer, PageGuard, PageId, Storage};

use super::error::HeapError;
use super::header::FileHeader;
use super::page::{DataPage, Rid};

/// Frames in the pool backing one open heap file.
pub const DEFAULT_POOL_SIZE: usize = 64;

pub(super) type FilePool = BufferPool<FileStorage, LruReplacer>;
pub(super) type FileGuard = PageGuard<FileStorage, LruReplacer>;

/// Creates a new heap file at `path`.
///
/// The new file gets a header page and one empty data page; the chain
/// anchors point at that page and both counters start at zero records.
///
/// # Errors
///
/// `HeapError::FileExists` when the path is already taken. Failures after
/// the file is created surface as-is; the partially built file is left on
/// disk.
pub fn create_heap_file(path: impl AsRef<Path>) -> Result<(), HeapError> {
    let path = path.as_ref();
    if path.exists() {
        return Err(HeapError::FileExists(path.to_path_buf()));
    }
    debug!("creating heap file {}", path.display());

    let storage = FileStorage::create(path)?;
    let pool = BufferPool::new(storage, LruReplacer::new(), DEFAULT_POOL_SIZE);

    {
        let mut header_guard = pool.alloc_page()?;
        let mut first_guard = pool.alloc_page()?;

        let first_no = first_guard.page_id();
        DataPage::new(&mut *first_guard.data_mut()).init(first_no);

        let mut header = FileHeader::new(&path.to_string_lossy());
        header.first_page = Some(first_no);
        header.last_page = Some(first_no);
        header.page_cnt = 1;
        header.write_to(&mut *header_guard.data_mut());
    }

    pool.flush_all()?;
    Ok(())
}

/// Deletes a heap file from disk.
///
/// The caller must ensure no [`HeapFile`] handle for it is still open.
pub fn destroy_heap_file(path: impl AsRef<Path>) -> Result<(), HeapError> {
    let path = path.as_ref();
    debug!("destroying heap file {}", path.display());
    FileStorage::remove(path)?;
    Ok(())
}

/// An open heap file.
///
/// The handle owns the buffer pool for its file and two kinds of pins: the
/// header page, pinned for the handle's whole lifetime, and at most one
/// data page — the *current page* — tracked together with the last record
/// touched on it. Every record access moves this cursor, so repeated
/// operations against one page skip further I/O.
///
/// Dropping the handle releases both pins and flushes the file; failures on
/// that path are logged, never propagated.
pub struct HeapFile {
    pub(super) pool: FilePool,
    header: FileGuard,
    pub(super) cur: Option<FileGuard>,
    pub(super) cur_rec: Option<Rid>,
}

impl HeapFile {
    /// Opens an existing heap file.
    ///
    /// Pins the header page, and the first data page when the chain is
    /// nonempty. On error the handle owns no pins.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HeapError> {
        let path = path.as_ref();
        debug!("opening heap file {}", path.display());

        let storage = FileStorage::open(path)?;
        let header_page_no = storage.first_page().ok_or_else(|| {
            crate::storage::StorageError::Corrupted("heap file has no header page".into())
        })?;
        let pool = BufferPool::new(storage, LruReplacer::new(), DEFAULT_POOL_SIZE);

        let header_guard = pool.fetch_page(header_page_no)?;
        let header = FileHeader::read_from(&header_guard.data());

        let expected = FileHeader::new(&path.to_string_lossy());
        if header.file_name() != expected.file_name() {
            warn!(
                "heap file {} carries header name {:?}",
                path.display(),
                header.file_name()
            );
        }

        let cur = match header.first_page {
            Some(first) => Some(pool.fetch_page(first)?),
            None => None,
        };

        Ok(Self {
            pool,
            header: header_guard,
            cur,
            cur_rec: None,
        })
    }

    /// Returns the number of live records, from the pinned header. No I/O.
    pub fn record_count(&self) -> i32 {
        self.read_header().rec_cnt
    }

    /// Returns the number of data pages, from the pinned header. No I/O.
    pub fn page_count(&self) -> i32 {
        self.read_header().page_cnt
    }

    /// Retrieves a record by id.
    ///
    /// Moves the page cursor to `rid`'s page (unpinning the previous
    /// current page if it differs) and returns a view borrowed from the
    /// pinned page.
    ///
    /// # Errors
    ///
    /// `BadPageNo` for negative page numbers, `InvalidSlot` for a slot that
    /// is out of bounds or free, and buffer pool errors as-is.
    pub fn get_record(&mut self, rid: Rid) -> Result<Record<'_>, HeapError> {
        if !rid.page_no.is_valid() {
            return Err(HeapError::BadPageNo(rid.page_no.page_no()));
        }

        self.pin_page(rid.page_no)?;
        let occupied = {
            let guard = self.cur_guard()?;
            let data = guard.data();
            DataPage::new(&*data).slot_range(rid.slot_no).is_some()
        };
        if !occupied {
            return Err(HeapError::InvalidSlot {
                page: rid.page_no,
                slot: rid.slot_no,
            });
        }

        self.cur_rec = Some(rid);
        Record::from_page(self.cur_guard()?, rid)
    }

    /// Reads the header payload from the pinned header page.
    pub(super) fn read_header(&self) -> FileHeader {
        FileHeader::read_from(&self.header.data())
    }

    /// Writes the header payload back, marking the header page dirty.
    pub(super) fn write_header(&mut self, header: &FileHeader) {
        header.write_to(&mut *self.header.data_mut());
    }

    /// Makes `page_no` the current page, keeping the existing pin when the
    /// cursor is already there. The previous current page's pin is released
    /// first.
    pub(super) fn pin_page(&mut self, page_no: PageId) -> Result<(), HeapError> {
        if self.cur.as_ref().map_or(false, |g| g.page_id() != page_no) {
            self.cur = None;
        }
        if self.cur.is_none() {
            let guard = self.pool.fetch_page(page_no)?;
            self.cur = Some(guard);
        }
        Ok(())
    }

    /// Returns the current page's guard.
    pub(super) fn cur_guard(&self) -> Result<&FileGuard, HeapError> {
        self.cur.as_ref().ok_or(HeapError::NoCurrentRecord)
    }

    /// Returns the current page's guard mutably.
    pub(super) fn cur_guard_mut(&mut self) -> Result<&mut FileGuard, HeapError> {
        self.cur.as_mut().ok_or(HeapError::NoCurrentRecord)
    }

    /// Allocates and initializes a fresh data page and makes it current,
    /// releasing the previous current page's pin first.
    pub(super) fn alloc_data_page(&mut self) -> Result<PageId, HeapError> {
        let mut guard = self.pool.alloc_page()?;
        let page_no = guard.page_id();
        DataPage::new(&mut *guard.data_mut()).init(page_no);
        self.cur = Some(guard);
        self.cur_rec = None;
        Ok(page_no)
    }
}

impl Drop for HeapFile {
    fn drop(&mut self) {
        let name = self.read_header().file_name().into_owned();
        debug!("closing heap file {name}");
        if let Err(e) = self.pool.flush_all() {
            error!("heap file {name}: flush on close failed: {e}");
        }
    }
}

/// A borrowed view of one record's bytes.
///
/// The view reads straight out of the pinned page, so it stays valid
/// exactly as long as the borrow on the handle or scan that produced it.
pub struct Record<'a> {
    bytes: MappedRwLockReadGuard<'a, [u8]>,
}

impl<'a> Record<'a> {
    pub(super) fn from_page(guard: &'a FileGuard, rid: Rid) -> Result<Record<'a>, HeapError> {
        let data = guard.data();
        let range = {
            let page = DataPage::new(&*data);
            page.slot_range(rid.slot_no)
        }
        .ok_or(HeapError::InvalidSlot {
            page: rid.page_no,
            slot: rid.slot_no,
        })?;
        Ok(Record {
            bytes: MappedRwLockReadGuard::map(data, move |d| &d[range]),
        })
    }

    /// Returns the record's bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Deref for Record<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

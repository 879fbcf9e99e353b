//! Sequential heap file scans.
//!
//! A scan walks the data page chain in order, yielding record ids one at a
//! time and optionally filtering them through a [`Predicate`]. The scan
//! borrows its [`HeapFile`] mutably, so only one scan can be live on a
//! handle at a time, and it drives the handle's page cursor: the current
//! page stays pinned between calls and is exchanged as the scan crosses
//! page boundaries.

use crate::storage::PageId;

use super::error::HeapError;
use super::file::{HeapFile, Record};
use super::filter::Predicate;
use super::page::{DataPage, Rid};

/// A forward scan over a heap file, with optional filtering and a one-deep
/// mark/reset bookmark.
pub struct HeapFileScan<'f> {
    file: &'f mut HeapFile,
    filter: Option<Predicate>,
    marked_page: Option<PageId>,
    marked_rec: Option<Rid>,
}

impl HeapFile {
    /// Starts an unfiltered scan from the beginning of the file.
    pub fn scan(&mut self) -> HeapFileScan<'_> {
        HeapFileScan::new(self, None)
    }

    /// Starts a scan that only yields records matching `filter`.
    pub fn filtered_scan(&mut self, filter: Predicate) -> HeapFileScan<'_> {
        HeapFileScan::new(self, Some(filter))
    }
}

impl<'f> HeapFileScan<'f> {
    fn new(file: &'f mut HeapFile, filter: Option<Predicate>) -> Self {
        // Rewind: the first advance starts at the head of the chain.
        file.cur = None;
        file.cur_rec = None;
        Self {
            file,
            filter,
            marked_page: None,
            marked_rec: None,
        }
    }

    /// Advances to the next matching record and returns its id.
    ///
    /// # Errors
    ///
    /// `NoRecords` when the file has no data pages at all, `FileEof` once
    /// the chain is exhausted, and buffer pool errors as-is.
    pub fn next(&mut self) -> Result<Rid, HeapError> {
        loop {
            let rid = self.advance()?;
            let Some(filter) = &self.filter else {
                return Ok(rid);
            };

            let matched = {
                let guard = self.file.cur_guard()?;
                let data = guard.data();
                let page = DataPage::new(&*data);
                page.read(rid.slot_no).is_some_and(|bytes| filter.matches(bytes))
            };
            if matched {
                return Ok(rid);
            }
        }
    }

    /// Moves the cursor to the next occupied slot, following the page chain
    /// and skipping empty pages.
    fn advance(&mut self) -> Result<Rid, HeapError> {
        loop {
            if self.file.cur.is_none() {
                let first = self.file.read_header().first_page.ok_or(HeapError::NoRecords)?;
                self.file.pin_page(first)?;
                self.file.cur_rec = None;
            }

            let (next_slot, next_page) = {
                let guard = self.file.cur_guard()?;
                let data = guard.data();
                let page = DataPage::new(&*data);
                let slot = match self.file.cur_rec {
                    Some(rid) => page.next_record(rid.slot_no),
                    None => page.first_record(),
                };
                (slot, page.next_page())
            };

            if let Some(slot_no) = next_slot {
                let rid = Rid::new(self.file.cur_guard()?.page_id(), slot_no);
                self.file.cur_rec = Some(rid);
                return Ok(rid);
            }

            // Page exhausted (or empty): follow the chain link.
            match next_page {
                Some(next) => {
                    self.file.pin_page(next)?;
                    self.file.cur_rec = None;
                }
                None => return Err(HeapError::FileEof),
            }
        }
    }

    /// Bookmarks the current scan position.
    pub fn mark(&mut self) {
        self.marked_page = self.file.cur.as_ref().map(|g| g.page_id());
        self.marked_rec = self.file.cur_rec;
    }

    /// Restores the position saved by [`mark`](Self::mark), repinning the
    /// marked page when the scan has moved off it.
    pub fn reset(&mut self) -> Result<(), HeapError> {
        match self.marked_page {
            Some(page_no) => self.file.pin_page(page_no)?,
            None => self.file.cur = None,
        }
        self.file.cur_rec = self.marked_rec;
        Ok(())
    }

    /// Returns the record at the scan's current position.
    pub fn record(&self) -> Result<Record<'_>, HeapError> {
        let rid = self.file.cur_rec.ok_or(HeapError::NoCurrentRecord)?;
        Record::from_page(self.file.cur_guard()?, rid)
    }

    /// Deletes the record at the scan's current position.
    ///
    /// Frees the slot, marks the page dirty, and decrements the file's
    /// record count. The emptied page stays in the chain.
    pub fn delete_record(&mut self) -> Result<(), HeapError> {
        let rid = self.file.cur_rec.ok_or(HeapError::NoCurrentRecord)?;
        {
            let guard = self.file.cur_guard_mut()?;
            let mut data = guard.data_mut();
            DataPage::new(&mut *data).delete(rid.slot_no)?;
        }

        let mut header = self.file.read_header();
        header.rec_cnt -= 1;
        self.file.write_header(&header);
        Ok(())
    }

    /// Marks the current page dirty, for callers that mutate record bytes
    /// in place.
    pub fn mark_dirty(&mut self) -> Result<(), HeapError> {
        self.file.cur_guard_mut()?.mark_dirty();
        Ok(())
    }

    /// Ends the scan: unpins the current page and clears the cursor.
    ///
    /// Idempotent; called automatically when the scan is dropped.
    pub fn end(&mut self) {
        self.file.cur = None;
        self.file.cur_rec = None;
    }
}

impl Drop for HeapFileScan<'_> {
    fn drop(&mut self) {
        self.end();
    }
}

//! Append-style record insertion.
//!
//! Inserts always target the tail of the data page chain. When the tail
//! fills up, a fresh page is allocated, linked from the old tail, and
//! becomes the new tail; free space in interior pages is never revisited.

use super::error::HeapError;
use super::file::HeapFile;
use super::page::{DataPage, Rid};

/// An insertion cursor over a heap file.
///
/// Borrows the handle mutually exclusively with any scan and keeps the tail
/// page pinned as the handle's current page across consecutive inserts.
pub struct InsertFileScan<'f> {
    file: &'f mut HeapFile,
}

impl HeapFile {
    /// Starts inserting records at the tail of the file.
    pub fn inserter(&mut self) -> InsertFileScan<'_> {
        InsertFileScan { file: self }
    }
}

impl InsertFileScan<'_> {
    /// Appends a record and returns its new id.
    ///
    /// # Errors
    ///
    /// `PageFull` when the record cannot fit even on an empty page;
    /// allocation and buffer pool errors as-is.
    pub fn insert_record(&mut self, record: &[u8]) -> Result<Rid, HeapError> {
        // Put the cursor on the tail page, growing the chain from empty if
        // needed. The cursor may sit on an interior page after lookups; the
        // chain is only ever extended at the tail.
        match self.file.read_header().last_page {
            Some(last) => self.file.pin_page(last)?,
            None => {
                let page_no = self.file.alloc_data_page()?;
                let mut header = self.file.read_header();
                header.first_page = Some(page_no);
                header.last_page = Some(page_no);
                header.page_cnt = 1;
                self.file.write_header(&header);
            }
        }

        match self.try_insert(record) {
            Ok(rid) => return Ok(rid),
            Err(HeapError::PageFull { .. }) => {}
            Err(e) => return Err(e),
        }

        // Tail is full: extend the chain. Three pins are live here (header,
        // old tail, new page) until the old tail is swapped out.
        let mut new_guard = self.file.pool.alloc_page()?;
        let new_page_no = new_guard.page_id();
        DataPage::new(&mut *new_guard.data_mut()).init(new_page_no);

        {
            // Link before the old tail's pin drops, so the unpin carries
            // the link write in its dirty flag.
            let old_tail = self.file.cur_guard_mut()?;
            let mut data = old_tail.data_mut();
            DataPage::new(&mut *data).set_next_page(Some(new_page_no));
        }

        let mut header = self.file.read_header();
        header.last_page = Some(new_page_no);
        header.page_cnt += 1;
        self.file.write_header(&header);

        // Unpins the old tail, then the new page becomes current.
        self.file.cur = Some(new_guard);
        self.file.cur_rec = None;

        // An empty page took the place of the full one; only an oversized
        // record can still fail.
        self.try_insert(record)
    }

    /// Inserts into the current page and does the header bookkeeping.
    fn try_insert(&mut self, record: &[u8]) -> Result<Rid, HeapError> {
        let (page_no, slot_no) = {
            let guard = self.file.cur_guard_mut()?;
            let page_no = guard.page_id();
            let mut data = guard.data_mut();
            (page_no, DataPage::new(&mut *data).insert(record)?)
        };

        let rid = Rid::new(page_no, slot_no);
        let mut header = self.file.read_header();
        header.rec_cnt += 1;
        self.file.write_header(&header);
        self.file.cur_rec = Some(rid);
        Ok(rid)
    }
}

impl Drop for InsertFileScan<'_> {
    fn drop(&mut self) {
        // Release the tail pin; its dirty flag already reflects the writes.
        self.file.cur = None;
        self.file.cur_rec = None;
    }
}

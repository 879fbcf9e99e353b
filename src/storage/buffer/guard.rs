//! RAII pin on a buffer pool page.

use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard,
};

use crate::storage::page::PageId;
use crate::storage::Storage;

use super::frame::FrameId;
use super::pool::PoolInner;
use super::replacer::Replacer;

/// A pinned page.
///
/// The guard is the pin: while it lives, the page stays resident and its
/// frame cannot be evicted. Dropping the guard unpins the page, passing
/// along the dirty flag accumulated from every [`data_mut`](Self::data_mut)
/// and [`mark_dirty`](Self::mark_dirty) call made through it. The guard
/// shares ownership of the pool state rather than borrowing it, so a
/// struct can own a pool and long-lived pins into it at the same time.
///
/// Data access locks the frame per call; the returned view must be dropped
/// before the next mutable access.
pub struct PageGuard<S: Storage, R: Replacer> {
    pool: Arc<PoolInner<S, R>>,
    frame_id: FrameId,
    page_id: PageId,
    dirty: bool,
}

impl<S: Storage, R: Replacer> PageGuard<S, R> {
    pub(super) fn new(pool: Arc<PoolInner<S, R>>, frame_id: FrameId, page_id: PageId) -> Self {
        Self {
            pool,
            frame_id,
            page_id,
            dirty: false,
        }
    }

    /// Returns the id of the pinned page.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns true if this guard has written to the page.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Records a write made to the page bytes outside of
    /// [`data_mut`](Self::data_mut) bookkeeping.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.pool.mark_frame_dirty(self.frame_id);
    }

    /// Returns a read view of the page bytes.
    pub fn data(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.pool.frame(self.frame_id).data.read(), |d| d.as_slice())
    }

    /// Returns a write view of the page bytes and marks the page dirty.
    ///
    /// The frame is flagged dirty immediately (not just at unpin) so that a
    /// flush issued while the guard is still held writes the new bytes.
    pub fn data_mut(&mut self) -> MappedRwLockWriteGuard<'_, [u8]> {
        self.dirty = true;
        self.pool.mark_frame_dirty(self.frame_id);
        RwLockWriteGuard::map(self.pool.frame(self.frame_id).data.write(), |d| {
            d.as_mut_slice()
        })
    }
}

impl<S: Storage, R: Replacer> Drop for PageGuard<S, R> {
    fn drop(&mut self) {
        self.pool.unpin(self.frame_id, self.dirty);
    }
}

#[cfg(test)]
mod tests {
    use super::super::pool::BufferPool;
    use super::super::replacer::LruReplacer;
    use super::*;
    use crate::storage::MemoryStorage;

    fn test_pool() -> BufferPool<MemoryStorage, LruReplacer> {
        BufferPool::new(MemoryStorage::new(), LruReplacer::new(), 4)
    }

    #[test]
    fn test_guard_reads_and_writes() {
        let pool = test_pool();
        let mut guard = pool.alloc_page().unwrap();

        assert!(!guard.is_dirty());
        guard.data_mut()[10] = 7;
        assert!(guard.is_dirty());
        assert_eq!(guard.data()[10], 7);
    }

    #[test]
    fn test_clean_guard_stays_clean() {
        let pool = test_pool();
        let guard = pool.alloc_page().unwrap();
        let page_id = guard.page_id();
        let _ = guard.data()[0];
        drop(guard);

        let guard = pool.fetch_page(page_id).unwrap();
        assert!(!guard.is_dirty());
    }

    #[test]
    fn test_dirty_guard_survives_eviction() {
        let pool = BufferPool::new(MemoryStorage::new(), LruReplacer::new(), 1);

        let page_id = {
            let mut guard = pool.alloc_page().unwrap();
            guard.data_mut()[0] = 123;
            guard.page_id()
        };

        // Evict it, then bring it back.
        drop(pool.alloc_page().unwrap());
        let guard = pool.fetch_page(page_id).unwrap();
        assert_eq!(guard.data()[0], 123);
    }

    #[test]
    fn test_flush_sees_writes_through_live_guard() {
        let pool = test_pool();
        let mut guard = pool.alloc_page().unwrap();
        let page_id = guard.page_id();
        guard.data_mut()[0] = 55;

        // Guard still held: flush must already write the new bytes.
        pool.flush_all().unwrap();
        drop(guard);

        let guard = pool.fetch_page(page_id).unwrap();
        assert_eq!(guard.data()[0], 55);
    }
}

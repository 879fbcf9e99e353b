//! Buffer pool manager.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::page::PageId;
use crate::storage::{Storage, StorageError};

use super::error::BufferPoolError;
use super::frame::{Frame, FrameId, FrameMeta};
use super::guard::PageGuard;
use super::replacer::Replacer;

/// A fixed set of frames caching pages from a [`Storage`] backend.
///
/// Pages are mapped to frames on demand. When every frame is occupied, the
/// replacement policy picks an unpinned victim; dirty victims are written
/// back before reuse.
///
/// The pool is a cheap handle around shared state: cloning it shares the
/// same frames, and every [`PageGuard`] keeps that state alive on its own,
/// so a struct can own a pool and long-lived pins into it side by side.
///
/// Lock order is state mutex before frame data lock; no code path acquires
/// them in the other direction.
pub struct BufferPool<S: Storage, R: Replacer> {
    inner: Arc<PoolInner<S, R>>,
}

impl<S: Storage, R: Replacer> Clone for BufferPool<S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(super) struct PoolInner<S: Storage, R: Replacer> {
    storage: S,
    frames: Vec<Frame>,
    state: Mutex<PoolState<R>>,
    pool_size: usize,
}

/// Mutable pool state behind the state mutex.
struct PoolState<R: Replacer> {
    /// Maps loaded pages to their frames.
    page_table: HashMap<PageId, FrameId>,
    /// Per-frame bookkeeping, indexed by frame id.
    meta: Vec<FrameMeta>,
    /// Frames not currently holding any page.
    free_list: Vec<FrameId>,
    /// Eviction policy over unpinned frames.
    replacer: R,
}

impl<S: Storage, R: Replacer> BufferPool<S, R> {
    /// Creates a buffer pool with `pool_size` frames.
    ///
    /// # Panics
    ///
    /// Panics if `pool_size` is 0.
    pub fn new(storage: S, replacer: R, pool_size: usize) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<_> = (0..pool_size).map(|_| Frame::new()).collect();
        let meta: Vec<_> = (0..pool_size).map(|_| FrameMeta::new()).collect();
        let free_list: Vec<_> = (0..pool_size).map(FrameId::new).collect();

        Self {
            inner: Arc::new(PoolInner {
                storage,
                frames,
                state: Mutex::new(PoolState {
                    page_table: HashMap::with_capacity(pool_size),
                    meta,
                    free_list,
                    replacer,
                }),
                pool_size,
            }),
        }
    }

    /// Pins a page, loading it from storage on a miss.
    ///
    /// # Errors
    ///
    /// `NoFreeFrames` when the pool is full of pinned pages, and any storage
    /// error from the load or from a dirty victim's write-back.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PageGuard<S, R>, BufferPoolError> {
        let frame_id = self.inner.pin_frame(page_id)?;
        Ok(PageGuard::new(Arc::clone(&self.inner), frame_id, page_id))
    }

    /// Allocates a new page in storage and returns it pinned.
    ///
    /// The new page is zeroed.
    pub fn alloc_page(&self) -> Result<PageGuard<S, R>, BufferPoolError> {
        let page_id = self.inner.storage.allocate_page()?;
        self.fetch_page(page_id)
    }

    /// Writes a page back to storage if it is cached and dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        self.inner.flush_page(page_id)
    }

    /// Writes every dirty frame back to storage, then syncs the device.
    pub fn flush_all(&self) -> Result<(), BufferPoolError> {
        self.inner.flush_all()
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.inner.pool_size
    }

    /// Returns the number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.inner.state.lock().page_table.len()
    }
}

impl<S: Storage, R: Replacer> PoolInner<S, R> {
    /// Finds or loads the frame for `page_id` and takes a pin on it.
    fn pin_frame(&self, page_id: PageId) -> Result<FrameId, BufferPoolError> {
        if !page_id.is_valid() {
            return Err(StorageError::PageNotFound(page_id).into());
        }

        let mut state = self.state.lock();

        // Hit: bump the pin count.
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let idx = frame_id.as_usize();
            if state.meta[idx].pin_count == 0 {
                state.replacer.pin(frame_id);
            }
            state.meta[idx].pin_count += 1;
            return Ok(frame_id);
        }

        // Miss: take a frame and load the page into it.
        let frame_id = self.take_frame(&mut state)?;
        let idx = frame_id.as_usize();
        {
            let mut data = self.frames[idx].data.write();
            if let Err(e) = self.storage.read_page(page_id, data.as_mut_slice()) {
                // Return the frame to the free list so it is not leaked.
                state.free_list.push(frame_id);
                return Err(e.into());
            }
        }

        state.page_table.insert(page_id, frame_id);
        state.meta[idx].reset(page_id);
        Ok(frame_id)
    }

    /// Produces an empty frame: from the free list, or by evicting an
    /// unpinned victim (writing it back first when dirty).
    fn take_frame(&self, state: &mut PoolState<R>) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let frame_id = state.replacer.victim().ok_or(BufferPoolError::NoFreeFrames)?;
        let idx = frame_id.as_usize();

        if let Some(old_page) = state.meta[idx].page_id {
            if state.meta[idx].is_dirty {
                let data = self.frames[idx].data.read();
                if let Err(e) = self.storage.write_page(old_page, data.as_slice()) {
                    drop(data);
                    // Keep the victim evictable for a later attempt.
                    state.replacer.unpin(frame_id);
                    return Err(e.into());
                }
            }
            state.page_table.remove(&old_page);
        }

        state.meta[idx].clear();
        Ok(frame_id)
    }

    fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut state = self.state.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let idx = frame_id.as_usize();
            if state.meta[idx].is_dirty {
                let data = self.frames[idx].data.read();
                self.storage.write_page(page_id, data.as_slice())?;
                drop(data);
                state.meta[idx].is_dirty = false;
            }
        }
        Ok(())
    }

    fn flush_all(&self) -> Result<(), BufferPoolError> {
        let mut state = self.state.lock();
        let dirty: Vec<(FrameId, PageId)> = state
            .meta
            .iter()
            .enumerate()
            .filter_map(|(idx, meta)| match (meta.is_dirty, meta.page_id) {
                (true, Some(page_id)) => Some((FrameId::new(idx), page_id)),
                _ => None,
            })
            .collect();

        for (frame_id, page_id) in dirty {
            let idx = frame_id.as_usize();
            let data = self.frames[idx].data.read();
            self.storage.write_page(page_id, data.as_slice())?;
            drop(data);
            state.meta[idx].is_dirty = false;
        }

        self.storage.sync_all()?;
        Ok(())
    }

    /// Releases one pin on a frame. Called from [`PageGuard::drop`].
    ///
    /// The dirty flag is the OR of all writes made through the guard being
    /// dropped.
    pub(super) fn unpin(&self, frame_id: FrameId, dirty: bool) {
        let mut state = self.state.lock();
        let idx = frame_id.as_usize();

        debug_assert!(state.meta[idx].pin_count > 0, "unpin without a pin");
        if state.meta[idx].pin_count == 0 {
            return;
        }

        state.meta[idx].pin_count -= 1;
        if dirty {
            state.meta[idx].is_dirty = true;
        }
        if state.meta[idx].pin_count == 0 {
            state.replacer.unpin(frame_id);
        }
    }

    /// Records that a page was written through a still-held guard, so that
    /// flushes running before the guard drops see the frame as dirty.
    pub(super) fn mark_frame_dirty(&self, frame_id: FrameId) {
        self.state.lock().meta[frame_id.as_usize()].is_dirty = true;
    }

    /// Returns the frame for data access by a guard.
    pub(super) fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.as_usize()]
    }
}

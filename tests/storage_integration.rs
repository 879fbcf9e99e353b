//! Integration tests for the storage layer: buffer pool over disk-backed
//! storage, exercising persistence and eviction through a real file.

use heapstore::storage::{
    BufferPool, BufferPoolError, FileStorage, LruReplacer, PageId, Storage,
};
use tempfile::tempdir;

fn file_pool(storage: FileStorage, pool_size: usize) -> BufferPool<FileStorage, LruReplacer> {
    BufferPool::new(storage, LruReplacer::new(), pool_size)
}

#[test]
fn test_pool_persists_through_eviction_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pool.db");

    let mut page_ids = Vec::new();
    {
        // Pool much smaller than the working set: most writes reach the
        // file through eviction, the rest through the final flush.
        let pool = file_pool(FileStorage::create(&path).unwrap(), 4);
        for i in 0..10u8 {
            let mut guard = pool.alloc_page().unwrap();
            guard.data_mut()[0] = i;
            guard.data_mut()[100] = i.wrapping_mul(3);
            page_ids.push(guard.page_id());
        }
        pool.flush_all().unwrap();
    }

    let pool = file_pool(FileStorage::open(&path).unwrap(), 4);
    for (i, &page_id) in page_ids.iter().enumerate() {
        let guard = pool.fetch_page(page_id).unwrap();
        assert_eq!(guard.data()[0], i as u8);
        assert_eq!(guard.data()[100], (i as u8).wrapping_mul(3));
    }
}

#[test]
fn test_pool_exhaustion_over_file_storage() {
    let dir = tempdir().unwrap();
    let pool = file_pool(FileStorage::create(dir.path().join("pool.db")).unwrap(), 2);

    let _g0 = pool.alloc_page().unwrap();
    let _g1 = pool.alloc_page().unwrap();
    assert!(matches!(
        pool.alloc_page(),
        Err(BufferPoolError::NoFreeFrames)
    ));

    drop(_g1);
    assert!(pool.alloc_page().is_ok());
}

#[test]
fn test_flush_page_is_selective() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pool.db");

    let storage = FileStorage::create(&path).unwrap();
    let pool = file_pool(storage, 8);

    let clean_id;
    let dirty_id;
    {
        let guard = pool.alloc_page().unwrap();
        clean_id = guard.page_id();
    }
    {
        let mut guard = pool.alloc_page().unwrap();
        dirty_id = guard.page_id();
        guard.data_mut()[7] = 0xEE;
    }

    pool.flush_page(clean_id).unwrap();
    pool.flush_page(dirty_id).unwrap();
    drop(pool);

    let verify = FileStorage::open(&path).unwrap();
    let mut buf = vec![0u8; heapstore::storage::PAGE_SIZE];
    verify.read_page(dirty_id, &mut buf).unwrap();
    assert_eq!(buf[7], 0xEE);
    verify.read_page(clean_id, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn test_allocation_is_stable_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pool.db");

    {
        let storage = FileStorage::create(&path).unwrap();
        storage.allocate_page().unwrap();
        storage.allocate_page().unwrap();
    }

    let storage = FileStorage::open(&path).unwrap();
    assert_eq!(storage.page_count(), 2);
    assert_eq!(storage.first_page(), Some(PageId::new(0)));
    // New allocations continue after the existing pages.
    assert_eq!(storage.allocate_page().unwrap(), PageId::new(2));
}

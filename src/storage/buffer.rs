//! Pinning buffer pool.
//!
//! The buffer pool caches pages from a [`Storage`](crate::storage::Storage)
//! backend in a fixed set of frames. Pages are handed out as [`PageGuard`]s:
//! a guard is a pin, and dropping it releases the pin together with the
//! dirty flag accumulated from writes made through it. Unpinned frames are
//! eligible for eviction (dirty victims are written back first).

mod error;
mod frame;
mod guard;
mod pool;
mod replacer;

pub use error::BufferPoolError;
pub use frame::FrameId;
pub use guard::PageGuard;
pub use pool::BufferPool;
pub use replacer::{LruReplacer, Replacer};

//! Lazily-initialized, resettable holder for a process-wide index handle.
//!
//! The first caller of [`IndexSlot::get_or_try_init`] opens the index; all
//! concurrent first callers wait on the same lock, so initialization runs
//! once. [`IndexSlot::reset`] drops the cached handle (optionally switching
//! directory) so the next access reopens from disk.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

struct SlotState<T> {
    dir: PathBuf,
    handle: Option<Arc<T>>,
}

pub struct IndexSlot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> IndexSlot<T> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            state: Mutex::new(SlotState {
                dir: dir.into(),
                handle: None,
            }),
        }
    }

    /// Return the cached handle, opening it with `init` on first use.
    ///
    /// A failed `init` leaves the slot empty so a later call can retry.
    pub async fn get_or_try_init<F, Fut, E>(&self, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut state = self.state.lock().await;
        if let Some(handle) = &state.handle {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(init(state.dir.clone()).await?);
        state.handle = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Drop the cached handle. With `Some(dir)` the next init uses `dir`.
    pub async fn reset(&self, dir: Option<PathBuf>) {
        let mut state = self.state.lock().await;
        state.handle = None;
        if let Some(dir) = dir {
            state.dir = dir;
        }
    }

    pub async fn dir(&self) -> PathBuf {
        self.state.lock().await.dir.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.handle.is_some()
    }
}

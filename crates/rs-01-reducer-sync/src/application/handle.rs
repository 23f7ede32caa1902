//! Per-reducer runtime slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard};

use crate::domain::checkpoint::{Checkpoint, CheckpointSnapshot};
use crate::ports::outbound::Reducer;

/// A reducer together with its checkpoint.
///
/// The checkpoint mutex is held only by the task currently applying an
/// event to this reducer. Everyone else reads the published snapshot.
pub(crate) struct ReducerHandle {
    name: String,
    reducer: Arc<dyn Reducer>,
    checkpoint: Mutex<Checkpoint>,
    published: watch::Sender<Arc<CheckpointSnapshot>>,
    dirty: AtomicBool,
}

impl ReducerHandle {
    pub(crate) fn new(reducer: Arc<dyn Reducer>, checkpoint: Checkpoint) -> Self {
        let (published, _) = watch::channel(Arc::new(checkpoint.snapshot()));
        Self {
            name: checkpoint.name().to_string(),
            reducer,
            checkpoint: Mutex::new(checkpoint),
            published,
            dirty: AtomicBool::new(false),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn reducer(&self) -> &dyn Reducer {
        self.reducer.as_ref()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Checkpoint> {
        self.checkpoint.lock().await
    }

    /// Latest published snapshot.
    pub(crate) fn snapshot(&self) -> Arc<CheckpointSnapshot> {
        Arc::clone(&self.published.borrow())
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<CheckpointSnapshot>> {
        self.published.subscribe()
    }

    /// Publish the checkpoint to readers.
    pub(crate) fn publish(&self, checkpoint: &Checkpoint) {
        self.published.send_replace(Arc::new(checkpoint.snapshot()));
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clear the dirty flag, returning whether it was set.
    pub(crate) fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

//! In-memory `ReducerStateStore`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::checkpoint::ReducerState;
use crate::domain::errors::StoreError;
use crate::ports::outbound::ReducerStateStore;

/// Rows kept in a map. Clones share the same rows.
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    rows: Arc<RwLock<BTreeMap<String, ReducerState>>>,
    saves: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `states`.
    pub fn with_states(states: impl IntoIterator<Item = ReducerState>) -> Self {
        let store = Self::new();
        {
            let mut rows = store.rows.write();
            for state in states {
                rows.insert(state.name.clone(), state);
            }
        }
        store
    }

    pub fn get(&self, name: &str) -> Option<ReducerState> {
        self.rows.read().get(name).cloned()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every following `save` fail until turned off again.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReducerStateStore for MemoryStateStore {
    async fn load(&self, name: &str) -> Result<Option<ReducerState>, StoreError> {
        Ok(self.get(name))
    }

    async fn load_all(&self) -> Result<Vec<ReducerState>, StoreError> {
        Ok(self.rows.read().values().cloned().collect())
    }

    async fn save(&self, state: &ReducerState) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("save rejected".to_string()));
        }
        self.rows.write().insert(state.name.clone(), state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

//! Reducer keeping its view as a list of applied points.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{Block, Point, Slot};

use crate::domain::errors::ReducerError;
use crate::ports::outbound::Reducer;

#[derive(Default)]
struct View {
    rows: Vec<Point>,
    forwards: usize,
    rollbacks: Vec<Slot>,
}

/// Records every block it applies and every rollback cutoff it receives.
///
/// Clones share the same view, so a test can keep one and hand the other to
/// the service.
#[derive(Clone)]
pub struct RecordingReducer {
    name: String,
    dependencies: Vec<String>,
    tip: Option<Point>,
    view: Arc<Mutex<View>>,
    fail_at: Arc<Mutex<Option<Slot>>>,
}

impl RecordingReducer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            tip: None,
            view: Arc::new(Mutex::new(View::default())),
            fail_at: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Answer `query_tip` with `point`.
    pub fn with_tip(mut self, point: Point) -> Self {
        self.tip = Some(point);
        self
    }

    /// Fail `roll_forward` for the block at `slot`.
    pub fn fail_at(&self, slot: Slot) {
        *self.fail_at.lock() = Some(slot);
    }

    /// Slots currently in the view, in application order.
    pub fn slots(&self) -> Vec<Slot> {
        self.view.lock().rows.iter().map(|p| p.slot).collect()
    }

    pub fn rows(&self) -> Vec<Point> {
        self.view.lock().rows.clone()
    }

    /// Total `roll_forward` calls that succeeded.
    pub fn forward_count(&self) -> usize {
        self.view.lock().forwards
    }

    /// Cutoffs received by `roll_backward`, in order.
    pub fn rollbacks(&self) -> Vec<Slot> {
        self.view.lock().rollbacks.clone()
    }

    pub fn into_reducer(self) -> Arc<dyn Reducer> {
        Arc::new(self)
    }
}

#[async_trait]
impl Reducer for RecordingReducer {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn roll_forward(&self, block: &Block) -> Result<(), ReducerError> {
        if *self.fail_at.lock() == Some(block.slot()) {
            return Err(ReducerError::Storage(format!(
                "cannot write block {}",
                block.point()
            )));
        }
        let mut view = self.view.lock();
        view.rows.push(block.point());
        view.forwards += 1;
        Ok(())
    }

    async fn roll_backward(&self, cutoff: Slot) -> Result<(), ReducerError> {
        let mut view = self.view.lock();
        view.rows.retain(|point| point.slot < cutoff);
        view.rollbacks.push(cutoff);
        Ok(())
    }

    async fn query_tip(&self) -> Result<Option<Point>, ReducerError> {
        Ok(self.tip.clone())
    }
}

//! # Reducer Sync Service
//!
//! Owns every reducer handle and the dependency graph. Startup resolves
//! and persists resume points; afterwards the service applies events for a
//! whole lineage (root plus transitive dependents) and flushes checkpoints.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use indexer_telemetry::{
    log_reducer_event, BLOCKS_APPLIED, PROVIDER_CONNECTIONS, REDUCER_ERRORS, REDUCER_SLOT,
    ROLLBACKS_APPLIED, STATE_FLUSHES,
};
use parking_lot::RwLock;
use shared_types::{Block, Point, RollbackKind, Slot};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::algorithms::{
    build_dependency_graph, check_rollback_depth, initialize_all_reducer_states,
    safe_intersection_points,
};
use crate::application::handle::ReducerHandle;
use crate::config::SyncConfig;
use crate::domain::checkpoint::{Checkpoint, CheckpointSnapshot};
use crate::domain::entities::DependencyGraph;
use crate::domain::errors::{ReducerError, SyncError};
use crate::domain::invariants;
use crate::domain::value_objects::SyncPhase;
use crate::ports::inbound::ReducerSyncApi;
use crate::ports::outbound::{ChainProviderFactory, Reducer, ReducerStateStore};

/// Reducer Sync Service
///
/// Built once by [`ReducerSyncService::initialize`]; run with
/// [`ReducerSyncService::run`].
pub struct ReducerSyncService {
    pub(crate) config: SyncConfig,
    pub(crate) graph: DependencyGraph,
    handles: HashMap<String, Arc<ReducerHandle>>,
    store: Arc<dyn ReducerStateStore>,
    pub(crate) factory: Arc<dyn ChainProviderFactory>,
    phases: RwLock<HashMap<String, SyncPhase>>,
}

impl ReducerSyncService {
    /// Build the graph, load or bootstrap every checkpoint, normalize start
    /// points and persist all rows.
    ///
    /// No subscription is opened here. Any error is fatal.
    pub async fn initialize(
        config: SyncConfig,
        reducers: Vec<Arc<dyn Reducer>>,
        store: Arc<dyn ReducerStateStore>,
        factory: Arc<dyn ChainProviderFactory>,
    ) -> Result<Self, SyncError> {
        let graph = build_dependency_graph(
            reducers
                .iter()
                .map(|reducer| (reducer.name().to_string(), reducer.dependencies())),
        )?;

        info!(
            reducers = graph.node_count(),
            edges = graph.edge_count(),
            roots = ?graph.root_reducers(),
            "Dependency graph built"
        );

        let mut by_name: HashMap<String, Arc<dyn Reducer>> = reducers
            .into_iter()
            .map(|reducer| (reducer.name().to_string(), reducer))
            .collect();

        // Load stored rows, bootstrapping the missing ones
        let mut checkpoints: HashMap<String, Checkpoint> = HashMap::new();
        let mut provider_tip: Option<Point> = None;
        for name in graph.topological_order() {
            let Some(reducer) = by_name.get(name) else {
                return Err(SyncError::UnknownReducer(name.clone()));
            };

            let checkpoint = match store.load(name).await? {
                Some(state) => {
                    debug!(reducer = %name, start = %state.start_intersection, "Loaded reducer state");
                    Checkpoint::from_state(state, config.rollback_buffer)
                }
                None => {
                    let start = Self::bootstrap_point(
                        &config,
                        reducer.as_ref(),
                        factory.as_ref(),
                        &mut provider_tip,
                    )
                    .await?;
                    info!(reducer = %name, start = %start, "Created reducer state");
                    Checkpoint::new(name.clone(), start, config.rollback_buffer)
                }
            };
            checkpoints.insert(name.clone(), checkpoint);
        }

        for change in initialize_all_reducer_states(&graph, &mut checkpoints) {
            warn!(
                reducer = %change.reducer,
                from = %change.from,
                to = %change.to,
                "Start intersection moved up to dependency frontier"
            );
        }

        // Persist every start before any subscription opens
        for name in graph.topological_order() {
            if let Some(checkpoint) = checkpoints.get(name) {
                store.save(&checkpoint.to_state()).await?;
            }
        }

        let mut handles = HashMap::with_capacity(checkpoints.len());
        for (name, checkpoint) in checkpoints {
            if let Some(reducer) = by_name.remove(&name) {
                REDUCER_SLOT
                    .with_label_values(&[name.as_str()])
                    .set(checkpoint.latest_slot() as i64);
                handles.insert(name, Arc::new(ReducerHandle::new(reducer, checkpoint)));
            }
        }

        Ok(Self {
            config,
            graph,
            handles,
            store,
            factory,
            phases: RwLock::new(HashMap::new()),
        })
    }

    /// Bootstrap point for a reducer with no stored row: per-reducer
    /// override, then the reducer's own tip, then the global default, then
    /// the provider tip (queried at most once).
    async fn bootstrap_point(
        config: &SyncConfig,
        reducer: &dyn Reducer,
        factory: &dyn ChainProviderFactory,
        provider_tip: &mut Option<Point>,
    ) -> Result<Point, SyncError> {
        let name = reducer.name();
        if let Some(point) = config.start_overrides.get(name) {
            return Ok(point.clone());
        }

        let started = Instant::now();
        let queried = reducer
            .query_tip()
            .await
            .map_err(|source| SyncError::ReducerFailed {
                reducer: name.to_string(),
                slot: 0,
                action: "query_tip",
                elapsed_ms: started.elapsed().as_millis(),
                source,
            })?;
        if let Some(point) = queried {
            return Ok(point);
        }

        if let Some(point) = &config.default_start {
            return Ok(point.clone());
        }

        if let Some(point) = provider_tip {
            return Ok(point.clone());
        }

        let provider = factory.create_provider().await?;
        PROVIDER_CONNECTIONS.with_label_values(&["tip"]).inc();
        let tip = provider.get_tip(config.network_magic).await?;
        info!(tip = %tip, "Queried provider tip for bootstrap");
        *provider_tip = Some(tip.clone());
        Ok(tip)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Current phase of a root reducer's task, if it ever started.
    pub fn phase(&self, root: &str) -> Option<SyncPhase> {
        self.phases.read().get(root).copied()
    }

    pub(crate) fn set_phase(&self, root: &str, phase: SyncPhase) {
        self.phases.write().insert(root.to_string(), phase);
    }

    fn handle(&self, name: &str) -> Result<&Arc<ReducerHandle>, SyncError> {
        self.handles
            .get(name)
            .ok_or_else(|| SyncError::UnknownReducer(name.to_string()))
    }

    fn snapshot_of(&self, name: &str) -> Option<Arc<CheckpointSnapshot>> {
        self.handles.get(name).map(|handle| handle.snapshot())
    }

    /// Subscribe to every checkpoint change of `reducer`.
    pub fn watch_checkpoint(
        &self,
        reducer: &str,
    ) -> Result<watch::Receiver<Arc<CheckpointSnapshot>>, SyncError> {
        Ok(self.handle(reducer)?.subscribe())
    }

    /// Points a root subscription opens at: the safe intersection, or the
    /// start intersection when nothing is recorded yet.
    pub fn resume_intersections(&self, root: &str) -> Result<Vec<Point>, SyncError> {
        let points = self.safe_intersection_points(root)?;
        if !points.is_empty() {
            return Ok(points);
        }
        Ok(vec![self.handle(root)?.snapshot().start_intersection.clone()])
    }

    /// Slots every dependency of `name` has reached.
    fn dependency_frontiers(&self, name: &str) -> Vec<Slot> {
        self.graph
            .dependencies(name)
            .iter()
            .filter_map(|dep| self.snapshot_of(dep))
            .map(|snapshot| snapshot.latest_slot())
            .collect()
    }

    fn gate(&self, name: &str, checkpoint: &Checkpoint, slot: Slot) -> bool {
        invariants::should_process_block(
            checkpoint.start_intersection().slot,
            checkpoint.latest_point().map(|point| point.slot),
            self.dependency_frontiers(name),
            slot,
        )
    }

    /// Apply `block` to one reducer if its gate passes. Returns whether it
    /// was applied.
    async fn apply_block(&self, handle: &ReducerHandle, block: &Block) -> Result<bool, SyncError> {
        let name = handle.name();
        let slot = block.slot();
        let mut checkpoint = handle.lock().await;

        if !self.gate(name, &checkpoint, slot) {
            debug!(reducer = %name, slot, "Block skipped by gate");
            return Ok(false);
        }

        let started = Instant::now();
        if let Err(source) = handle.reducer().roll_forward(block).await {
            return Err(self.transform_failed(name, slot, "roll_forward", started, source));
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;

        checkpoint.record(block.point());
        handle.publish(&checkpoint);
        handle.mark_dirty();

        BLOCKS_APPLIED.with_label_values(&[name]).inc();
        REDUCER_SLOT.with_label_values(&[name]).set(slot as i64);
        log_reducer_event!(
            info,
            name,
            "roll_forward",
            slot,
            "Block applied",
            hash = %block.hash(),
            transactions = block.transactions().len(),
            elapsed_ms = elapsed_ms
        );
        Ok(true)
    }

    /// Undo everything at or above the cutoff of `point` on one reducer.
    ///
    /// `guarded` rollbacks deeper than the rollback buffer are rejected
    /// before the transform runs.
    async fn apply_rollback(
        &self,
        handle: &ReducerHandle,
        point: &Point,
        kind: RollbackKind,
        guarded: bool,
    ) -> Result<(), SyncError> {
        let name = handle.name();
        let cutoff = kind.cutoff_slot(point);
        let mut checkpoint = handle.lock().await;

        let latest_recorded = checkpoint.latest_point().map(|p| p.slot);
        let depth = if guarded {
            check_rollback_depth(name, latest_recorded, cutoff, self.config.rollback_buffer)
        } else {
            Ok(())
        };
        if let Err(err) = depth {
            REDUCER_ERRORS
                .with_label_values(&[name, "mass_rollback"])
                .inc();
            error!(reducer = %name, cutoff, latest_slot = ?latest_recorded, "Critical node: mass rollback detected");
            return Err(err);
        }

        let started = Instant::now();
        if let Err(source) = handle.reducer().roll_backward(cutoff).await {
            return Err(self.transform_failed(name, cutoff, "roll_backward", started, source));
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let removed = checkpoint.rollback(point, kind);
        handle.publish(&checkpoint);
        handle.mark_dirty();

        ROLLBACKS_APPLIED.with_label_values(&[name]).inc();
        REDUCER_SLOT
            .with_label_values(&[name])
            .set(checkpoint.latest_slot() as i64);
        log_reducer_event!(
            info,
            name,
            "roll_backward",
            cutoff,
            "Rollback applied",
            point = %point,
            removed = removed,
            elapsed_ms = elapsed_ms
        );
        Ok(())
    }

    fn transform_failed(
        &self,
        reducer: &str,
        slot: Slot,
        action: &'static str,
        started: Instant,
        source: ReducerError,
    ) -> SyncError {
        let elapsed_ms = started.elapsed().as_millis();
        REDUCER_ERRORS.with_label_values(&[reducer, action]).inc();
        error!(reducer = %reducer, action, slot, elapsed_ms = elapsed_ms as u64, error = %source, "Reducer transform failed");
        SyncError::ReducerFailed {
            reducer: reducer.to_string(),
            slot,
            action,
            elapsed_ms,
            source,
        }
    }

    async fn rollback_lineage(
        &self,
        root: &str,
        point: &Point,
        kind: RollbackKind,
        guarded: bool,
    ) -> Result<(), SyncError> {
        self.apply_rollback(self.handle(root)?, point, kind, guarded)
            .await?;

        for dependent in self.graph.transitive_dependents(root) {
            self.apply_rollback(self.handle(&dependent)?, point, kind, guarded)
                .await?;
        }
        Ok(())
    }

    /// Rewind a lineage to the intersection its subscription opened at.
    ///
    /// The intersection was chosen from the lineage's own checkpoints, so it
    /// may lie below the root's retained history when a dependent lags by
    /// more than the rollback buffer. The depth guard does not apply.
    pub async fn rewind_to_intersection(
        &self,
        root: &str,
        point: &Point,
        kind: RollbackKind,
    ) -> Result<(), SyncError> {
        info!(reducer = %root, intersection = %point, "Rewinding lineage to subscription intersection");
        self.rollback_lineage(root, point, kind, false).await
    }

    /// Write every checkpoint changed since the last flush.
    ///
    /// Each flushed reducer's start intersection first advances to its own
    /// latest point. A failed write leaves the row dirty for the next flush.
    pub async fn flush(&self) -> Result<usize, SyncError> {
        let mut written = 0;

        for name in self.graph.topological_order() {
            let handle = self.handle(name)?;
            if !handle.take_dirty() {
                continue;
            }

            let state = {
                let mut checkpoint = handle.lock().await;
                if checkpoint.advance_start() {
                    handle.publish(&checkpoint);
                }
                checkpoint.to_state()
            };

            if let Err(err) = self.store.save(&state).await {
                handle.mark_dirty();
                error!(reducer = %name, error = %err, "Failed to persist reducer state");
                return Err(err.into());
            }

            STATE_FLUSHES.inc();
            written += 1;
        }

        if written > 0 {
            debug!(rows = written, "Reducer states flushed");
        }
        Ok(written)
    }
}

#[async_trait]
impl ReducerSyncApi for ReducerSyncService {
    fn should_process_block(&self, reducer: &str, slot: Slot) -> Result<bool, SyncError> {
        let snapshot = self.handle(reducer)?.snapshot();
        Ok(invariants::should_process_block(
            snapshot.start_intersection.slot,
            snapshot.latest_point().map(|point| point.slot),
            self.dependency_frontiers(reducer),
            slot,
        ))
    }

    fn safe_intersection_points(&self, reducer: &str) -> Result<Vec<Point>, SyncError> {
        self.handle(reducer)?;
        Ok(safe_intersection_points(&self.graph, reducer, |name| {
            self.snapshot_of(name)
        }))
    }

    fn checkpoint(&self, reducer: &str) -> Result<Arc<CheckpointSnapshot>, SyncError> {
        Ok(self.handle(reducer)?.snapshot())
    }

    async fn roll_forward_lineage(&self, root: &str, block: &Block) -> Result<usize, SyncError> {
        let mut applied = usize::from(self.apply_block(self.handle(root)?, block).await?);

        for dependent in self.graph.transitive_dependents(root) {
            if self.apply_block(self.handle(&dependent)?, block).await? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    async fn roll_backward_lineage(
        &self,
        root: &str,
        point: &Point,
        kind: RollbackKind,
    ) -> Result<(), SyncError> {
        self.rollback_lineage(root, point, kind, true).await
    }

    async fn flush(&self) -> Result<usize, SyncError> {
        ReducerSyncService::flush(self).await
    }
}

//! # Sync Loop Tests for Reducer Sync (rs-01)
//!
//! Run the root subscription tasks against an in-memory chain.

use std::sync::Arc;
use std::time::Duration;

use rs_01_reducer_sync::{
    MemoryChain, MemoryStateStore, RecordingReducer, ReducerState, ReducerSyncService,
    SyncConfig, SyncError, SyncPhase,
};
use shared_types::{Block, Point, RollbackKind, Slot};
use tokio::sync::watch;
use tokio::task::JoinHandle;

// =============================================================================
// TEST HELPERS
// =============================================================================

const WAIT: Duration = Duration::from_secs(5);

fn block(slot: Slot) -> Block {
    Block::new(slot, format!("h{slot}"))
}

fn p(slot: Slot) -> Point {
    Point::new(slot, format!("h{slot}"))
}

fn blocks(slots: std::ops::RangeInclusive<Slot>) -> Vec<Block> {
    slots.map(block).collect()
}

struct Running {
    service: Arc<ReducerSyncService>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), SyncError>>,
}

impl Running {
    async fn start(
        config: SyncConfig,
        reducers: &[RecordingReducer],
        store: &MemoryStateStore,
        chain: &MemoryChain,
    ) -> Self {
        let service = ReducerSyncService::initialize(
            config,
            reducers.iter().cloned().map(RecordingReducer::into_reducer).collect(),
            Arc::new(store.clone()),
            Arc::new(chain.clone()),
        )
        .await
        .unwrap();
        let service = Arc::new(service);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&service).run(shutdown_rx));
        Self {
            service,
            shutdown,
            task,
        }
    }

    /// Wait until `reducer` has recorded `slot` as its latest point.
    async fn wait_for_slot(&self, reducer: &str, slot: Slot) {
        let mut rx = self.service.watch_checkpoint(reducer).unwrap();
        let reached = rx.wait_for(|snapshot| snapshot.latest_point().map(|p| p.slot) == Some(slot));
        tokio::time::timeout(WAIT, reached)
            .await
            .expect("timed out waiting for checkpoint")
            .unwrap();
    }

    async fn stop(self) -> Result<(), SyncError> {
        self.shutdown.send(true).unwrap();
        self.finish().await
    }

    async fn finish(self) -> Result<(), SyncError> {
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("sync loop did not stop")
            .unwrap()
    }
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

#[tokio::test]
async fn test_one_subscription_per_root_lineage() {
    let chain = MemoryChain::with_blocks(blocks(1..=5));
    let reducers = [
        RecordingReducer::new("Blocks"),
        RecordingReducer::new("Prices"),
        RecordingReducer::new("Txs").with_dependencies(&["Blocks"]),
        RecordingReducer::new("Balances").with_dependencies(&["Txs"]),
        RecordingReducer::new("Valuations").with_dependencies(&["Blocks", "Prices"]),
    ];
    let running = Running::start(
        SyncConfig::for_testing(),
        &reducers,
        &MemoryStateStore::new(),
        &chain,
    )
    .await;

    running.wait_for_slot("Balances", 5).await;
    running.wait_for_slot("Valuations", 5).await;
    assert_eq!(chain.providers_created(), 2);

    let service = Arc::clone(&running.service);
    running.stop().await.unwrap();

    assert_eq!(reducers[3].slots(), vec![1, 2, 3, 4, 5]);
    assert_eq!(service.phase("Blocks"), Some(SyncPhase::Stopped));
    assert_eq!(service.phase("Txs"), None);
}

#[tokio::test]
async fn test_live_blocks_and_rollbacks_are_forwarded() {
    let chain = MemoryChain::with_blocks(blocks(1..=3));
    let reducers = [
        RecordingReducer::new("Blocks"),
        RecordingReducer::new("Txs").with_dependencies(&["Blocks"]),
    ];
    let running = Running::start(
        SyncConfig::for_testing(),
        &reducers,
        &MemoryStateStore::new(),
        &chain,
    )
    .await;
    running.wait_for_slot("Txs", 3).await;

    chain.roll_forward(block(4));
    chain.await_tip();
    running.wait_for_slot("Txs", 4).await;

    chain.roll_back(p(2), RollbackKind::Exclusive);
    running.wait_for_slot("Txs", 2).await;

    chain.roll_forward(Block::new(3, "fork3"));
    running.wait_for_slot("Txs", 3).await;
    running.stop().await.unwrap();

    assert_eq!(
        reducers[1].rows(),
        vec![p(1), p(2), Point::new(3, "fork3")]
    );
}

// =============================================================================
// PERSISTENCE & RESUME
// =============================================================================

#[tokio::test]
async fn test_final_flush_and_resume_from_stored_state() {
    let chain = MemoryChain::with_blocks(blocks(1..=5));
    let store = MemoryStateStore::new();
    let (first_root, first_dep) = (
        RecordingReducer::new("Blocks"),
        RecordingReducer::new("Txs").with_dependencies(&["Blocks"]),
    );
    let config = SyncConfig {
        flush_interval_ms: 60_000,
        ..SyncConfig::for_testing()
    };

    let running = Running::start(config.clone(), &[first_root, first_dep], &store, &chain).await;
    running.wait_for_slot("Txs", 5).await;
    running.stop().await.unwrap();

    let stored = store.get("Txs").unwrap();
    assert_eq!(stored.start_intersection, p(5));
    assert_eq!(stored.latest_intersections[0], p(5));

    // Restart with fresh views: only new blocks arrive
    chain.roll_forward(block(6));
    chain.roll_forward(block(7));
    let reducers = [
        RecordingReducer::new("Blocks"),
        RecordingReducer::new("Txs").with_dependencies(&["Blocks"]),
    ];
    let running = Running::start(config, &reducers, &store, &chain).await;
    running.wait_for_slot("Txs", 7).await;
    running.stop().await.unwrap();

    assert_eq!(reducers[0].slots(), vec![6, 7]);
    assert_eq!(reducers[1].slots(), vec![6, 7]);
}

#[tokio::test]
async fn test_slow_dependent_is_not_skipped_on_resume() {
    let chain = MemoryChain::with_blocks(blocks(1..=5));
    let mut root_row = ReducerState::new("Blocks", p(5));
    root_row.latest_intersections = vec![p(5), p(4), p(3), p(2), p(1)];
    let mut dep_row = ReducerState::new("Txs", p(3));
    dep_row.latest_intersections = vec![p(3), p(2), p(1)];
    let store = MemoryStateStore::with_states([root_row, dep_row]);

    let reducers = [
        RecordingReducer::new("Blocks"),
        RecordingReducer::new("Txs").with_dependencies(&["Blocks"]),
    ];
    let running = Running::start(SyncConfig::for_testing(), &reducers, &store, &chain).await;
    running.wait_for_slot("Txs", 5).await;
    running.wait_for_slot("Blocks", 5).await;
    running.stop().await.unwrap();

    // Subscription resumed at slot 3: the root rolled back and replayed
    assert_eq!(reducers[0].rollbacks(), vec![4]);
    assert_eq!(reducers[0].slots(), vec![4, 5]);
    assert_eq!(reducers[1].slots(), vec![4, 5]);
}

#[tokio::test]
async fn test_resume_beyond_rollback_buffer_replays_lineage() {
    let chain = MemoryChain::with_blocks(blocks(1..=40));
    let mut root_row = ReducerState::new("Blocks", p(40));
    root_row.latest_intersections = (21..=40).rev().map(p).collect();
    let mut dep_row = ReducerState::new("Txs", p(10));
    dep_row.latest_intersections = vec![p(10)];
    let store = MemoryStateStore::with_states([root_row, dep_row]);

    let reducers = [
        RecordingReducer::new("Blocks"),
        RecordingReducer::new("Txs").with_dependencies(&["Blocks"]),
    ];
    // Buffer of 20: the dependent lags the root by 30 slots
    let running = Running::start(SyncConfig::for_testing(), &reducers, &store, &chain).await;
    running.wait_for_slot("Txs", 40).await;
    running.stop().await.unwrap();

    let replayed: Vec<Slot> = (11..=40).collect();
    assert_eq!(reducers[0].rollbacks(), vec![11]);
    assert_eq!(reducers[0].slots(), replayed);
    assert_eq!(reducers[1].slots(), replayed);
    assert_eq!(store.get("Txs").unwrap().latest_intersections[0], p(40));
}

#[tokio::test]
async fn test_fast_forwarded_dependent_replays_from_own_history() {
    let chain = MemoryChain::with_blocks(blocks(1..=24));
    let mut root_row = ReducerState::new("Blocks", p(24));
    root_row.latest_intersections = (5..=24).rev().map(p).collect();
    // Start far behind its dependency, history at slot 3
    let mut dep_row = ReducerState::new("Txs", p(1));
    dep_row.latest_intersections = vec![p(3)];
    let store = MemoryStateStore::with_states([root_row, dep_row]);

    let reducers = [
        RecordingReducer::new("Blocks"),
        RecordingReducer::new("Txs").with_dependencies(&["Blocks"]),
    ];
    let running = Running::start(SyncConfig::for_testing(), &reducers, &store, &chain).await;
    running.wait_for_slot("Txs", 24).await;
    running.stop().await.unwrap();

    let replayed: Vec<Slot> = (4..=24).collect();
    assert_eq!(reducers[0].rollbacks(), vec![4]);
    assert_eq!(reducers[0].slots(), replayed);
    assert_eq!(reducers[1].slots(), replayed);
}

// =============================================================================
// FATAL CONDITIONS
// =============================================================================

#[tokio::test]
async fn test_upstream_disconnect_is_fatal() {
    let chain = MemoryChain::with_blocks(blocks(1..=3));
    let store = MemoryStateStore::new();
    let running = Running::start(
        SyncConfig::for_testing(),
        &[RecordingReducer::new("Blocks")],
        &store,
        &chain,
    )
    .await;
    running.wait_for_slot("Blocks", 3).await;

    chain.disconnect();
    let result = running.finish().await;

    assert!(matches!(
        result,
        Err(SyncError::UpstreamDisconnected { ref reducer }) if reducer == "Blocks"
    ));
    // Final flush still ran
    assert_eq!(store.get("Blocks").unwrap().latest_intersections[0], p(3));
}

#[tokio::test]
async fn test_transform_error_stops_every_root() {
    let chain = MemoryChain::with_blocks(blocks(1..=5));
    let reducers = [
        RecordingReducer::new("Blocks"),
        RecordingReducer::new("Prices"),
        RecordingReducer::new("Txs").with_dependencies(&["Blocks"]),
    ];
    reducers[2].fail_at(3);
    let store = MemoryStateStore::new();

    let running = Running::start(SyncConfig::for_testing(), &reducers, &store, &chain).await;
    let result = running.finish().await;

    assert!(matches!(
        result,
        Err(SyncError::ReducerFailed { ref reducer, slot: 3, .. }) if reducer == "Txs"
    ));
    assert_eq!(store.get("Txs").unwrap().latest_intersections[0], p(2));
    assert_eq!(store.get("Blocks").unwrap().latest_intersections[0], p(3));
}

#[tokio::test]
async fn test_mass_rollback_aborts_sync() {
    let chain = MemoryChain::with_blocks(blocks(1..=50));
    let reducers = [RecordingReducer::new("Blocks")];
    let running = Running::start(
        SyncConfig::for_testing(),
        &reducers,
        &MemoryStateStore::new(),
        &chain,
    )
    .await;
    running.wait_for_slot("Blocks", 50).await;

    chain.roll_back(p(10), RollbackKind::Exclusive);
    let err = running.finish().await.unwrap_err();

    assert!(err.is_critical_node());
    assert_eq!(reducers[0].slots().len(), 50);
}

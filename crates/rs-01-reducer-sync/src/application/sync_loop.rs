//! Root subscription tasks and the periodic flush.

use std::sync::Arc;

use indexer_telemetry::{sample_resident_memory, PROVIDER_CONNECTIONS};
use shared_types::NextResponse;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::application::service::ReducerSyncService;
use crate::domain::errors::SyncError;
use crate::domain::value_objects::SyncPhase;
use crate::ports::inbound::ReducerSyncApi;

impl ReducerSyncService {
    /// Run one subscription task per root reducer until `shutdown` turns
    /// true or any task fails.
    ///
    /// The first failure stops every other root. A final flush always runs
    /// before returning; the first error seen is returned.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<(), SyncError> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        for root in self.graph.root_reducers() {
            let service = Arc::clone(&self);
            let stop = stop_rx.clone();
            tasks.spawn(async move { service.run_root(root, stop).await });
        }
        info!(roots = tasks.len(), "Reducer sync started");

        let mut ticker = tokio::time::interval(self.config.flush_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        sample_resident_memory();

        let mut first_error: Option<SyncError> = None;
        if !*shutdown.borrow() {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sample_resident_memory();
                        if let Err(err) = self.flush().await {
                            first_error = Some(err);
                            break;
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Shutdown signal received");
                            break;
                        }
                    }
                    joined = tasks.join_next() => match joined {
                        None => break,
                        Some(Ok(Ok(()))) => {}
                        Some(Ok(Err(err))) => {
                            first_error = Some(err);
                            break;
                        }
                        Some(Err(join_err)) => {
                            first_error = Some(SyncError::TaskFailed(join_err.to_string()));
                            break;
                        }
                    }
                }
            }
        }

        let _ = stop_tx.send(true);
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|join_err| SyncError::TaskFailed(join_err.to_string()));
            if let Err(err) | Ok(Err(err)) = result {
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    warn!(error = %err, "Additional root task failure during shutdown");
                }
            }
        }

        match self.flush().await {
            Ok(rows) => info!(rows, "Final flush complete"),
            Err(err) => {
                error!(error = %err, "Final flush failed");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => {
                error!(error = %err, critical = err.is_critical_node(), "Reducer sync stopped");
                Err(err)
            }
            None => {
                info!("Reducer sync stopped");
                Ok(())
            }
        }
    }

    async fn run_root(&self, root: String, mut stop: watch::Receiver<bool>) -> Result<(), SyncError> {
        self.set_phase(&root, SyncPhase::Connecting);
        let result = self.sync_root(&root, &mut stop).await;
        self.set_phase(&root, SyncPhase::Stopped);

        if let Err(err) = &result {
            error!(reducer = %root, error = %err, "Root subscription failed");
        }
        result
    }

    async fn sync_root(&self, root: &str, stop: &mut watch::Receiver<bool>) -> Result<(), SyncError> {
        let provider = self.factory.create_provider().await?;
        PROVIDER_CONNECTIONS.with_label_values(&["sync"]).inc();

        let intersections = self.resume_intersections(root)?;
        info!(
            reducer = %root,
            dependents = ?self.graph.transitive_dependents(root),
            intersection = ?intersections.first(),
            points = intersections.len(),
            "Opening chain-sync subscription"
        );

        let requested = intersections.clone();
        let mut stream = provider
            .start_sync(intersections, self.config.network_magic)
            .await?;
        self.set_phase(root, SyncPhase::Syncing);

        let mut opening = true;

        loop {
            let next = tokio::select! {
                biased;
                _ = stop.changed() => {
                    debug!(reducer = %root, "Root subscription stopping");
                    return Ok(());
                }
                next = stream.next() => next,
            };

            let first = std::mem::replace(&mut opening, false);
            match next {
                None => {
                    return Err(SyncError::UpstreamDisconnected {
                        reducer: root.to_string(),
                    })
                }
                Some(Err(err)) => return Err(err.into()),
                Some(Ok(NextResponse::RollBack { point, kind }))
                    if first && requested.contains(&point) =>
                {
                    self.set_phase(root, SyncPhase::RollingBack);
                    self.rewind_to_intersection(root, &point, kind).await?;
                    self.set_phase(root, SyncPhase::Syncing);
                }
                Some(Ok(event)) => self.handle_event(root, event).await?,
            }
        }
    }

    async fn handle_event(&self, root: &str, event: NextResponse) -> Result<(), SyncError> {
        match event {
            NextResponse::Await => {
                debug!(reducer = %root, "Awaiting next block");
            }
            NextResponse::RollForward { block } => {
                self.set_phase(root, SyncPhase::RollingForward);
                self.roll_forward_lineage(root, &block).await?;
                self.set_phase(root, SyncPhase::Syncing);
            }
            NextResponse::RollBack { point, kind } => {
                self.set_phase(root, SyncPhase::RollingBack);
                self.roll_backward_lineage(root, &point, kind).await?;
                self.set_phase(root, SyncPhase::Syncing);
            }
        }
        Ok(())
    }
}

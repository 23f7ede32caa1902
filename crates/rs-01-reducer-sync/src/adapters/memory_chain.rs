//! In-memory chain acting as both provider and provider factory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{Block, NextResponse, Point, RollbackKind};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::domain::errors::ChainProviderError;
use crate::ports::outbound::{ChainProvider, ChainProviderFactory, NextResponseStream};

const LIVE_EVENT_CAPACITY: usize = 1024;

struct ChainState {
    blocks: Vec<Block>,
    /// `None` once the upstream has been disconnected.
    live: Option<broadcast::Sender<NextResponse>>,
}

/// A mutable in-memory chain.
///
/// Subscriptions replay stored blocks after the intersection, then follow
/// live `roll_forward` / `roll_back` calls. `disconnect` ends every open
/// subscription.
#[derive(Clone)]
pub struct MemoryChain {
    state: Arc<Mutex<ChainState>>,
    providers_created: Arc<AtomicUsize>,
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChain {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(LIVE_EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(ChainState {
                blocks: Vec::new(),
                live: Some(live),
            })),
            providers_created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Chain pre-filled with `blocks`, which must be in slot order.
    pub fn with_blocks(blocks: impl IntoIterator<Item = Block>) -> Self {
        let chain = Self::new();
        chain.state.lock().blocks.extend(blocks);
        chain
    }

    /// Append a block and push it to open subscriptions.
    pub fn roll_forward(&self, block: Block) {
        let mut state = self.state.lock();
        state.blocks.push(block.clone());
        if let Some(live) = &state.live {
            let _ = live.send(NextResponse::RollForward { block });
        }
    }

    /// Drop blocks after (or from, when inclusive) `point` and push the
    /// rollback to open subscriptions.
    pub fn roll_back(&self, point: Point, kind: RollbackKind) {
        let cutoff = kind.cutoff_slot(&point);
        let mut state = self.state.lock();
        state.blocks.retain(|block| block.slot() < cutoff);
        if let Some(live) = &state.live {
            let _ = live.send(NextResponse::RollBack { point, kind });
        }
    }

    /// Tell open subscriptions the provider is at the tip.
    pub fn await_tip(&self) {
        if let Some(live) = &self.state.lock().live {
            let _ = live.send(NextResponse::Await);
        }
    }

    /// Close the upstream: open streams end and new subscriptions fail.
    pub fn disconnect(&self) {
        self.state.lock().live = None;
    }

    pub fn tip(&self) -> Point {
        self.state
            .lock()
            .blocks
            .last()
            .map(Block::point)
            .unwrap_or_else(Point::origin)
    }

    /// How many providers the factory handed out.
    pub fn providers_created(&self) -> usize {
        self.providers_created.load(Ordering::SeqCst)
    }

    fn subscribe(&self, intersections: Vec<Point>) -> Result<NextResponseStream, ChainProviderError> {
        let state = self.state.lock();
        let Some(live) = &state.live else {
            return Err(ChainProviderError::Connection("upstream closed".to_string()));
        };

        let requested = intersections.len();
        let found = intersections
            .into_iter()
            .filter(|point| {
                point.is_origin()
                    || state
                        .blocks
                        .iter()
                        .any(|block| block.slot() == point.slot && block.hash() == point.hash)
            })
            .max()
            .ok_or(ChainProviderError::IntersectionNotFound { requested })?;

        let mut replay: Vec<Result<NextResponse, ChainProviderError>> =
            vec![Ok(NextResponse::RollBack {
                point: found.clone(),
                kind: RollbackKind::Exclusive,
            })];
        replay.extend(
            state
                .blocks
                .iter()
                .filter(|block| block.slot() > found.slot)
                .map(|block| {
                    Ok(NextResponse::RollForward {
                        block: block.clone(),
                    })
                }),
        );

        let live = BroadcastStream::new(live.subscribe())
            .map(|event| event.map_err(|err| ChainProviderError::Protocol(err.to_string())));

        Ok(Box::pin(tokio_stream::iter(replay).chain(live)))
    }
}

#[async_trait]
impl ChainProvider for MemoryChain {
    async fn start_sync(
        &self,
        intersections: Vec<Point>,
        _network_magic: u64,
    ) -> Result<NextResponseStream, ChainProviderError> {
        self.subscribe(intersections)
    }

    async fn get_tip(&self, _network_magic: u64) -> Result<Point, ChainProviderError> {
        Ok(self.tip())
    }
}

#[async_trait]
impl ChainProviderFactory for MemoryChain {
    async fn create_provider(&self) -> Result<Box<dyn ChainProvider>, ChainProviderError> {
        self.providers_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

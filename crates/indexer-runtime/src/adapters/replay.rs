//! JSON-lines replay chain provider.
//!
//! Each non-empty line of the file is one chain-sync response, in the
//! shape `shared_types::NextResponse` serializes to:
//!
//! ```text
//! {"action":"roll_forward","block":{"slot":1,"hash":"ab","transactions":[]}}
//! {"action":"roll_back","point":{"slot":1,"hash":"ab"},"kind":"exclusive"}
//! {"action":"await"}
//! ```
//!
//! A subscription finds the newest requested point among the blocks in the
//! file and replays every event recorded after it.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rs_01_reducer_sync::{
    ChainProvider, ChainProviderError, ChainProviderFactory, NextResponseStream,
};
use shared_types::{NextResponse, Point, RollbackKind};
use tracing::{debug, info};

/// Parsed replay file.
#[derive(Debug, Clone, Default)]
pub struct ReplayChain {
    events: Arc<Vec<NextResponse>>,
}

impl ReplayChain {
    pub fn from_events(events: Vec<NextResponse>) -> Self {
        Self {
            events: Arc::new(events),
        }
    }

    /// Read and parse a JSON-lines file.
    pub async fn load(path: &Path) -> Result<Self, ChainProviderError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            ChainProviderError::Configuration(format!("{}: {e}", path.display()))
        })?;

        let mut events = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let event = serde_json::from_str(line).map_err(|e| {
                ChainProviderError::Protocol(format!("{}:{}: {e}", path.display(), index + 1))
            })?;
            events.push(event);
        }

        info!(path = %path.display(), events = events.len(), "Loaded replay file");
        Ok(Self::from_events(events))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Tip of the chain the file describes once every event is applied.
    pub fn tip(&self) -> Point {
        let mut chain: Vec<Point> = Vec::new();
        for event in self.events.iter() {
            match event {
                NextResponse::RollForward { block } => chain.push(block.point()),
                NextResponse::RollBack { point, kind } => {
                    let cutoff = kind.cutoff_slot(point);
                    chain.retain(|p| p.slot < cutoff);
                }
                NextResponse::Await => {}
            }
        }
        chain.pop().unwrap_or_else(Point::origin)
    }

    /// Newest requested point present in the file, with the index of the
    /// first event after it.
    fn intersect(&self, requested: &[Point]) -> Option<(Point, usize)> {
        let mut candidates: Vec<&Point> = requested.iter().collect();
        candidates.sort_by(|a, b| b.cmp(a));

        candidates.into_iter().find_map(|point| {
            if point.is_origin() {
                return Some((point.clone(), 0));
            }
            self.events
                .iter()
                .rposition(|event| {
                    matches!(event, NextResponse::RollForward { block }
                        if block.slot() == point.slot && block.hash() == point.hash)
                })
                .map(|index| (point.clone(), index + 1))
        })
    }
}

/// Hands out providers reading the same replay chain.
pub struct ReplayProviderFactory {
    chain: ReplayChain,
    hold_open: bool,
}

impl ReplayProviderFactory {
    /// `hold_open` keeps subscriptions pending after the last event instead
    /// of ending them.
    pub fn new(chain: ReplayChain, hold_open: bool) -> Self {
        Self { chain, hold_open }
    }

    pub async fn open(path: &Path, hold_open: bool) -> Result<Self, ChainProviderError> {
        Ok(Self::new(ReplayChain::load(path).await?, hold_open))
    }
}

#[async_trait]
impl ChainProviderFactory for ReplayProviderFactory {
    async fn create_provider(&self) -> Result<Box<dyn ChainProvider>, ChainProviderError> {
        Ok(Box::new(ReplayProvider {
            chain: self.chain.clone(),
            hold_open: self.hold_open,
        }))
    }
}

struct ReplayProvider {
    chain: ReplayChain,
    hold_open: bool,
}

#[async_trait]
impl ChainProvider for ReplayProvider {
    async fn start_sync(
        &self,
        intersections: Vec<Point>,
        _network_magic: u64,
    ) -> Result<NextResponseStream, ChainProviderError> {
        let (found, from) = self.chain.intersect(&intersections).ok_or(
            ChainProviderError::IntersectionNotFound {
                requested: intersections.len(),
            },
        )?;
        debug!(intersection = %found, replayed = self.chain.len().saturating_sub(from), "Replay intersection found");

        let mut events = vec![NextResponse::RollBack {
            point: found,
            kind: RollbackKind::Exclusive,
        }];
        events.extend(self.chain.events.iter().skip(from).cloned());
        let replay = tokio_stream::iter(events.into_iter().map(Ok));

        let stream: NextResponseStream = if self.hold_open {
            Box::pin(tokio_stream::StreamExt::chain(replay, tokio_stream::pending()))
        } else {
            Box::pin(replay)
        };
        Ok(stream)
    }

    async fn get_tip(&self, _network_magic: u64) -> Result<Point, ChainProviderError> {
        Ok(self.chain.tip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Block;
    use tokio_stream::StreamExt;

    fn forward(slot: u64) -> NextResponse {
        NextResponse::RollForward {
            block: Block::new(slot, format!("h{slot}")),
        }
    }

    fn chain() -> ReplayChain {
        ReplayChain::from_events(vec![
            forward(1),
            forward(2),
            forward(3),
            NextResponse::RollBack {
                point: Point::new(2, "h2"),
                kind: RollbackKind::Exclusive,
            },
            NextResponse::Await,
            forward(4),
        ])
    }

    async fn collect(factory: &ReplayProviderFactory, from: Vec<Point>) -> Vec<NextResponse> {
        let provider = factory.create_provider().await.unwrap();
        let stream = provider.start_sync(from, 0).await.unwrap();
        stream.map(|event| event.unwrap()).collect().await
    }

    #[test]
    fn test_tip_applies_rollbacks() {
        assert_eq!(chain().tip(), Point::new(4, "h4"));
        assert_eq!(ReplayChain::default().tip(), Point::origin());
    }

    #[tokio::test]
    async fn test_replay_from_origin_includes_rollbacks() {
        let factory = ReplayProviderFactory::new(chain(), false);
        let events = collect(&factory, vec![Point::origin()]).await;

        assert_eq!(events.len(), 7);
        assert_eq!(events[0].action(), "roll_back");
        assert_eq!(events[4].action(), "roll_back");
    }

    #[tokio::test]
    async fn test_replay_resumes_after_newest_known_point() {
        let factory = ReplayProviderFactory::new(chain(), false);
        let events = collect(
            &factory,
            vec![Point::new(1, "h1"), Point::new(3, "h3"), Point::new(9, "h9")],
        )
        .await;

        assert_eq!(
            events[0],
            NextResponse::RollBack {
                point: Point::new(3, "h3"),
                kind: RollbackKind::Exclusive
            }
        );
        assert_eq!(events.len(), 4);
        assert_eq!(events[3].slot(), Some(4));
    }

    #[tokio::test]
    async fn test_unknown_points_are_rejected() {
        let factory = ReplayProviderFactory::new(chain(), false);
        let provider = factory.create_provider().await.unwrap();
        let result = provider.start_sync(vec![Point::new(3, "fork")], 0).await;
        assert!(matches!(
            result,
            Err(ChainProviderError::IntersectionNotFound { requested: 1 })
        ));
    }

    #[tokio::test]
    async fn test_load_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.jsonl");
        tokio::fs::write(&path, "{\"action\":\"await\"}\n\nnot json\n")
            .await
            .unwrap();

        let err = ReplayChain::load(&path).await.unwrap_err();
        assert!(err.to_string().contains(":3:"));
    }
}

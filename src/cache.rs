//! Per-window artifact cache with trading-hours-aware staleness.

pub mod policy;

use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::{
    foundation::{clock::Clock, core::ViewWindow, error::TickerResult},
    pipeline::ArtifactProducer,
};

pub use policy::{StalenessPolicy, TradingHours};

/// A produced artifact. Cloning shares the bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedArtifact {
    pub bytes: Arc<Vec<u8>>,
    pub produced_at: DateTime<Local>,
}

/// Holds the latest artifact for every window and rebuilds it on demand.
///
/// Each window has its own slot lock, held for the whole regeneration, so a
/// request for a window that is being rebuilt waits and then sees the new
/// artifact. Different windows never wait on each other here; they only
/// meet at the session pool lock inside the producer.
pub struct FreshnessCache {
    producer: Arc<dyn ArtifactProducer>,
    policy: StalenessPolicy,
    clock: Arc<dyn Clock>,
    default_window: ViewWindow,
    slots: [Mutex<Option<CachedArtifact>>; ViewWindow::ALL.len()],
}

impl FreshnessCache {
    pub fn new(
        producer: Arc<dyn ArtifactProducer>,
        policy: StalenessPolicy,
        clock: Arc<dyn Clock>,
        default_window: ViewWindow,
    ) -> Self {
        Self {
            producer,
            policy,
            clock,
            default_window,
            slots: std::array::from_fn(|_| Mutex::new(None)),
        }
    }

    pub fn default_window(&self) -> ViewWindow {
        self.default_window
    }

    /// Resolves a raw window selector (unknown or missing means the default
    /// window) and returns that window's artifact.
    pub fn get(&self, selector: Option<&str>) -> TickerResult<CachedArtifact> {
        self.get_window(ViewWindow::resolve(selector, self.default_window))
    }

    /// Returns the window's artifact, rebuilding it first when stale.
    ///
    /// A failed rebuild is returned as an error and leaves the previous
    /// artifact in place; see [`FreshnessCache::peek`].
    pub fn get_window(&self, window: ViewWindow) -> TickerResult<CachedArtifact> {
        let mut slot = self.slots[window.index()].lock();
        let now = self.clock.now();
        let produced_at = slot.as_ref().map(|a| a.produced_at);
        if let Some(artifact) = slot.as_ref()
            && !self.policy.needs_regeneration(produced_at, now)
        {
            return Ok(artifact.clone());
        }
        let artifact = self.regenerate(window, produced_at)?;
        *slot = Some(artifact.clone());
        Ok(artifact)
    }

    /// The currently stored artifact, without any staleness check.
    pub fn peek(&self, window: ViewWindow) -> Option<CachedArtifact> {
        self.slots[window.index()].lock().clone()
    }

    /// Builds every window's artifact. Returns how many succeeded; failures
    /// are logged and left for the next request to retry.
    pub fn warm_all(&self) -> usize {
        ViewWindow::ALL
            .par_iter()
            .filter(|&&window| match self.get_window(window) {
                Ok(_) => true,
                Err(err) => {
                    tracing::warn!(window = %window, error = %err, "warm-up failed");
                    false
                }
            })
            .count()
    }

    #[tracing::instrument(skip_all, fields(window = %window))]
    fn regenerate(
        &self,
        window: ViewWindow,
        previous: Option<DateTime<Local>>,
    ) -> TickerResult<CachedArtifact> {
        tracing::info!(previous = ?previous, "regenerating artifact");
        let bytes = self.producer.produce(window)?;
        let now = self.clock.now();
        let produced_at = previous.map_or(now, |p| p.max(now));
        Ok(CachedArtifact {
            bytes: Arc::new(bytes),
            produced_at,
        })
    }
}

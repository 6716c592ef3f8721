use std::sync::Arc;

use image::RgbaImage;

use crate::{
    compose::FrameComposer,
    foundation::{
        core::{Trend, ViewWindow},
        error::TickerResult,
    },
    session::RemoteSessionPool,
    trend::TrendClassifier,
};

/// Something that can build a fresh artifact for a window.
pub trait ArtifactProducer: Send + Sync {
    fn produce(&self, window: ViewWindow) -> TickerResult<Vec<u8>>;
}

/// Turns a classified snapshot into encoded artifact bytes.
pub trait Compositor: Send + Sync {
    fn compose(
        &self,
        window: ViewWindow,
        trend: Trend,
        snapshot: &RgbaImage,
    ) -> TickerResult<Vec<u8>>;
}

impl Compositor for FrameComposer {
    fn compose(
        &self,
        window: ViewWindow,
        trend: Trend,
        snapshot: &RgbaImage,
    ) -> TickerResult<Vec<u8>> {
        FrameComposer::compose(self, window, trend, snapshot)
    }
}

/// Snapshot, classify, compose.
pub struct Pipeline {
    pool: Arc<RemoteSessionPool>,
    classifier: TrendClassifier,
    composer: Box<dyn Compositor>,
}

impl Pipeline {
    pub fn new(
        pool: Arc<RemoteSessionPool>,
        classifier: TrendClassifier,
        composer: impl Compositor + 'static,
    ) -> Self {
        Self {
            pool,
            classifier,
            composer: Box::new(composer),
        }
    }
}

impl ArtifactProducer for Pipeline {
    #[tracing::instrument(skip_all, fields(window = %window))]
    fn produce(&self, window: ViewWindow) -> TickerResult<Vec<u8>> {
        // Text reads need the live page, so they happen under the pool lock.
        // Decoding, the pixel fallback and composition do not.
        let (signal, capture) = {
            let mut view = self.pool.acquire(window)?;
            let signal = self.classifier.read_text_signal(window, &mut view)?;
            (signal, view.into_capture())
        };
        let snapshot = capture.into_snapshot()?;
        let trend = self.classifier.resolve(signal, &snapshot);
        tracing::info!(trend = %trend, "classified view");
        self.composer.compose(window, trend, &snapshot)
    }
}

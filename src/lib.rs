#![forbid(unsafe_code)]

pub mod assets;
pub mod cache;
pub mod capture;
pub mod compose;
pub mod config;
pub mod encode_gif;
pub mod foundation;
pub mod pipeline;
pub mod remote;
pub mod server;
pub mod session;
pub mod trend;

pub use assets::BaseFrames;
pub use cache::{CachedArtifact, FreshnessCache, StalenessPolicy, TradingHours};
pub use compose::FrameComposer;
pub use config::Settings;
pub use foundation::{
    clock::{Clock, ManualClock, SystemClock},
    core::{Canvas, CropRegion, Trend, ViewWindow},
    error::{TickerError, TickerResult},
};
pub use pipeline::{ArtifactProducer, Compositor, Pipeline};
#[cfg(any(test, feature = "test-support"))]
pub use remote::fake::FakeBrowser;
pub use remote::{Locator, Lookup, RemoteBrowser, TextSource, webdriver::WebDriverBrowser};
pub use session::{ActiveView, PoolSettings, RemoteSessionPool};
pub use trend::TrendClassifier;

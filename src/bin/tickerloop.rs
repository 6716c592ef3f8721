use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tickerloop::{
    BaseFrames, FrameComposer, FreshnessCache, Pipeline, PoolSettings, RemoteSessionPool,
    Settings, StalenessPolicy, SystemClock, TrendClassifier, WebDriverBrowser,
    assets::load_font,
    server::{AppState, serve},
};

#[derive(Parser, Debug)]
#[command(name = "tickerloop", version)]
struct Cli {
    /// Settings JSON. Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. `0.0.0.0:8080`.
    #[arg(long)]
    bind: Option<String>,

    /// WebDriver endpoint (geckodriver).
    #[arg(long)]
    webdriver: Option<String>,

    /// Skip building every window's artifact before serving.
    #[arg(long)]
    no_warm: bool,

    /// Drive a single tab and navigate it per request.
    #[arg(long)]
    single_session: bool,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let settings = load_settings(&cli)?;

    let base = BaseFrames::load(&settings).context("load base animations")?;
    let font = load_font(&settings.assets.font)?;
    let composer = FrameComposer::from_settings(base, &font, &settings)?;
    tracing::info!(frames = composer.frame_count(), "assets ready");

    let browser = WebDriverBrowser::connect(&settings.webdriver)?;
    let clock = Arc::new(SystemClock);
    let pool = Arc::new(RemoteSessionPool::open(
        Box::new(browser),
        PoolSettings::from_settings(&settings),
        clock.clone(),
    )?);

    let pipeline = Pipeline::new(
        pool.clone(),
        TrendClassifier::from_settings(&settings),
        composer,
    );
    let cache = Arc::new(FreshnessCache::new(
        Arc::new(pipeline),
        StalenessPolicy::from_settings(&settings),
        clock,
        settings.default_window,
    ));

    if settings.warm_on_startup {
        let warmed = cache.warm_all();
        tracing::info!(warmed, "warm-up finished");
    }

    // The blocking WebDriver client must not be dropped on a runtime thread,
    // so the pool outlives the runtime.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    let served = runtime.block_on(serve(
        &settings.bind,
        AppState {
            cache: cache.clone(),
        },
    ));
    drop(runtime);

    if let Err(err) = pool.shutdown() {
        tracing::warn!(error = %err, "browser shutdown failed");
    }
    served
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(bind) = &cli.bind {
        settings.bind = bind.clone();
    }
    if let Some(endpoint) = &cli.webdriver {
        settings.webdriver.endpoint = endpoint.clone();
    }
    if cli.no_warm {
        settings.warm_on_startup = false;
    }
    if cli.single_session {
        settings.multi_session = false;
    }
    settings.validate()?;
    Ok(settings)
}

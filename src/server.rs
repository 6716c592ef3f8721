//! HTTP facade over the freshness cache.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    cache::{CachedArtifact, FreshnessCache},
    foundation::core::ViewWindow,
};

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<FreshnessCache>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct GifQuery {
    pub window: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/hsi.gif", get(hsi_gif))
        .route("/healthz", get(healthz))
        .layer(middleware::map_response(no_cache))
        .with_state(state)
}

/// Serves until the process is stopped or ctrl-c arrives.
pub async fn serve(bind: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %err, "ctrl-c handler failed");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn hsi_gif(State(state): State<AppState>, Query(query): Query<GifQuery>) -> Response {
    let cache = state.cache.clone();
    let window = ViewWindow::resolve(query.window.as_deref(), cache.default_window());
    match tokio::task::spawn_blocking(move || fetch_or_stale(&cache, window)).await {
        Ok(Some(artifact)) => gif_response(&artifact),
        Ok(None) => (StatusCode::SERVICE_UNAVAILABLE, "artifact unavailable").into_response(),
        Err(err) => {
            tracing::error!(error = %err, "artifact task panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// A fresh artifact, or the previous one when regeneration fails.
fn fetch_or_stale(cache: &FreshnessCache, window: ViewWindow) -> Option<CachedArtifact> {
    match cache.get_window(window) {
        Ok(artifact) => Some(artifact),
        Err(err) => {
            let stale = cache.peek(window);
            tracing::error!(
                window = %window,
                error = %err,
                serving_stale = stale.is_some(),
                "regeneration failed"
            );
            stale
        }
    }
}

fn gif_response(artifact: &CachedArtifact) -> Response {
    (
        [(header::CONTENT_TYPE, "image/gif")],
        Body::from(artifact.bytes.as_ref().clone()),
    )
        .into_response()
}

async fn no_cache(mut res: Response) -> Response {
    let headers = res.headers_mut();
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=0"),
    );
    res
}

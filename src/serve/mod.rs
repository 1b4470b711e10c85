// src/serve/mod.rs

//! Dev server and live-reload bridge.
//!
//! Serves the output tree over HTTP and exposes a server-sent-events endpoint
//! (`/__assetpipe/reload`) that connected clients use as the reload push
//! channel. The runtime calls [`ReloadHub::notify`] after a fully successful
//! run; failed builds never notify, so browsers keep the last valid content.

pub mod reload;

use std::convert::Infallible;
use std::path::Path;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use reload::ReloadHub;

/// Build the dev-server router: static files from the output tree plus the
/// reload event stream.
pub fn build_router(out_dir: &Path, hub: ReloadHub) -> Router {
    Router::new()
        .route("/__assetpipe/reload", get(reload_events))
        .fallback_service(ServeDir::new(out_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(hub)
}

/// Bind the listener and spawn the HTTP server.
///
/// Binding failure is a startup error and surfaces to the caller; the serve
/// loop itself runs until the process exits.
pub async fn spawn_server(port: u16, out_dir: &Path, hub: ReloadHub) -> Result<JoinHandle<()>> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding dev server to {addr}"))?;

    info!(addr = %addr, out_dir = ?out_dir, "dev server listening");

    let app = build_router(out_dir, hub);
    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "dev server stopped");
        }
    });

    Ok(handle)
}

/// SSE endpoint: one `reload` event per successful rebuild.
async fn reload_events(
    State(hub): State<ReloadHub>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = hub.subscribe();

    // A lagged receiver only means the client missed intermediate reloads;
    // any signal still maps to "refresh now".
    let stream =
        BroadcastStream::new(rx).map(|_| Ok(Event::default().event("reload").data("reload")));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

//! HTTP binding of the RouteGuide calls.
//!
//! Provides [`serve`] (load features from config, bind, run until ctrl-c) and
//! [`serve_with`] (run on a caller-supplied listener until a caller-supplied signal),
//! plus [`router`] for embedding the routes elsewhere.
//!
//! | Call | Route | Body |
//! |------|-------|------|
//! | GetFeature | `POST /v1/get-feature` | `Point` → `Feature` |
//! | ListFeatures | `POST /v1/list-features` | `Rectangle` → NDJSON `Feature`s |
//! | RecordRoute | `POST /v1/record-route` | NDJSON `Point`s → `RouteSummary` |
//! | RouteChat | `GET /v1/route-chat` | WebSocket, JSON `RouteNote` text frames |

mod chat_socket;
mod handlers;
pub mod ndjson;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::chat::NoteRouter;
use crate::config::{ChatConfig, RouteGuideConfig};
use crate::service::RouteGuideService;
use crate::store::{self, FeatureStore};

/// Shared per-server state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: RouteGuideService,
    /// Cancelled on shutdown; every streaming call runs under a child token.
    pub shutdown: CancellationToken,
    pub outbound_buffer: usize,
}

impl AppState {
    pub fn new(store: FeatureStore, chat: &ChatConfig) -> Self {
        let notes = NoteRouter::new(chat);
        Self {
            service: RouteGuideService::new(Arc::new(store), Arc::new(notes)),
            shutdown: CancellationToken::new(),
            outbound_buffer: chat.outbound_buffer.max(1),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/get-feature", post(handlers::get_feature))
        .route("/v1/list-features", post(handlers::list_features))
        .route("/v1/record-route", post(handlers::record_route))
        .route("/v1/route-chat", get(chat_socket::route_chat))
        .route("/healthz", get(handlers::health))
        .with_state(state)
}

/// Load the feature database named by `config` and serve until ctrl-c.
pub async fn serve(config: RouteGuideConfig) -> Result<()> {
    let features_path = config.resolved_features_path();
    let features = store::load_features(&features_path)?;
    let store = FeatureStore::new(features);
    tracing::info!(
        path = %features_path.display(),
        features = store.len(),
        named = store.named_count(),
        "feature store ready"
    );

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "RouteGuide server listening at http://{bind_addr}");

    let state = AppState::new(store, &config.chat);
    serve_with(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutting down RouteGuide server");
    })
    .await
}

/// Serve on `listener` until `signal` resolves, then cancel in-flight streaming calls
/// and wait for connections to drain.
pub async fn serve_with<F>(listener: TcpListener, state: AppState, signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            signal.await;
            shutdown.cancel();
        })
        .await?;
    tracing::info!("RouteGuide server shut down");
    Ok(())
}

//! The four RouteGuide calls, independent of any transport.
//!
//! [`RouteGuideService`] holds no state of its own: it is a cheap, cloneable handle to the
//! shared [`FeatureStore`] and [`NoteRouter`]. Streaming calls take their inbound side as a
//! `Stream` of `Result<_, StreamError>` and a [`CancellationToken`] that is observed at
//! every await point.

pub mod chat_session;

use futures::{Stream, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chat::{ChatError, NoteRouter};
use crate::geo::{Feature, Point, Rectangle, RouteNote, RouteSummary};
use crate::route::{RouteError, RouteRecorder};
use crate::store::FeatureStore;

use chat_session::ChatSession;

/// A fault reported by the transport while reading an inbound stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("inbound stream failed: {0}")]
pub struct StreamError(pub String);

impl StreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Why a call ended without completing normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Inbound(#[from] StreamError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("outbound stream closed by peer")]
    OutboundClosed,

    #[error("call cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RouteGuideService {
    store: Arc<FeatureStore>,
    notes: Arc<NoteRouter>,
}

impl RouteGuideService {
    pub fn new(store: Arc<FeatureStore>, notes: Arc<NoteRouter>) -> Self {
        Self { store, notes }
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn notes(&self) -> &NoteRouter {
        &self.notes
    }

    /// Feature at `location`; the unnamed sentinel when there is none.
    pub fn get_feature(&self, location: Point) -> Feature {
        let feature = self.store.lookup(location);
        tracing::debug!(location = %location, found = feature.exists(), "get_feature");
        feature
    }

    /// Lazily stream every named feature inside `rect`. Zero matches is an empty stream.
    pub fn list_features(&self, rect: Rectangle) -> impl Stream<Item = Feature> + Send + 'static {
        tracing::debug!(lo = %rect.lo, hi = %rect.hi, "list_features");
        futures::stream::iter(self.store.range_query_shared(&rect))
    }

    /// Consume a route and summarize it once the inbound stream completes.
    ///
    /// An inbound error or cancellation ends the call with no summary.
    pub async fn record_route<S>(
        &self,
        inbound: S,
        cancel: CancellationToken,
    ) -> Result<RouteSummary, ServiceError>
    where
        S: Stream<Item = Result<Point, StreamError>>,
    {
        let session = uuid::Uuid::now_v7();
        let mut inbound = std::pin::pin!(inbound);
        let mut recorder = RouteRecorder::new(&self.store);
        tracing::debug!(%session, "record_route started");

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(%session, "record_route cancelled");
                    return Err(ServiceError::Cancelled);
                }
                next = inbound.next() => next,
            };
            match next {
                Some(Ok(point)) => recorder.on_point(point)?,
                Some(Err(e)) => {
                    tracing::warn!(%session, error = %e, "record_route aborted");
                    return Err(e.into());
                }
                None => break,
            }
        }

        let summary = recorder.close()?;
        tracing::info!(
            %session,
            points = summary.point_count,
            features = summary.feature_count,
            distance = summary.distance_meters,
            elapsed = summary.elapsed_seconds,
            "route recorded"
        );
        Ok(summary)
    }

    /// Exchange notes with everyone chatting at the same locations.
    ///
    /// Each inbound note joins its location the first time the session uses it
    /// (replaying that location's history onto `outbound` first) and is then published
    /// there. Notes published by anyone at a joined location, this session included, are
    /// forwarded to `outbound`. When `inbound` finishes, the session leaves its locations
    /// and still forwards the notes already queued for it. Every subscription is left when
    /// the call ends, however it ends.
    pub async fn route_chat<S>(
        &self,
        inbound: S,
        outbound: mpsc::Sender<RouteNote>,
        cancel: CancellationToken,
    ) -> Result<(), ServiceError>
    where
        S: Stream<Item = Result<RouteNote, StreamError>>,
    {
        let mut session = ChatSession::new(&self.notes, outbound);
        session.run(inbound, &cancel).await
    }
}

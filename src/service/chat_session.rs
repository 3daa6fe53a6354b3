//! One RouteChat call.
//!
//! A [`ChatSession`] multiplexes three things on a single task: notes arriving from the
//! client, notes delivered by the router for the locations it has joined, and the
//! cancellation token. Publishing never waits on another participant, so a stalled
//! client only ever stalls its own session.

use futures::stream::SelectAll;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{ServiceError, StreamError};
use crate::chat::{ChatError, NoteRouter, Subscription, SubscriptionHandle};
use crate::geo::{Point, RouteNote};

enum Event {
    Inbound(Option<Result<RouteNote, StreamError>>),
    Delivery(Result<RouteNote, ChatError>),
    OutboundClosed,
    Cancelled,
}

pub struct ChatSession<'a> {
    id: uuid::Uuid,
    router: &'a NoteRouter,
    outbound: mpsc::Sender<RouteNote>,
    joined: HashMap<Point, SubscriptionHandle>,
    subscriptions: SelectAll<Subscription>,
    received: u64,
    sent: u64,
}

impl<'a> ChatSession<'a> {
    pub fn new(router: &'a NoteRouter, outbound: mpsc::Sender<RouteNote>) -> Self {
        Self {
            id: uuid::Uuid::now_v7(),
            router,
            outbound,
            joined: HashMap::new(),
            subscriptions: SelectAll::new(),
            received: 0,
            sent: 0,
        }
    }

    /// Drive the session until the inbound stream ends, fails, or is cancelled, or the
    /// outbound side goes away.
    pub async fn run<S>(&mut self, inbound: S, cancel: &CancellationToken) -> Result<(), ServiceError>
    where
        S: Stream<Item = Result<RouteNote, StreamError>>,
    {
        let mut inbound = std::pin::pin!(inbound);
        tracing::debug!(session = %self.id, "route_chat started");

        loop {
            // Ready deliveries go out before the next inbound note is read.
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => Event::Cancelled,
                _ = self.outbound.closed() => Event::OutboundClosed,
                Some(delivery) = self.subscriptions.next(), if !self.subscriptions.is_empty() => {
                    Event::Delivery(delivery)
                }
                next = inbound.next() => Event::Inbound(next),
            };

            match event {
                Event::Inbound(Some(Ok(note))) => self.accept(note, cancel).await?,
                Event::Inbound(Some(Err(e))) => {
                    tracing::warn!(session = %self.id, error = %e, "route_chat aborted");
                    return Err(e.into());
                }
                Event::Inbound(None) => return self.finish(cancel).await,
                Event::Delivery(delivery) => self.deliver(delivery, cancel).await?,
                Event::OutboundClosed => return Err(ServiceError::OutboundClosed),
                Event::Cancelled => return Err(ServiceError::Cancelled),
            }
        }
    }

    /// Join the note's location on first use, replaying its history, then publish it.
    async fn accept(&mut self, note: RouteNote, cancel: &CancellationToken) -> Result<(), ServiceError> {
        self.received += 1;
        let location = note.location;
        if !self.joined.contains_key(&location) {
            let (history, subscription) = self.router.join(location);
            self.joined.insert(location, subscription.handle());
            self.subscriptions.push(subscription);
            for previous in history {
                self.send(previous, cancel).await?;
            }
        }
        self.router.publish(note);
        Ok(())
    }

    /// The client stopped sending. Leave every location, then forward whatever the
    /// subscriptions already hold until each of them ends.
    async fn finish(&mut self, cancel: &CancellationToken) -> Result<(), ServiceError> {
        for handle in self.joined.values() {
            self.router.leave(*handle);
        }
        while let Some(delivery) = self.subscriptions.next().await {
            self.deliver(delivery, cancel).await?;
        }
        Ok(())
    }

    async fn deliver(
        &mut self,
        delivery: Result<RouteNote, ChatError>,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        match delivery {
            Ok(note) => self.send(note, cancel).await,
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "route_chat lagged");
                Err(e.into())
            }
        }
    }

    async fn send(&mut self, note: RouteNote, cancel: &CancellationToken) -> Result<(), ServiceError> {
        tokio::select! {
            sent = self.outbound.send(note) => sent.map_err(|_| ServiceError::OutboundClosed)?,
            _ = cancel.cancelled() => return Err(ServiceError::Cancelled),
        }
        self.sent += 1;
        Ok(())
    }
}

impl Drop for ChatSession<'_> {
    fn drop(&mut self) {
        for handle in self.joined.values() {
            self.router.leave(*handle);
        }
        tracing::debug!(
            session = %self.id,
            locations = self.joined.len(),
            received = self.received,
            sent = self.sent,
            "route_chat ended"
        );
    }
}

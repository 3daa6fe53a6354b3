//! Location-scoped note fan-out.
//!
//! Every location that has seen a note or a subscriber gets a room behind its own
//! mutex, so joins and publishes at different points never contend. The room map itself
//! is only write-locked when a new location appears.
//!
//! Delivery never waits on a subscriber. Each subscriber owns a bounded queue; a full
//! queue gets the subscriber evicted and a closed queue gets it pruned, in both cases
//! without affecting anyone else in the room.

use futures::channel::mpsc;
use futures::Stream;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::task::{Context, Poll};
use thiserror::Error;

use crate::config::ChatConfig;
use crate::geo::{Point, RouteNote};

/// Errors surfaced to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The subscriber's queue filled up and the router stopped delivering to it.
    #[error("chat subscriber at {location} fell behind and was evicted")]
    Lagged { location: Point },
}

/// Identifies one live subscription at one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    location: Point,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn location(&self) -> Point {
        self.location
    }
}

/// The receiving side of a [`NoteRouter::join`]. Yields notes published at the joined
/// location after the join, in publish order. Ends after [`NoteRouter::leave`]; if the
/// router evicted it instead, the queued notes are followed by one
/// [`ChatError::Lagged`] before the end.
#[derive(Debug)]
pub struct Subscription {
    handle: SubscriptionHandle,
    receiver: mpsc::Receiver<RouteNote>,
    evicted: Arc<AtomicBool>,
    finished: bool,
}

impl Subscription {
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// `true` once the router dropped this subscriber because its queue was full.
    pub fn was_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }
}

impl Stream for Subscription {
    type Item = Result<RouteNote, ChatError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match Pin::new(&mut self.receiver).poll_next(cx) {
            Poll::Ready(Some(note)) => Poll::Ready(Some(Ok(note))),
            Poll::Ready(None) => {
                self.finished = true;
                if self.was_evicted() {
                    Poll::Ready(Some(Err(ChatError::Lagged {
                        location: self.handle.location,
                    })))
                } else {
                    Poll::Ready(None)
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[derive(Debug)]
struct Subscriber {
    sender: mpsc::Sender<RouteNote>,
    evicted: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct Room {
    history: VecDeque<RouteNote>,
    subscribers: HashMap<u64, Subscriber>,
}

/// Snapshot of router size, for health reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ChatStats {
    pub locations: usize,
    pub notes: usize,
    pub subscribers: usize,
}

#[derive(Debug)]
pub struct NoteRouter {
    rooms: RwLock<HashMap<Point, Arc<Mutex<Room>>>>,
    next_id: AtomicU64,
    history_limit: Option<usize>,
    subscriber_buffer: usize,
}

impl Default for NoteRouter {
    fn default() -> Self {
        Self::new(&ChatConfig::default())
    }
}

impl NoteRouter {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            history_limit: config.history_limit,
            subscriber_buffer: config.subscriber_buffer.max(1),
        }
    }

    /// Return every note recorded at `location` and subscribe to the ones that follow.
    ///
    /// Both happen under the room lock: a note published concurrently lands either in
    /// the returned history or on the subscription, never both and never neither.
    pub fn join(&self, location: Point) -> (Vec<RouteNote>, Subscription) {
        let room = self.room(location);
        let mut room = lock(&room);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.subscriber_buffer);
        let evicted = Arc::new(AtomicBool::new(false));
        room.subscribers.insert(
            id,
            Subscriber {
                sender,
                evicted: Arc::clone(&evicted),
            },
        );
        let history: Vec<RouteNote> = room.history.iter().cloned().collect();

        tracing::debug!(
            subscriber = id,
            location = %location,
            history = history.len(),
            "joined chat location"
        );

        let subscription = Subscription {
            handle: SubscriptionHandle { id, location },
            receiver,
            evicted,
            finished: false,
        };
        (history, subscription)
    }

    /// Record `note` at its location and hand it to every live subscriber there,
    /// the publisher included. Returns how many subscribers accepted it.
    pub fn publish(&self, note: RouteNote) -> usize {
        let location = note.location;
        let room = self.room(location);
        let mut room = lock(&room);

        room.history.push_back(note.clone());
        if let Some(limit) = self.history_limit {
            while room.history.len() > limit {
                room.history.pop_front();
            }
        }

        let mut delivered = 0;
        room.subscribers.retain(|&id, subscriber| {
            match subscriber.sender.try_send(note.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) if e.is_full() => {
                    subscriber.evicted.store(true, Ordering::Release);
                    tracing::warn!(
                        subscriber = id,
                        location = %location,
                        "evicting chat subscriber with a full queue"
                    );
                    false
                }
                Err(_) => {
                    tracing::debug!(subscriber = id, location = %location, "pruned closed subscriber");
                    false
                }
            }
        });
        delivered
    }

    /// Stop delivering to `handle`. Calling it again, or for an evicted subscriber, is a no-op.
    pub fn leave(&self, handle: SubscriptionHandle) {
        let room = {
            let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
            rooms.get(&handle.location).cloned()
        };
        let Some(room) = room else {
            return;
        };
        if lock(&room).subscribers.remove(&handle.id).is_some() {
            tracing::debug!(subscriber = handle.id, location = %handle.location, "left chat location");
        }
    }

    /// Notes currently retained at `location`, oldest first.
    pub fn history(&self, location: Point) -> Vec<RouteNote> {
        let room = {
            let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
            rooms.get(&location).cloned()
        };
        room.map(|room| lock(&room).history.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> ChatStats {
        let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
        rooms.values().fold(
            ChatStats {
                locations: rooms.len(),
                ..ChatStats::default()
            },
            |mut stats, room| {
                let room = lock(room);
                stats.notes += room.history.len();
                stats.subscribers += room.subscribers.len();
                stats
            },
        )
    }

    fn room(&self, location: Point) -> Arc<Mutex<Room>> {
        {
            let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(room) = rooms.get(&location) {
                return Arc::clone(room);
            }
        }
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(rooms.entry(location).or_default())
    }
}

// Critical sections never panic midway, so a poisoned room is still consistent.
fn lock(room: &Mutex<Room>) -> MutexGuard<'_, Room> {
    room.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{FutureExt, StreamExt};

    fn note(p: Point, msg: &str) -> RouteNote {
        RouteNote::new(p, msg)
    }

    fn drain(sub: &mut Subscription) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(n) = sub.receiver.try_recv() {
            out.push(n.message);
        }
        out
    }

    #[test]
    fn join_returns_history_in_arrival_order() {
        let router = NoteRouter::default();
        let p = Point::new(1, 1);
        router.publish(note(p, "a"));
        router.publish(note(p, "b"));
        router.publish(note(Point::new(2, 2), "elsewhere"));

        let (history, _sub) = router.join(p);
        let messages: Vec<&str> = history.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b"]);
    }

    #[test]
    fn live_notes_follow_history_exactly_once() {
        let router = NoteRouter::default();
        let p = Point::new(5, 5);
        router.publish(note(p, "old"));

        let (history, mut sub) = router.join(p);
        assert_eq!(history.len(), 1);

        router.publish(note(p, "new1"));
        router.publish(note(p, "new2"));
        assert_eq!(drain(&mut sub), vec!["new1", "new2"]);
        assert!(drain(&mut sub).is_empty());
    }

    #[test]
    fn publisher_sees_its_own_note() {
        let router = NoteRouter::default();
        let p = Point::new(0, 0);
        let (_, mut sub) = router.join(p);
        assert_eq!(router.publish(note(p, "echo")), 1);
        assert_eq!(drain(&mut sub), vec!["echo"]);
    }

    #[test]
    fn notes_are_scoped_to_exact_location() {
        let router = NoteRouter::default();
        let (_, mut here) = router.join(Point::new(10, 10));
        router.publish(note(Point::new(10, 11), "neighbour"));
        assert!(drain(&mut here).is_empty());
    }

    #[test]
    fn leave_stops_delivery_and_is_idempotent() {
        let router = NoteRouter::default();
        let p = Point::new(3, 3);
        let (_, mut sub) = router.join(p);
        router.leave(sub.handle());
        router.leave(sub.handle());
        assert_eq!(router.publish(note(p, "after")), 0);
        // Leaving drops the sender, so the subscription terminates.
        assert_eq!(sub.next().now_or_never(), Some(None));
        assert!(!sub.was_evicted());
    }

    #[test]
    fn leave_unknown_location_is_noop() {
        let router = NoteRouter::default();
        let (_, sub) = router.join(Point::new(1, 1));
        router.leave(SubscriptionHandle {
            id: sub.handle().id(),
            location: Point::new(9, 9),
        });
        assert_eq!(router.stats().subscribers, 1);
    }

    #[test]
    fn full_subscriber_is_evicted_without_affecting_others() {
        let router = NoteRouter::new(&ChatConfig {
            subscriber_buffer: 1,
            ..ChatConfig::default()
        });
        let p = Point::new(7, 7);
        let (_, mut slow) = router.join(p);
        let (_, mut fast) = router.join(p);

        let mut fast_seen = Vec::new();
        for i in 0..10 {
            router.publish(note(p, &i.to_string()));
            fast_seen.extend(drain(&mut fast));
        }

        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(fast_seen, expected);
        assert!(slow.was_evicted());
        // The slow one keeps what was queued before eviction, then ends.
        let kept = drain(&mut slow);
        assert!(!kept.is_empty());
        assert_eq!(kept[0], "0");
        assert_eq!(slow.next().now_or_never(), Some(Some(Err(ChatError::Lagged { location: p }))));
        assert_eq!(slow.next().now_or_never(), Some(None));
        assert_eq!(router.stats().subscribers, 1);
    }

    #[tokio::test]
    async fn evicted_subscription_ends_with_lagged() {
        let router = NoteRouter::new(&ChatConfig {
            subscriber_buffer: 1,
            ..ChatConfig::default()
        });
        let p = Point::new(6, 6);
        let (_, mut sub) = router.join(p);
        for i in 0..5 {
            router.publish(note(p, &i.to_string()));
        }

        let mut items = Vec::new();
        while let Some(item) = sub.next().await {
            items.push(item);
        }
        assert_eq!(items.last(), Some(&Err(ChatError::Lagged { location: p })));
        assert!(items[..items.len() - 1].iter().all(|i| i.is_ok()));
    }

    #[tokio::test]
    async fn left_subscription_ends_cleanly() {
        let router = NoteRouter::default();
        let p = Point::new(6, 7);
        let (_, mut sub) = router.join(p);
        router.publish(note(p, "last"));
        router.leave(sub.handle());
        assert_eq!(sub.next().await, Some(Ok(note(p, "last"))));
        assert_eq!(sub.next().await, None);
    }

    #[test]
    fn dropped_subscription_is_pruned_on_publish() {
        let router = NoteRouter::default();
        let p = Point::new(4, 4);
        let (_, sub) = router.join(p);
        drop(sub);
        assert_eq!(router.publish(note(p, "x")), 0);
        assert_eq!(router.stats().subscribers, 0);
    }

    #[test]
    fn history_limit_keeps_most_recent() {
        let router = NoteRouter::new(&ChatConfig {
            history_limit: Some(2),
            ..ChatConfig::default()
        });
        let p = Point::new(8, 8);
        for m in ["a", "b", "c"] {
            router.publish(note(p, m));
        }
        let messages: Vec<String> = router.history(p).into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["b", "c"]);
    }

    #[test]
    fn stats_count_rooms_notes_and_subscribers() {
        let router = NoteRouter::default();
        router.publish(note(Point::new(1, 0), "a"));
        router.publish(note(Point::new(1, 0), "b"));
        let (_, _sub) = router.join(Point::new(2, 0));
        assert_eq!(
            router.stats(),
            ChatStats {
                locations: 2,
                notes: 2,
                subscribers: 1
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publishers_preserve_per_publisher_order() {
        let router = Arc::new(NoteRouter::new(&ChatConfig {
            subscriber_buffer: 1024,
            ..ChatConfig::default()
        }));
        let p = Point::new(42, 42);
        let (_, mut sub) = router.join(p);

        let mut tasks = Vec::new();
        for publisher in 0..4 {
            let router = Arc::clone(&router);
            tasks.push(tokio::spawn(async move {
                for seq in 0..50 {
                    router.publish(note(p, &format!("{publisher}:{seq}")));
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let mut last = [-1i32; 4];
        for _ in 0..200 {
            let n = sub.next().await.unwrap().unwrap();
            let (publisher, seq) = n.message.split_once(':').unwrap();
            let publisher: usize = publisher.parse().unwrap();
            let seq: i32 = seq.parse().unwrap();
            assert!(seq > last[publisher], "out of order for publisher {publisher}");
            last[publisher] = seq;
        }
        assert_eq!(router.history(p).len(), 200);
    }
}

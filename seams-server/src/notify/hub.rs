//! Sequenced publish/subscribe hub with bounded replay.
//!
//! Ordering: `publish` assigns `seq`, appends to the replay ring and fans out
//! while holding the hub lock, and `subscribe` snapshots the ring and
//! registers under the same lock. Every notification a subscriber can see
//! therefore arrives exactly once, either in its replay or live, in `seq`
//! order.
//!
//! Backpressure: each subscriber has a bounded queue filled with
//! `try_send`. A full queue drops that subscriber; its stream drains what
//! was queued and ends with [`Frame::Lagged`]. Publishers never wait.
//!
//! Shutdown: [`NotificationHub::close`] drops every sender, so open streams
//! drain and end, and later subscriptions end after their replay.

use std::collections::{HashSet, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::{NotificationKind, Room};

/// A published notification
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub seq: u64,
    pub kind: NotificationKind,
    #[serde(skip)]
    pub rooms: Vec<Room>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn visible_to(&self, rooms: &HashSet<Room>) -> bool {
        self.rooms.iter().any(|r| rooms.contains(r))
    }
}

/// What a subscription yields
#[derive(Debug, Clone)]
pub enum Frame {
    Notification(Arc<Notification>),
    /// The requested resume point is no longer retained; refetch state.
    ResyncRequired { latest_seq: u64 },
    /// The subscriber fell behind and was disconnected.
    Lagged { last_delivered: u64 },
}

struct SubscriberHandle {
    rooms: HashSet<Room>,
    tx: mpsc::Sender<Frame>,
    lagged: Arc<AtomicBool>,
}

struct Ring {
    /// Last assigned sequence number; 0 before the first publish
    head: u64,
    entries: VecDeque<Arc<Notification>>,
}

struct HubInner {
    ring: Mutex<Ring>,
    subscribers: DashMap<u64, SubscriberHandle>,
    next_subscriber: AtomicU64,
    closed: AtomicBool,
    replay_capacity: usize,
    subscriber_buffer: usize,
}

/// Fan-out hub for domain notifications
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

impl NotificationHub {
    pub fn new(replay_capacity: usize, subscriber_buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                ring: Mutex::new(Ring {
                    head: 0,
                    entries: VecDeque::with_capacity(replay_capacity.max(1)),
                }),
                subscribers: DashMap::new(),
                next_subscriber: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                replay_capacity: replay_capacity.max(1),
                subscriber_buffer: subscriber_buffer.max(1),
            }),
        }
    }

    /// Publish to every subscriber in any of `rooms`. Returns the assigned seq.
    pub fn publish(
        &self,
        kind: NotificationKind,
        rooms: Vec<Room>,
        payload: serde_json::Value,
    ) -> u64 {
        let mut ring = match self.inner.ring.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        ring.head += 1;
        let notification = Arc::new(Notification {
            seq: ring.head,
            kind,
            rooms,
            payload,
            created_at: Utc::now(),
        });

        if ring.entries.len() == self.inner.replay_capacity {
            ring.entries.pop_front();
        }
        ring.entries.push_back(notification.clone());

        let mut dropped = Vec::new();
        for entry in self.inner.subscribers.iter() {
            if !notification.visible_to(&entry.rooms) {
                continue;
            }
            match entry.tx.try_send(Frame::Notification(notification.clone())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    entry.lagged.store(true, Ordering::Release);
                    dropped.push(*entry.key());
                }
                Err(TrySendError::Closed(_)) => dropped.push(*entry.key()),
            }
        }
        for id in dropped {
            if let Some((_, handle)) = self.inner.subscribers.remove(&id) {
                if handle.lagged.load(Ordering::Acquire) {
                    tracing::warn!(
                        subscriber = id,
                        seq = notification.seq,
                        "Notification subscriber lagged, disconnecting"
                    );
                }
            }
        }

        tracing::debug!(
            seq = notification.seq,
            kind = notification.kind.as_str(),
            "Notification published"
        );
        notification.seq
    }

    /// Subscribe to `rooms`, resuming after `last_seen` when given.
    pub fn subscribe(&self, rooms: Vec<Room>, last_seen: Option<u64>) -> Subscription {
        let rooms: HashSet<Room> = rooms.into_iter().collect();
        let (tx, rx) = mpsc::channel(self.inner.subscriber_buffer);
        let lagged = Arc::new(AtomicBool::new(false));
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);

        let ring = match self.inner.ring.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut pending = VecDeque::new();
        if let Some(last_seen) = last_seen {
            let oldest = ring.entries.front().map_or(ring.head + 1, |n| n.seq);
            if last_seen > ring.head || last_seen + 1 < oldest {
                pending.push_back(Frame::ResyncRequired {
                    latest_seq: ring.head,
                });
            } else {
                pending.extend(
                    ring.entries
                        .iter()
                        .filter(|n| n.seq > last_seen && n.visible_to(&rooms))
                        .cloned()
                        .map(Frame::Notification),
                );
            }
        }

        if !self.inner.closed.load(Ordering::Acquire) {
            self.inner.subscribers.insert(
                id,
                SubscriberHandle {
                    rooms,
                    tx,
                    lagged: lagged.clone(),
                },
            );
        }
        drop(ring);

        tracing::debug!(subscriber = id, replayed = pending.len(), "Subscriber registered");

        Subscription {
            id,
            hub: self.inner.clone(),
            pending,
            rx,
            lagged,
            last_delivered: last_seen.unwrap_or(0),
            finished: false,
        }
    }

    /// End every open subscription and refuse new live ones.
    pub fn close(&self) {
        let _ring = match self.inner.ring.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.inner.closed.store(true, Ordering::Release);
        let open = self.inner.subscribers.len();
        self.inner.subscribers.clear();
        tracing::info!(subscribers = open, "Notification hub closed");
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Last assigned sequence number
    pub fn latest_seq(&self) -> u64 {
        match self.inner.ring.lock() {
            Ok(ring) => ring.head,
            Err(poisoned) => poisoned.into_inner().head,
        }
    }
}

/// A live subscription. Dropping it unregisters the subscriber.
pub struct Subscription {
    id: u64,
    hub: Arc<HubInner>,
    pending: VecDeque<Frame>,
    rx: mpsc::Receiver<Frame>,
    lagged: Arc<AtomicBool>,
    last_delivered: u64,
    finished: bool,
}

impl Subscription {
    fn track(&mut self, frame: &Frame) {
        match frame {
            Frame::Notification(n) => self.last_delivered = n.seq,
            Frame::ResyncRequired { latest_seq } => self.last_delivered = *latest_seq,
            Frame::Lagged { .. } => {}
        }
    }
}

impl Stream for Subscription {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        if let Some(frame) = self.pending.pop_front() {
            self.track(&frame);
            return Poll::Ready(Some(frame));
        }
        if self.finished {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(frame)) => {
                self.track(&frame);
                Poll::Ready(Some(frame))
            }
            Poll::Ready(None) => {
                self.finished = true;
                if self.lagged.load(Ordering::Acquire) {
                    Poll::Ready(Some(Frame::Lagged {
                        last_delivered: self.last_delivered,
                    }))
                } else {
                    Poll::Ready(None)
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.hub.subscribers.remove(&self.id).is_some() {
            tracing::debug!(subscriber = self.id, "Subscriber unregistered");
        }
    }
}

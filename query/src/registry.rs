//! Per-address subscriber registry for in-flight queries.
//!
//! The receive loop does not know which query a datagram belongs to; the
//! protocol carries no request id. It only knows the sender and the response
//! kind. A query therefore claims the kinds it asks for on its address, and
//! while a claim is held no other query can claim an overlapping kind there.
//! Every response has at most one owner.
//!
//! Each query owns a private bounded queue. Dispatch holds the read lock and
//! never waits on a queue: a full queue drops the datagram for that query
//! only.

use crate::options::QueryKinds;
use crate::protocol::Response;
use log::{debug, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

#[derive(Debug)]
struct Subscriber {
    id: u64,
    kinds: QueryKinds,
    tx: mpsc::Sender<Response>,
}

#[derive(Debug, Default)]
pub struct Registry {
    subscribers: RwLock<HashMap<SocketAddr, Vec<Subscriber>>>,
    next_id: AtomicU64,
    /// Set under the write lock by `clear`.
    closed: AtomicBool,
    released: Notify,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new queue for `kinds` responses from `addr`, waiting first
    /// for any query holding an overlapping claim on the same address to
    /// finish. The registration lasts until the returned [`Subscription`] is
    /// dropped.
    ///
    /// Returns `None` once the registry was cleared.
    pub async fn subscribe(
        self: &Arc<Self>,
        addr: SocketAddr,
        kinds: QueryKinds,
        depth: usize,
    ) -> Option<Subscription> {
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            // register interest before looking, so a release in between is not lost
            released.as_mut().enable();

            if let Some(subscription) = self.try_subscribe(addr, kinds, depth)? {
                return Some(subscription);
            }

            debug!("waiting for {} on {} to be released", kinds, addr);
            released.await;
        }
    }

    /// `None` when closed, `Some(None)` when the kinds are taken.
    fn try_subscribe(
        self: &Arc<Self>,
        addr: SocketAddr,
        kinds: QueryKinds,
        depth: usize,
    ) -> Option<Option<Subscription>> {
        let mut subscribers = self.subscribers.write();
        if self.closed.load(Ordering::Acquire) {
            return None;
        }

        if let Some(list) = subscribers.get(&addr) {
            if list.iter().any(|s| s.kinds.intersects(kinds)) {
                return Some(None);
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(depth.max(1));

        subscribers
            .entry(addr)
            .or_default()
            .push(Subscriber { id, kinds, tx });

        debug!("subscriber {} registered for {} on {}", id, kinds, addr);

        Some(Some(Subscription {
            registry: Arc::clone(self),
            addr,
            id,
            rx,
        }))
    }

    fn unsubscribe(&self, addr: SocketAddr, id: u64) {
        {
            let mut subscribers = self.subscribers.write();

            if let Some(list) = subscribers.get_mut(&addr) {
                list.retain(|s| s.id != id);
                if list.is_empty() {
                    subscribers.remove(&addr);
                }
            }
        }

        debug!("subscriber {} removed from {}", id, addr);
        self.released.notify_waiters();
    }

    /// Hands `response` to the query that claimed its kind on its sender.
    /// Returns how many queues accepted it, at most one.
    pub fn dispatch(&self, response: Response) -> usize {
        let Some(command) = response.header.command() else {
            return 0;
        };
        let kind = QueryKinds::of_response(command);

        let subscribers = self.subscribers.read();

        let Some(list) = subscribers.get(&response.from) else {
            return 0;
        };

        let mut delivered = 0;
        for subscriber in list.iter().filter(|s| s.kinds.intersects(kind)) {
            match subscriber.tx.try_send(response.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "queue for subscriber {} on {} is full, dropping response",
                        subscriber.id, response.from
                    );
                }
                // receiver is mid-teardown; its Drop will unsubscribe
                Err(TrySendError::Closed(_)) => {}
            }
        }

        delivered
    }

    /// Drops every registration and refuses new ones. Waiting queries wake
    /// with a closed queue.
    pub fn clear(&self) {
        {
            let mut subscribers = self.subscribers.write();
            self.closed.store(true, Ordering::Release);
            subscribers.clear();
        }
        self.released.notify_waiters();
    }

    /// Total number of registered subscribers across all addresses.
    pub fn len(&self) -> usize {
        self.subscribers.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

/// A live registration. Dropping it deregisters, whatever path the query
/// leaves by.
#[derive(Debug)]
pub struct Subscription {
    registry: Arc<Registry>,
    addr: SocketAddr,
    id: u64,
    rx: mpsc::Receiver<Response>,
}

impl Subscription {
    /// Next response from the address, or `None` once the registry was
    /// cleared.
    pub async fn recv(&mut self) -> Option<Response> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.addr, self.id);
    }
}

//! In-process router

use super::{Received, Transport, TransportLink};
use crate::codec::{Codec, Message, XdrCodec};
use crate::error::TransportError;
use crate::options::{ClientOptions, DropPolicy};
use crate::uri::ElvinUri;
use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A single-process Elvin router
///
/// Links are grouped by URI endpoint (`host:port`). A `NotifyEmit`
/// transmitted on a link is delivered as a `NotifyDeliver` to every open
/// link on the same endpoint, including the sender. Subscription matching
/// happens client-side, so every link sees every notification.
///
/// A delivery is secure when both the sending and the receiving link were
/// opened with a secure URI. Emits with `deliver_insecure = false` skip
/// insecure receivers.
///
/// Cloning shares the router.
#[derive(Clone)]
pub struct LocalRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    codec: XdrCodec,
    queue_limit: usize,
    drop_policy: DropPolicy,
    state: Mutex<RouterState>,
    next_link: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Default)]
struct RouterState {
    links: HashMap<String, Vec<Arc<LinkQueue>>>,
    refused: HashSet<String>,
}

struct LinkQueue {
    id: u64,
    secure: bool,
    state: Mutex<QueueState>,
    ready: Condvar,
}

#[derive(Default)]
struct QueueState {
    frames: VecDeque<Received>,
    closed: Option<TransportError>,
}

impl LinkQueue {
    fn close(&self, reason: TransportError) {
        let mut state = self.state.lock();
        if state.closed.is_none() {
            state.closed = Some(reason);
            state.frames.clear();
        }
        self.ready.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed.is_some()
    }
}

impl Default for LocalRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRouter {
    pub fn new() -> Self {
        Self::with_options(&ClientOptions::default())
    }

    /// Router using the queue bounds and frame size limit from `options`
    pub fn with_options(options: &ClientOptions) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                codec: XdrCodec::new(options.packet_max_length),
                queue_limit: options.receive_queue_max_length,
                drop_policy: options.drop_policy,
                state: Mutex::new(RouterState::default()),
                next_link: AtomicU64::new(1),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Refuse future connections to `host`
    pub fn refuse(&self, host: impl Into<String>) {
        self.inner.state.lock().refused.insert(host.into());
    }

    /// Number of open links on `endpoint` (`host:port`)
    pub fn link_count(&self, endpoint: &str) -> usize {
        self.inner
            .state
            .lock()
            .links
            .get(endpoint)
            .map_or(0, Vec::len)
    }

    /// Frames discarded because a receive queue was full
    pub fn dropped_frames(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Close every link. Blocked receivers see [`TransportError::Closed`].
    pub fn shutdown(&self) {
        let links = std::mem::take(&mut self.inner.state.lock().links);
        tracing::debug!("Router shutdown, closing {} endpoints", links.len());
        for queue in links.into_values().flatten() {
            queue.close(TransportError::Closed);
        }
    }

    /// Fail every link on `endpoint` with [`TransportError::Failed`]
    pub fn fail_endpoint(&self, endpoint: &str, message: impl Into<String>) {
        let message = message.into();
        let links = self.inner.state.lock().links.remove(endpoint);
        for queue in links.into_iter().flatten() {
            queue.close(TransportError::Failed(message.clone()));
        }
    }
}

impl Transport for LocalRouter {
    fn connect(&self, uri: &ElvinUri) -> Result<Box<dyn TransportLink>, TransportError> {
        let mut state = self.inner.state.lock();
        if state.refused.contains(&uri.host) {
            return Err(TransportError::Refused(uri.endpoint()));
        }

        let queue = Arc::new(LinkQueue {
            id: self.inner.next_link.fetch_add(1, Ordering::Relaxed),
            secure: uri.is_secure(),
            state: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
        });

        let endpoint = uri.endpoint();
        state
            .links
            .entry(endpoint.clone())
            .or_default()
            .push(Arc::clone(&queue));

        tracing::debug!("Link {} opened on {}", queue.id, endpoint);
        Ok(Box::new(LocalLink {
            router: Arc::clone(&self.inner),
            endpoint,
            queue,
        }))
    }
}

struct LocalLink {
    router: Arc<RouterInner>,
    endpoint: String,
    queue: Arc<LinkQueue>,
}

impl RouterInner {
    fn is_full(&self, queue: &LinkQueue) -> bool {
        self.queue_limit > 0 && queue.state.lock().frames.len() >= self.queue_limit
    }

    /// Queue `received` on `queue`, dropping a frame when it is full.
    ///
    /// `Fail` is checked by the caller before anything is queued. A queue
    /// that is still full here is the sender's own, which loses its oldest
    /// frame.
    fn enqueue(&self, queue: &LinkQueue, received: Received) {
        let mut state = queue.state.lock();
        if state.closed.is_some() {
            return;
        }

        if self.queue_limit > 0 && state.frames.len() >= self.queue_limit {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            match self.drop_policy {
                DropPolicy::Oldest | DropPolicy::Fail => {
                    state.frames.pop_front();
                    tracing::warn!("Receive queue full on link {}, dropped oldest frame", queue.id);
                }
                DropPolicy::Newest => {
                    tracing::warn!("Receive queue full on link {}, dropping new frame", queue.id);
                    return;
                }
            }
        }

        state.frames.push_back(received);
        queue.ready.notify_one();
    }
}

impl TransportLink for LocalLink {
    fn transmit(&self, frame: Bytes) -> Result<(), TransportError> {
        if self.queue.is_closed() {
            return Err(TransportError::Closed);
        }

        let (attributes, deliver_insecure) = match self.router.codec.decode_frame(&frame) {
            Ok(Message::NotifyEmit {
                attributes,
                deliver_insecure,
            }) => (attributes, deliver_insecure),
            Ok(other) => {
                return Err(TransportError::Failed(format!(
                    "Router cannot accept {}",
                    other.name()
                )))
            }
            Err(e) => return Err(TransportError::Failed(format!("Bad frame: {}", e))),
        };

        let deliver = self
            .router
            .codec
            .encode_frame(&Message::NotifyDeliver {
                attributes,
                secure_matches: Vec::new(),
                insecure_matches: Vec::new(),
            })
            .map_err(|e| TransportError::Failed(e.to_string()))?;

        // Held for the whole broadcast so a Fail check stays valid
        let state = self.router.state.lock();
        let receivers: Vec<(&Arc<LinkQueue>, bool)> = state
            .links
            .get(&self.endpoint)
            .into_iter()
            .flatten()
            .filter_map(|receiver| {
                let secure = self.queue.secure && receiver.secure;
                (secure || deliver_insecure).then_some((receiver, secure))
            })
            .collect();

        if self.router.drop_policy == DropPolicy::Fail {
            let full = receivers
                .iter()
                .find(|(receiver, _)| receiver.id != self.queue.id && self.router.is_full(receiver));
            if let Some((receiver, _)) = full {
                tracing::warn!("Receive queue full on link {}, refusing frame", receiver.id);
                return Err(TransportError::QueueFull(self.router.queue_limit));
            }
        }

        for (receiver, secure) in receivers {
            self.router.enqueue(
                receiver,
                Received {
                    frame: deliver.clone(),
                    secure,
                },
            );
        }
        Ok(())
    }

    fn receive_next(&self) -> Result<Received, TransportError> {
        let mut state = self.queue.state.lock();
        loop {
            if let Some(reason) = &state.closed {
                return Err(reason.clone());
            }
            if let Some(received) = state.frames.pop_front() {
                return Ok(received);
            }
            self.queue.ready.wait(&mut state);
        }
    }

    fn disconnect(&self) {
        self.queue.close(TransportError::Closed);

        let mut state = self.router.state.lock();
        if let Some(links) = state.links.get_mut(&self.endpoint) {
            links.retain(|queue| queue.id != self.queue.id);
            if links.is_empty() {
                state.links.remove(&self.endpoint);
            }
        }
    }
}

impl Drop for LocalLink {
    fn drop(&mut self) {
        self.disconnect();
    }
}

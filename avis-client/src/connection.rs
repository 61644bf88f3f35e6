//! Connections and the event loop
//!
//! A [`Connection`] owns a transport link and the set of live
//! subscriptions. [`Connection::event_loop`] blocks its thread, receiving
//! notifications and dispatching each to every matching subscription's
//! listeners.
//!
//! Dispatch works from snapshots, so listeners may freely subscribe,
//! unsubscribe, add or remove listeners, send, or close the connection they
//! are being called from. No connection lock is held while a listener runs.

use crate::codec::{Codec, Message};
use crate::error::{ClientError, ListenerError, Result, TransportError};
use crate::filter::FilterLanguage;
use crate::listener::NotificationEvent;
use crate::options::{ClientOptions, PanicPolicy};
use crate::subscription::{Subscription, SubscriptionInner};
use crate::transport::TransportLink;
use crate::types::SubscriptionId;
use crate::uri::ElvinUri;
use avis_types::Attributes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback for listener failures, installed with
/// [`Client::on_listener_error`](crate::Client::on_listener_error)
pub type ErrorHook = Arc<dyn Fn(&ListenerError) + Send + Sync>;

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Open,
    /// Open, with an event loop running
    LoopRunning,
    Closed,
}

/// Why an event loop returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// [`Connection::close`] was called
    Closed,
    /// The router closed the link
    Disconnected,
    /// The transport failed
    Failed(String),
}

/// Counters for one connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub notifications_sent: u64,
    pub notifications_received: u64,
    /// Received notifications that matched at least one subscription
    pub notifications_matched: u64,
    pub listener_failures: u64,
    /// Received frames that could not be decoded or were not deliveries
    pub frames_dropped: u64,
}

#[derive(Default)]
struct StatCounters {
    sent: AtomicU64,
    received: AtomicU64,
    matched: AtomicU64,
    listener_failures: AtomicU64,
    frames_dropped: AtomicU64,
}

#[derive(Default)]
struct Shared {
    closed: bool,
    loop_running: bool,
    /// Ids are allocated in creation order, so this iterates oldest first
    subscriptions: BTreeMap<SubscriptionId, Arc<SubscriptionInner>>,
}

pub(crate) struct ConnectionInner {
    uri: ElvinUri,
    link: Box<dyn TransportLink>,
    codec: Arc<dyn Codec>,
    language: Arc<dyn FilterLanguage>,
    panic_policy: PanicPolicy,
    error_hook: Option<ErrorHook>,
    shared: Mutex<Shared>,
    stats: StatCounters,
}

impl ConnectionInner {
    pub(crate) fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub(crate) fn remove_subscription(&self, id: SubscriptionId) {
        let removed = self.shared.lock().subscriptions.remove(&id);
        drop(removed);
    }

    /// Mark closed and drop the subscription table. Returns false if
    /// already closed.
    fn shut(&self) -> bool {
        let subscriptions = {
            let mut shared = self.shared.lock();
            if shared.closed {
                return false;
            }
            shared.closed = true;
            std::mem::take(&mut shared.subscriptions)
        };
        self.link.disconnect();
        drop(subscriptions);
        true
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        self.link.disconnect();
    }
}

/// Clears the loop-running flag however the loop exits, unwinding included
struct LoopGuard<'a> {
    inner: &'a ConnectionInner,
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.inner.shared.lock().loop_running = false;
    }
}

/// A client connection to an Elvin router
///
/// Cloning gives another handle to the same connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub(crate) fn new(
        uri: ElvinUri,
        link: Box<dyn TransportLink>,
        codec: Arc<dyn Codec>,
        language: Arc<dyn FilterLanguage>,
        options: &ClientOptions,
        error_hook: Option<ErrorHook>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                uri,
                link,
                codec,
                language,
                panic_policy: options.listener_panic_policy,
                error_hook,
                shared: Mutex::new(Shared::default()),
                stats: StatCounters::default(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ConnectionInner>) -> Self {
        Self { inner }
    }

    pub fn uri(&self) -> &ElvinUri {
        &self.inner.uri
    }

    pub fn state(&self) -> ConnectionState {
        let shared = self.inner.shared.lock();
        if shared.closed {
            ConnectionState::Closed
        } else if shared.loop_running {
            ConnectionState::LoopRunning
        } else {
            ConnectionState::Open
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Send a notification that may be delivered insecurely
    pub fn send(&self, attributes: &Attributes) -> Result<()> {
        self.send_with(attributes, true)
    }

    /// Send a notification. With `deliver_insecure` false it only reaches
    /// receivers on a secure path.
    pub fn send_with(&self, attributes: &Attributes, deliver_insecure: bool) -> Result<()> {
        if self.is_closed() {
            return Err(ClientError::NotConnected);
        }

        let frame = self.inner.codec.encode_frame(&Message::NotifyEmit {
            attributes: attributes.clone(),
            deliver_insecure,
        })?;

        self.inner.link.transmit(frame).map_err(|error| match error {
            TransportError::Closed => ClientError::NotConnected,
            other => ClientError::Transmit(other),
        })?;

        self.inner.stats.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Create a subscription for `expression`
    pub fn subscribe(&self, expression: &str) -> Result<Subscription> {
        let predicate = self.inner.language.compile(expression)?;
        let sub = Arc::new(SubscriptionInner::new(
            expression,
            predicate,
            Arc::downgrade(&self.inner),
        ));

        {
            let mut shared = self.inner.shared.lock();
            if shared.closed {
                return Err(ClientError::NotConnected);
            }
            shared.subscriptions.insert(sub.id, Arc::clone(&sub));
        }

        tracing::debug!("Subscribed {} to \"{}\"", sub.id, expression);
        Ok(Subscription::from_inner(sub))
    }

    /// Ids of active subscriptions, oldest first
    pub fn subscriptions(&self) -> Vec<SubscriptionId> {
        self.inner.shared.lock().subscriptions.keys().copied().collect()
    }

    pub fn stats(&self) -> ConnectionStats {
        let stats = &self.inner.stats;
        ConnectionStats {
            notifications_sent: stats.sent.load(Ordering::Relaxed),
            notifications_received: stats.received.load(Ordering::Relaxed),
            notifications_matched: stats.matched.load(Ordering::Relaxed),
            listener_failures: stats.listener_failures.load(Ordering::Relaxed),
            frames_dropped: stats.frames_dropped.load(Ordering::Relaxed),
        }
    }

    /// Close the connection. Idempotent, and safe from any thread or from
    /// inside a listener. A running event loop finishes its current
    /// dispatch pass and returns [`LoopExit::Closed`].
    pub fn close(&self) {
        if self.inner.shut() {
            tracing::debug!("Closed connection to {}", self.inner.uri);
        }
    }

    /// Receive and dispatch notifications until the connection closes.
    ///
    /// Only one event loop may run per connection.
    pub fn event_loop(&self) -> Result<LoopExit> {
        let _guard = self.enter_loop()?;
        tracing::debug!("Event loop started on {}", self.inner.uri);

        let exit = loop {
            if let Some(exit) = self.step() {
                break exit;
            }
        };

        tracing::debug!("Event loop on {} stopped: {:?}", self.inner.uri, exit);
        Ok(exit)
    }

    /// Receive and dispatch one frame. Returns the exit reason if the
    /// connection closed while doing so.
    pub fn run_once(&self) -> Result<Option<LoopExit>> {
        let _guard = self.enter_loop()?;
        Ok(self.step())
    }

    fn enter_loop(&self) -> Result<LoopGuard<'_>> {
        let mut shared = self.inner.shared.lock();
        if shared.closed {
            return Err(ClientError::NotConnected);
        }
        if shared.loop_running {
            return Err(ClientError::LoopAlreadyRunning);
        }
        shared.loop_running = true;
        Ok(LoopGuard { inner: &self.inner })
    }

    fn step(&self) -> Option<LoopExit> {
        let received = match self.inner.link.receive_next() {
            Ok(received) => received,
            Err(error) => return Some(self.transport_exit(error)),
        };

        if self.is_closed() {
            return Some(LoopExit::Closed);
        }

        match self.inner.codec.decode_frame(&received.frame) {
            Ok(Message::NotifyDeliver { attributes, .. }) => {
                self.inner.stats.received.fetch_add(1, Ordering::Relaxed);
                self.dispatch(&attributes, received.secure);
            }
            Ok(other) => {
                self.inner.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Ignoring unexpected {} frame", other.name());
            }
            Err(error) => {
                self.inner.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Dropping undecodable frame: {}", error);
            }
        }

        if self.is_closed() {
            Some(LoopExit::Closed)
        } else {
            None
        }
    }

    fn transport_exit(&self, error: TransportError) -> LoopExit {
        let closed_locally = !self.inner.shut();
        match error {
            _ if closed_locally => LoopExit::Closed,
            TransportError::Closed => {
                tracing::info!("Router closed connection to {}", self.inner.uri);
                LoopExit::Disconnected
            }
            other => {
                tracing::warn!("Connection to {} failed: {}", self.inner.uri, other);
                LoopExit::Failed(other.to_string())
            }
        }
    }

    /// One dispatch pass over a snapshot of the subscription table
    fn dispatch(&self, attributes: &Attributes, secure: bool) {
        let snapshot: Vec<Arc<SubscriptionInner>> = self
            .inner
            .shared
            .lock()
            .subscriptions
            .values()
            .cloned()
            .collect();

        let mut matched = false;
        for sub in snapshot {
            if !sub.active.load(Ordering::SeqCst) {
                continue;
            }
            if !secure && !sub.accept_insecure.load(Ordering::SeqCst) {
                continue;
            }
            if !sub.predicate.matches(attributes) {
                continue;
            }

            matched = true;
            let listeners = sub.listener_snapshot();
            let subscription = Subscription::from_inner(sub);
            let event = NotificationEvent {
                subscription: &subscription,
                attributes,
                secure,
            };

            for (listener_id, listener) in listeners.iter() {
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener.notify(&event)));

                let (error, panic) = match result {
                    Ok(Ok(())) => continue,
                    Ok(Err(error)) => (
                        ListenerError::Failed {
                            subscription: subscription.id(),
                            listener: *listener_id,
                            error,
                        },
                        None,
                    ),
                    Err(payload) => (
                        ListenerError::Panicked {
                            subscription: subscription.id(),
                            listener: *listener_id,
                            message: panic_message(payload.as_ref()),
                        },
                        Some(payload),
                    ),
                };

                self.report(&error);
                if let Some(payload) = panic {
                    if self.inner.panic_policy == PanicPolicy::Propagate {
                        std::panic::resume_unwind(payload);
                    }
                }
            }
        }

        if matched {
            self.inner.stats.matched.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn report(&self, error: &ListenerError) {
        self.inner
            .stats
            .listener_failures
            .fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            subscription = %error.subscription(),
            listener = %error.listener(),
            "{}",
            error
        );
        if let Some(hook) = &self.inner.error_hook {
            hook(error);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked".to_string()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("uri", &self.inner.uri.as_str())
            .field("state", &self.state())
            .finish()
    }
}

//! Subscriptions and their listener lists

use crate::connection::{Connection, ConnectionInner};
use crate::filter::Predicate;
use crate::listener::Listener;
use crate::types::{ListenerId, SubscriptionId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

pub(crate) type ListenerList = Arc<Vec<(ListenerId, Arc<dyn Listener>)>>;

pub(crate) struct SubscriptionInner {
    pub(crate) id: SubscriptionId,
    expression: String,
    pub(crate) predicate: Arc<dyn Predicate>,
    connection: Weak<ConnectionInner>,
    pub(crate) active: AtomicBool,
    pub(crate) accept_insecure: AtomicBool,
    /// Copy-on-write: dispatch clones the `Arc`, mutation replaces the list
    listeners: Mutex<ListenerList>,
}

impl SubscriptionInner {
    pub(crate) fn new(
        expression: &str,
        predicate: Arc<dyn Predicate>,
        connection: Weak<ConnectionInner>,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            expression: expression.to_string(),
            predicate,
            connection,
            active: AtomicBool::new(true),
            accept_insecure: AtomicBool::new(true),
            listeners: Mutex::new(Arc::new(Vec::new())),
        }
    }

    /// Listeners as of now, in registration order
    pub(crate) fn listener_snapshot(&self) -> ListenerList {
        Arc::clone(&self.listeners.lock())
    }
}

/// A filter expression bound to an ordered list of listeners
///
/// Created by [`Connection::subscribe`]. Handles are cheap to clone and all
/// refer to the same subscription. Dropping a handle does not unsubscribe;
/// call [`unsubscribe`](Subscription::unsubscribe).
#[derive(Clone)]
pub struct Subscription {
    pub(crate) inner: Arc<SubscriptionInner>,
}

impl Subscription {
    pub(crate) fn from_inner(inner: Arc<SubscriptionInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> SubscriptionId {
        self.inner.id
    }

    /// The expression text this subscription was created from
    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    /// True until unsubscribed or the connection closes
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
            && self
                .inner
                .connection
                .upgrade()
                .map_or(false, |connection| !connection.is_closed())
    }

    /// The owning connection, if any handle to it is still alive
    pub fn connection(&self) -> Option<Connection> {
        self.inner.connection.upgrade().map(Connection::from_inner)
    }

    /// Append a listener. Listeners run in registration order.
    pub fn add_listener<L: Listener + 'static>(&self, listener: L) -> ListenerId {
        let id = ListenerId::new();
        let mut listeners = self.inner.listeners.lock();
        Arc::make_mut(&mut *listeners).push((id, Arc::new(listener)));
        tracing::trace!("Added {} to {}", id, self.inner.id);
        id
    }

    /// Remove a listener. Returns false if it was not attached.
    ///
    /// Safe to call from inside any listener, including the one being
    /// removed: a dispatch pass already under way keeps its own copy of the
    /// list.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        match listeners.iter().position(|(listener_id, _)| *listener_id == id) {
            Some(index) => {
                Arc::make_mut(&mut *listeners).remove(index);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Whether notifications delivered over an insecure path reach this
    /// subscription. Defaults to true.
    pub fn set_accept_insecure(&self, accept: bool) {
        self.inner.accept_insecure.store(accept, Ordering::SeqCst);
    }

    pub fn accepts_insecure(&self) -> bool {
        self.inner.accept_insecure.load(Ordering::SeqCst)
    }

    /// Deregister from the connection and drop all listeners. Idempotent.
    pub fn unsubscribe(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }

        let dropped = std::mem::take(&mut *self.inner.listeners.lock());
        if let Some(connection) = self.inner.connection.upgrade() {
            connection.remove_subscription(self.inner.id);
        }
        tracing::debug!("Unsubscribed {}", self.inner.id);
        drop(dropped);
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Subscription {}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("expression", &self.inner.expression)
            .field("active", &self.inner.active.load(Ordering::SeqCst))
            .field("listeners", &self.listener_count())
            .finish()
    }
}

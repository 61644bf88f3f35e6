//! Listener callbacks
//!
//! A listener receives every notification matched by the subscription it is
//! attached to. Closures work directly:
//!
//! ```
//! use avis_client::{Client, NotificationEvent};
//!
//! let client = Client::with_defaults();
//! let connection = client.open("elvin://localhost").unwrap();
//! let subscription = connection.subscribe("require(Greeting)").unwrap();
//!
//! subscription.add_listener(|event: &NotificationEvent<'_>| -> anyhow::Result<()> {
//!     println!("{}", event.attributes.get_string("Greeting")?);
//!     Ok(())
//! });
//! ```
//!
//! The attribute map is only borrowed for the duration of the call; clone it
//! to keep it.

use crate::subscription::Subscription;
use avis_types::Attributes;
use parking_lot::Mutex;
use std::sync::Arc;

/// One matched notification, as seen by a listener
pub struct NotificationEvent<'a> {
    pub subscription: &'a Subscription,
    pub attributes: &'a Attributes,
    /// Delivered over a secure path end to end
    pub secure: bool,
}

/// Callback for matched notifications
///
/// Errors and panics are caught by the event loop, reported, and do not
/// stop delivery to other listeners.
pub trait Listener: Send + Sync {
    fn notify(&self, event: &NotificationEvent<'_>) -> anyhow::Result<()>;
}

impl<F> Listener for F
where
    F: Fn(&NotificationEvent<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn notify(&self, event: &NotificationEvent<'_>) -> anyhow::Result<()> {
        self(event)
    }
}

/// A notification kept by [`CollectingListener`]
#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    pub attributes: Attributes,
    pub secure: bool,
}

/// A listener that keeps a copy of everything it receives
///
/// Clones share the same buffer, so one clone can be registered while
/// another is inspected.
#[derive(Debug, Clone, Default)]
pub struct CollectingListener {
    received: Arc<Mutex<Vec<Collected>>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.received.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.received.lock().is_empty()
    }

    /// Copy of the notifications received so far
    pub fn received(&self) -> Vec<Collected> {
        self.received.lock().clone()
    }

    /// Take the collected notifications, leaving the listener empty
    pub fn take(&self) -> Vec<Collected> {
        std::mem::take(&mut *self.received.lock())
    }
}

impl Listener for CollectingListener {
    fn notify(&self, event: &NotificationEvent<'_>) -> anyhow::Result<()> {
        self.received.lock().push(Collected {
            attributes: event.attributes.clone(),
            secure: event.secure,
        });
        Ok(())
    }
}

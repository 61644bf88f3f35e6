//! # Avis Elvin client
//!
//! Publish notifications to an Elvin router and receive the ones matching
//! your subscriptions.
//!
//! - [`Client`] opens [`Connection`]s from `elvin:` URIs
//! - [`Connection::subscribe`] compiles a subscription expression into a
//!   [`Subscription`], to which [`Listener`]s are attached
//! - [`Connection::event_loop`] blocks, dispatching each received
//!   notification to the listeners of every matching subscription
//!
//! The wire format is Elvin XDR ([`XdrCodec`]). Routers are reached through
//! the [`Transport`] seam; [`LocalRouter`] is an in-process router.
//!
//! ## Example
//!
//! ```
//! use avis_client::{Client, LoopExit, NotificationEvent};
//! use avis_types::Attributes;
//!
//! let client = Client::with_defaults();
//! let connection = client.open("elvin://localhost").unwrap();
//!
//! let subscription = connection.subscribe("Number > 40").unwrap();
//! subscription.add_listener(|event: &NotificationEvent<'_>| -> anyhow::Result<()> {
//!     assert_eq!(event.attributes.get_int32("Number")?, 42);
//!     if let Some(connection) = event.subscription.connection() {
//!         connection.close();
//!     }
//!     Ok(())
//! });
//!
//! let mut notification = Attributes::new();
//! notification.set_int32("Number", 42).unwrap();
//! connection.send(&notification).unwrap();
//!
//! assert_eq!(connection.event_loop().unwrap(), LoopExit::Closed);
//! ```

pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod filter;
pub mod listener;
pub mod options;
pub mod subscription;
pub mod transport;
pub mod types;
pub mod uri;

pub use client::Client;
pub use codec::{Codec, Message, XdrCodec};
pub use connection::{Connection, ConnectionState, ConnectionStats, ErrorHook, LoopExit};
pub use error::{
    ClientError, CodecError, InvalidUriError, ListenerError, OptionsError, Result, TransportError,
};
pub use filter::{ElvinLanguage, FilterLanguage, Predicate};
pub use listener::{Collected, CollectingListener, Listener, NotificationEvent};
pub use options::{ClientOptions, DropPolicy, PanicPolicy};
pub use subscription::Subscription;
pub use transport::{LocalRouter, Received, Transport, TransportLink};
pub use types::{ListenerId, SubscriptionId};
pub use uri::ElvinUri;

// Re-export the payload types
pub use avis_types::{AttributeError, Attributes, AttributesIter, Value, ValueKind};

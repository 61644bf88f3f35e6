//! Client: the factory for connections
//!
//! A client bundles the pieces every connection needs:
//! - a [`Transport`] that opens links to routers
//! - a [`Codec`] for the wire format
//! - a [`FilterLanguage`] for subscription expressions
//! - [`ClientOptions`] and an optional listener error hook

use crate::codec::{Codec, XdrCodec};
use crate::connection::{Connection, ErrorHook};
use crate::error::{ClientError, ListenerError, Result};
use crate::filter::{ElvinLanguage, FilterLanguage};
use crate::options::ClientOptions;
use crate::transport::{LocalRouter, Transport};
use crate::uri::ElvinUri;
use std::sync::Arc;

/// Opens connections
///
/// # Example
///
/// ```
/// use avis_client::{Client, LocalRouter};
/// use avis_types::Attributes;
///
/// let router = LocalRouter::new();
/// let consumer = Client::local(router.clone()).open("elvin://localhost").unwrap();
/// let producer = Client::local(router).open("elvin://localhost").unwrap();
///
/// let subscription = consumer.subscribe("require(Greeting)").unwrap();
///
/// let mut notification = Attributes::new();
/// notification.set_string("Greeting", "Hello World").unwrap();
/// producer.send(&notification).unwrap();
///
/// assert!(subscription.is_active());
/// consumer.close();
/// ```
pub struct Client {
    transport: Arc<dyn Transport>,
    codec: Arc<dyn Codec>,
    language: Arc<dyn FilterLanguage>,
    options: ClientOptions,
    error_hook: Option<ErrorHook>,
}

impl Client {
    /// Create a client using the Elvin XDR codec and subscription language
    pub fn new<T: Transport + 'static>(transport: T, options: ClientOptions) -> Self {
        Self {
            transport: Arc::new(transport),
            codec: Arc::new(XdrCodec::new(options.packet_max_length)),
            language: Arc::new(ElvinLanguage),
            options,
            error_hook: None,
        }
    }

    /// A client with its own private in-process router
    pub fn with_defaults() -> Self {
        Self::local(LocalRouter::new())
    }

    /// A client on a shared in-process router
    pub fn local(router: LocalRouter) -> Self {
        Self::new(router, ClientOptions::default())
    }

    pub fn with_codec<C: Codec + 'static>(mut self, codec: C) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn with_filter_language<L: FilterLanguage + 'static>(mut self, language: L) -> Self {
        self.language = Arc::new(language);
        self
    }

    /// Called for every listener failure on connections opened afterwards
    pub fn on_listener_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ListenerError) + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Open a connection to the router at `uri`
    pub fn open(&self, uri: &str) -> Result<Connection> {
        let uri = ElvinUri::parse(uri)?;
        self.open_uri(uri)
    }

    /// Open a connection to the configured `default_uri`
    pub fn open_default(&self) -> Result<Connection> {
        self.open(&self.options.default_uri)
    }

    pub fn open_uri(&self, uri: ElvinUri) -> Result<Connection> {
        let link = self
            .transport
            .connect(&uri)
            .map_err(|error| ClientError::Connect {
                uri: uri.to_string(),
                error,
            })?;

        tracing::info!("Connected to {}", uri.canonical());
        Ok(Connection::new(
            uri,
            link,
            Arc::clone(&self.codec),
            Arc::clone(&self.language),
            &self.options,
            self.error_hook.clone(),
        ))
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::with_defaults()
    }
}

//! Transport seam between a connection and its router
//!
//! A [`Transport`] opens [`TransportLink`]s from URIs. A link moves whole
//! frames: `transmit` hands one to the router, `receive_next` blocks until
//! the router delivers one. `disconnect` wakes any thread blocked in
//! `receive_next`, which then reports [`TransportError::Closed`].
//!
//! This module provides:
//! - `Transport` / `TransportLink`: the seam
//! - `LocalRouter`: an in-process router for tests and embedded use

mod local;

pub use local::LocalRouter;

use crate::error::TransportError;
use crate::uri::ElvinUri;
use bytes::Bytes;

/// A frame delivered by the router
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    pub frame: Bytes,
    /// Whether the frame arrived over a secure path end to end
    pub secure: bool,
}

/// One open link to a router
pub trait TransportLink: Send + Sync {
    fn transmit(&self, frame: Bytes) -> Result<(), TransportError>;

    /// Block until a frame arrives or the link closes
    fn receive_next(&self) -> Result<Received, TransportError>;

    /// Close the link. Idempotent.
    fn disconnect(&self);
}

/// Factory for links
pub trait Transport: Send + Sync {
    fn connect(&self, uri: &ElvinUri) -> Result<Box<dyn TransportLink>, TransportError>;
}

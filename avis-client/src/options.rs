//! Client options, loadable from YAML
//!
//! ```yaml
//! default_uri: elvin://router.example.com
//! receive_queue_max_length: 256
//! drop_policy: newest
//! packet_max_length: 1048576
//! listener_panic_policy: report
//! ```

use crate::error::OptionsError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MIN_PACKET_LENGTH: usize = 1024;
pub const MAX_PACKET_LENGTH: usize = 10 * 1024 * 1024;

/// What a router does with a new frame when a receive queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    /// Discard the oldest queued frame
    #[default]
    Oldest,
    /// Discard the incoming frame
    Newest,
    /// Fail the transmit with `QueueFull`
    Fail,
}

/// How the event loop treats a panicking listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanicPolicy {
    /// Report it like any listener error and keep dispatching
    #[default]
    Report,
    /// Report it, then resume unwinding out of the event loop
    Propagate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientOptions {
    #[serde(default = "default_uri")]
    pub default_uri: String,

    /// Per-link bound on undelivered frames; 0 is unbounded
    #[serde(default = "default_receive_queue_max_length")]
    pub receive_queue_max_length: usize,

    #[serde(default)]
    pub drop_policy: DropPolicy,

    #[serde(default = "default_packet_max_length")]
    pub packet_max_length: usize,

    #[serde(default)]
    pub listener_panic_policy: PanicPolicy,
}

fn default_uri() -> String {
    String::from("elvin://127.0.0.1")
}

fn default_receive_queue_max_length() -> usize {
    1024
}

fn default_packet_max_length() -> usize {
    2 * 1024 * 1024
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            default_uri: default_uri(),
            receive_queue_max_length: default_receive_queue_max_length(),
            drop_policy: DropPolicy::default(),
            packet_max_length: default_packet_max_length(),
            listener_panic_policy: PanicPolicy::default(),
        }
    }
}

impl ClientOptions {
    /// Load options from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, OptionsError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, OptionsError> {
        let options: ClientOptions = serde_yaml::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if !(MIN_PACKET_LENGTH..=MAX_PACKET_LENGTH).contains(&self.packet_max_length) {
            return Err(OptionsError::Invalid {
                name: "packet_max_length".to_string(),
                message: format!(
                    "{} is outside {}..={}",
                    self.packet_max_length, MIN_PACKET_LENGTH, MAX_PACKET_LENGTH
                ),
            });
        }
        Ok(())
    }
}

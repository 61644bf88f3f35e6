//! CLI command implementations.

pub mod attributes;
pub mod demo;
pub mod encode;
pub mod eval;
pub mod parse;
pub mod uri;

pub use demo::run_demo;
pub use encode::encode_notification;
pub use eval::eval_filter;
pub use parse::parse_filter;
pub use uri::show_uri;

use anyhow::{Context, Result};
use avis_client::ClientOptions;
use std::path::Path;

/// Options from `config` if given, else defaults, with `uri` overriding the
/// default router URI.
pub fn load_options(config: Option<&Path>, uri: Option<&str>) -> Result<ClientOptions> {
    let mut options = match config {
        Some(path) => ClientOptions::from_file(path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => ClientOptions::default(),
    };

    if let Some(uri) = uri {
        options.default_uri = uri.to_string();
    }
    Ok(options)
}

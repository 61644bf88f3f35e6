//! Inspect an Elvin URI.

use anyhow::{Context, Result};
use avis_client::ElvinUri;

pub fn show_uri(text: &str) -> Result<()> {
    let uri = ElvinUri::parse(text).context("Failed to parse URI")?;

    println!("canonical: {}", uri.canonical());
    println!("endpoint: {}", uri.endpoint());
    println!("secure: {}", uri.is_secure());
    for (name, value) in &uri.options {
        println!("option {}: {}", name, value);
    }
    Ok(())
}

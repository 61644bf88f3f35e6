//! Hex dump of an encoded notification.

use super::attributes::build_attributes;
use anyhow::Result;
use avis_client::{Codec, Message, XdrCodec};

/// Print the `NotifyEmit` frame, one 4-byte XDR word per group
pub fn encode_notification(args: &[String], secure_only: bool) -> Result<()> {
    let attributes = build_attributes(args)?;
    let frame = XdrCodec::default().encode_frame(&Message::NotifyEmit {
        attributes,
        deliver_insecure: !secure_only,
    })?;

    for (line, chunk) in frame.chunks(16).enumerate() {
        let words: Vec<String> = chunk.chunks(4).map(hex::encode).collect();
        println!("{:08x}  {}", line * 16, words.join(" "));
    }
    Ok(())
}

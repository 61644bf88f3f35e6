//! `name=type:value` notification arguments.

use anyhow::{anyhow, bail, Context, Result};
use avis_types::{Attributes, Value};

/// Parse one `name=type:value` argument
pub fn parse_attribute(arg: &str) -> Result<(String, Value)> {
    let (name, typed) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected name=type:value, got \"{}\"", arg))?;
    let (kind, text) = typed
        .split_once(':')
        .ok_or_else(|| anyhow!("Missing type in \"{}\"", arg))?;

    let value = match kind {
        "string" => Value::String(text.to_string()),
        "int32" => Value::Int32(text.parse().with_context(|| format!("Bad int32 for {}", name))?),
        "int64" => Value::Int64(text.parse().with_context(|| format!("Bad int64 for {}", name))?),
        "real64" => Value::Real64(parse_real(text).with_context(|| format!("Bad real64 for {}", name))?),
        "opaque" => Value::Opaque(hex::decode(text).with_context(|| format!("Bad hex for {}", name))?),
        other => bail!(
            "Unknown type \"{}\" for {} (expected string, int32, int64, real64 or opaque)",
            other,
            name
        ),
    };

    Ok((name.to_string(), value))
}

fn parse_real(text: &str) -> Result<f64, std::num::ParseFloatError> {
    match text {
        "NaN" | "nan" => Ok(f64::NAN),
        _ => text.parse(),
    }
}

/// Build a notification from command-line arguments, in order
pub fn build_attributes(args: &[String]) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    for arg in args {
        let (name, value) = parse_attribute(arg)?;
        attributes
            .set(name, value)
            .with_context(|| format!("Cannot set \"{}\"", arg))?;
    }
    Ok(attributes)
}

/// Opaque bytes as printable characters, escaping the rest
pub fn escape_opaque(bytes: &[u8]) -> String {
    bytes
        .iter()
        .flat_map(|byte| std::ascii::escape_default(*byte))
        .map(char::from)
        .collect()
}

/// One line per attribute: `name (type): value`
pub fn describe(name: &str, value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Int32(i) => i.to_string(),
        Value::Int64(i) => i.to_string(),
        Value::Real64(d) if d.is_nan() => "NaN".to_string(),
        Value::Real64(d) => d.to_string(),
        Value::Opaque(bytes) => escape_opaque(bytes),
    };
    format!("{} ({}): {}", name, value.kind(), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_each_type() {
        let args: Vec<String> = [
            "Greeting=string:Hello World",
            "Number=int32:42",
            "big=int64:400000000011",
            "real=real64:NaN",
            "Opaque=opaque:6461620001",
            "url=string:http://x:1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let attrs = build_attributes(&args).unwrap();
        assert_eq!(attrs.len(), 6);
        assert_eq!(attrs.get_string("Greeting").unwrap(), "Hello World");
        assert_eq!(attrs.get_int32("Number").unwrap(), 42);
        assert_eq!(attrs.get_int64("big").unwrap(), 400000000011);
        assert!(attrs.get_real64("real").unwrap().is_nan());
        assert_eq!(attrs.get_opaque("Opaque").unwrap(), &[0x64u8, 0x61, 0x62, 0, 1]);
        assert_eq!(attrs.get_string("url").unwrap(), "http://x:1");
    }

    #[test]
    fn test_bad_arguments() {
        assert!(parse_attribute("novalue").is_err());
        assert!(parse_attribute("n=42").is_err());
        assert!(parse_attribute("n=int8:1").is_err());
        assert!(parse_attribute("n=int32:x").is_err());
        assert!(parse_attribute("n=opaque:zz").is_err());
        assert!(build_attributes(&["=string:x".to_string()]).is_err());
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe("Opaque", &Value::Opaque(b"ab\0\x01".to_vec())),
            "Opaque (opaque): ab\\x00\\x01"
        );
        assert_eq!(describe("real", &Value::Real64(f64::NAN)), "real (real64): NaN");
        assert_eq!(describe("real2", &Value::Real64(2314.342413)), "real2 (real64): 2314.342413");
    }
}

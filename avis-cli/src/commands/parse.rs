//! Print the parsed form of a subscription expression.

use super::eval::compile;
use anyhow::Result;

pub fn parse_filter(expression: &str) -> Result<()> {
    let filter = compile(expression)?;
    println!("{}", filter);
    Ok(())
}

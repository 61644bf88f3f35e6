//! Evaluate a subscription expression against a notification.

use super::attributes::build_attributes;
use anyhow::{bail, Result};
use avis_filter::{ErrorContext, Filter};
use avis_types::Attributes;
use serde::Serialize;

#[derive(Serialize)]
struct Evaluation<'a> {
    matched: bool,
    /// `null` when the expression is undefined for this notification
    result: Option<bool>,
    attributes: &'a Attributes,
}

/// Compile `expression`, printing the error with a caret under the
/// offending span if it does not parse.
pub(crate) fn compile(expression: &str) -> Result<Filter> {
    match Filter::parse(expression) {
        Ok(filter) => Ok(filter),
        Err(error) => {
            eprint!("{}", ErrorContext::new(expression, &error));
            bail!("Invalid subscription expression");
        }
    }
}

pub fn eval_filter(expression: &str, args: &[String], json: bool) -> Result<()> {
    let filter = compile(expression)?;
    let attributes = build_attributes(args)?;
    let result = filter.evaluate(&attributes);
    tracing::debug!("{} evaluated to {:?}", filter, result);

    if json {
        let evaluation = Evaluation {
            matched: result == Some(true),
            result,
            attributes: &attributes,
        };
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else if result == Some(true) {
        println!("match");
    } else {
        println!("no match");
    }

    Ok(())
}

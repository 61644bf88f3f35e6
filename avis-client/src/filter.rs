//! Subscription language seam
//!
//! Connections compile subscription expressions through a
//! [`FilterLanguage`]. The default is the Elvin language from `avis-filter`.

use avis_filter::{Filter, FilterError};
use avis_types::Attributes;
use std::sync::Arc;

/// A compiled subscription expression
pub trait Predicate: Send + Sync {
    fn matches(&self, attributes: &Attributes) -> bool;
}

/// Compiles expression text into predicates
pub trait FilterLanguage: Send + Sync {
    fn compile(&self, expression: &str) -> Result<Arc<dyn Predicate>, FilterError>;
}

/// The Elvin subscription language
#[derive(Debug, Clone, Copy, Default)]
pub struct ElvinLanguage;

impl FilterLanguage for ElvinLanguage {
    fn compile(&self, expression: &str) -> Result<Arc<dyn Predicate>, FilterError> {
        Ok(Arc::new(Filter::parse(expression)?))
    }
}

impl Predicate for Filter {
    fn matches(&self, attributes: &Attributes) -> bool {
        Filter::matches(self, attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elvin_language() {
        let predicate = ElvinLanguage.compile("require(X)").unwrap();

        let mut attrs = Attributes::new();
        assert!(!predicate.matches(&attrs));
        attrs.set_int32("X", 1).unwrap();
        assert!(predicate.matches(&attrs));

        assert!(ElvinLanguage.compile("require(").is_err());
    }
}

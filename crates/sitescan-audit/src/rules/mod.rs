//! The default rule set, grouped by analyzer category.

pub mod content;
pub mod local;
pub mod technical;
pub mod ux;

use crate::rule::Rule;

/// Every rule shipped by default, in catalog order.
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    let mut rules: Vec<Box<dyn Rule>> = Vec::new();
    rules.extend(technical::rules());
    rules.extend(content::rules());
    rules.extend(local::rules());
    rules.extend(ux::rules());
    rules
}

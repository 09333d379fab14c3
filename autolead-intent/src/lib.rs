pub mod extractor;
pub mod interpretation;
pub mod rules;

pub use extractor::{extract_criteria, extract_with};
pub use interpretation::{describe_criteria, interpret_search, Clarification};
pub use rules::{get_default_rules, KeywordRule, RuleAction, RuleEngine};

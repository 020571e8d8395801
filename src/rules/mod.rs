//! Time-effective contribution rule resolution.
//!
//! This module owns the only place interval invariants are checked: rules
//! are validated as they enter a [`RuleBook`], and [`RuleBook::resolve`]
//! selects the single rule in force for a category, type and date.

mod resolver;

pub use resolver::{ResolvedRule, RuleBook};

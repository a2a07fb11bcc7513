//! Source composition and precedence.

mod merge_policy;
pub mod service;

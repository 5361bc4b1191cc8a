//! View-definition parsing and dependency inlining
//!
//! This crate handles:
//! - Locating balanced parentheses in free-form SQL text (quotes and comments aware)
//! - Reading the leading `WITH` chain of a view into named CTEs
//! - Parsing `CREATE [OR REPLACE] VIEW` statements and rendering them back
//! - Folding dependency views into a consumer as extra CTEs

pub mod error;
pub mod scanner;
pub mod cte;
pub mod view;
pub mod inline;
pub mod dependencies;

pub use error::{SqlError, Malformed, Result};
pub use scanner::{Scanner, Mode, QualifiedRef, find_matching_paren, find_keyword, qualified_references, code_mask};
pub use cte::{CteDefinition, read_subs};
pub use view::ViewDefinition;
pub use inline::inline;
pub use dependencies::DependencySet;

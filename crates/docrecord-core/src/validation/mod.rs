//! Rule-based document validation.
//!
//! Rules are declared per field on the entity (or overridden per document)
//! and evaluated in order by [`validate_document`]. A rule resolves its check
//! through the entity's validation methods, then the built-in [`library`],
//! then as a raw pattern.

mod errors;
pub mod library;
mod rule;
mod validator;

pub use errors::{ErrorEntry, ValidationErrors};
pub use rule::{RuleContext, RuleOutcome, RuleSpec, ValidationRule};
pub use validator::{validate_document, ValidateOptions};

//! Documents and their lifecycle hooks.

mod document;
mod hooks;

pub use document::{AssociationInfo, AssociationSlot, Document, DocumentId, DocumentState, Offset};
pub use hooks::{DocumentHooks, FinderOutcome, HookOutcome, NoHooks};

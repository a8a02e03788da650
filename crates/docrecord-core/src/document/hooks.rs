//! Lifecycle and finder hooks.

use docrecord_proto::{QueryDescriptor, Value};

use super::Document;
use crate::error::Error;
use crate::query::FindResult;
use crate::validation::{RuleOutcome, ValidateOptions};

/// Outcome of a `before_*` lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Let the operation proceed.
    Continue,
    /// Veto the operation; it reports `false` without raising an error.
    Cancel,
}

impl HookOutcome {
    /// Check if the operation was vetoed.
    pub fn is_cancel(&self) -> bool {
        matches!(self, HookOutcome::Cancel)
    }
}

/// Outcome of a finder's `find_before` phase.
#[derive(Debug, Clone, PartialEq)]
pub enum FinderOutcome {
    /// Run the (possibly extended) query.
    Continue(QueryDescriptor),
    /// The query must not run.
    Cancel,
}

/// Per-entity lifecycle hooks.
///
/// Every method has a no-op default that lets the operation proceed. Hooks
/// are installed on the [`EntityDef`](crate::catalog::EntityDef) and shared by
/// all documents of the type.
pub trait DocumentHooks: Send + Sync {
    /// Runs before validation rules. Returning `false` marks the document
    /// invalid without evaluating any rule.
    fn before_validate(&self, _doc: &mut Document, _options: &ValidateOptions) -> bool {
        true
    }

    /// Runs before a document is staged for persistence.
    fn before_save(&self, _doc: &mut Document, _is_update: bool) -> HookOutcome {
        HookOutcome::Continue
    }

    /// Runs after the write was committed.
    fn after_save(&self, _doc: &Document, _is_update: bool) {}

    /// Runs before a document is staged for removal.
    fn before_delete(&self, _doc: &mut Document) -> HookOutcome {
        HookOutcome::Continue
    }

    /// Runs after the removal was committed.
    fn after_delete(&self, _doc: &Document) {}

    /// Entity-specific validation method. `None` means the entity has no
    /// method of that name and the library is consulted next.
    fn validation_method(
        &self,
        _name: &str,
        _doc: &Document,
        _field: &str,
        _value: &Value,
        _params: &[Value],
    ) -> Option<RuleOutcome> {
        None
    }

    /// First phase of a hook finder: extend or cancel the query.
    fn find_before(&self, _finder: &str, query: QueryDescriptor) -> FinderOutcome {
        FinderOutcome::Continue(query)
    }

    /// Second phase of a hook finder: transform the executed result.
    fn find_after<'m>(&self, _finder: &str, result: FindResult<'m>) -> Result<FindResult<'m>, Error> {
        Ok(result)
    }
}

/// Hooks that permit every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl DocumentHooks for NoHooks {}

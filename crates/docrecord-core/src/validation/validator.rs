//! Rule evaluation for documents.

use std::sync::Arc;

use docrecord_proto::Value;
use tracing::{debug, warn};

use super::library;
use super::rule::{RuleContext, RuleOutcome, RuleSpec, ValidationRule};
use super::ValidationErrors;
use crate::catalog::EntityDef;
use crate::document::{AssociationSlot, Document, DocumentState};

/// Options for a `validates` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// When set, only rules for these fields (and associations with these
    /// aliases or field names) are evaluated.
    pub field_list: Option<Vec<String>>,
}

impl ValidateOptions {
    /// Validate every field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict validation to a whitelist of fields.
    pub fn with_field_list<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_list = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    fn includes(&self, name: &str) -> bool {
        self.field_list
            .as_ref()
            .map_or(true, |list| list.iter().any(|f| f == name))
    }
}

/// Validate a document and its loaded associations.
///
/// Errors are appended to the document's error map; errors recorded before
/// the call are kept. Returns `true` when the map is empty afterwards.
pub fn validate_document(doc: &mut Document, options: &ValidateOptions) -> bool {
    let def = Arc::clone(doc.definition());
    if !def.hooks().before_validate(doc, options) {
        debug!(entity = %def.name, "Validation vetoed by before_validate");
        return false;
    }

    let context = match doc.state() {
        DocumentState::Transient => RuleContext::Create,
        DocumentState::Managed | DocumentState::Removed => RuleContext::Update,
    };

    // Whitelisting works on a copy; the declared rules stay untouched.
    // Fields a projection left out keep their stored value on save.
    let mut rules = doc.rules().clone();
    rules.retain(|field, _| {
        options.includes(field)
            && !(doc.unloaded_fields().contains(field) && doc.field(field).is_none())
    });

    for (field, field_rules) in &rules {
        validate_field(doc, &def, field, field_rules, context);
    }

    validate_associations(doc, &def, options);

    doc.errors().is_empty()
}

fn validate_field(
    doc: &mut Document,
    def: &EntityDef,
    field: &str,
    rules: &[ValidationRule],
    context: RuleContext,
) {
    let value = doc.get(field);
    let unset = value.as_ref().map_or(true, Value::is_null);
    let empty = value
        .as_ref()
        .is_some_and(|v| !v.is_null() && v.is_empty() && !v.is_numeric());

    for rule in rules {
        if rule.on.is_some_and(|on| on != context) {
            continue;
        }

        let required_violation =
            (unset && rule.required == Some(true)) || (empty && rule.allow_empty == Some(false));
        if required_violation {
            doc.invalidate(field, rule.failure_message());
            if rule.last {
                break;
            }
            continue;
        }

        if rule.allow_empty == Some(true) && (unset || empty) {
            break;
        }

        let Some(value) = value.as_ref().filter(|v| !v.is_null()) else {
            continue;
        };

        match evaluate(def, doc, field, value, &rule.rule) {
            RuleOutcome::Valid => {}
            RuleOutcome::Invalid => {
                doc.invalidate(field, rule.failure_message());
                if rule.last {
                    break;
                }
            }
            RuleOutcome::Message(message) => {
                let message = if message.is_empty() {
                    rule.failure_message()
                } else {
                    message
                };
                doc.invalidate(field, message);
                if rule.last {
                    break;
                }
            }
        }
    }
}

fn evaluate(
    def: &EntityDef,
    doc: &Document,
    field: &str,
    value: &Value,
    spec: &RuleSpec,
) -> RuleOutcome {
    match spec {
        RuleSpec::Blank => RuleOutcome::Valid,
        RuleSpec::Named { name, params } => {
            if let Some(outcome) = def.hooks().validation_method(name, doc, field, value, params) {
                return outcome;
            }
            if let Some(validator) = library::lookup(name) {
                return validator(value, params).into();
            }
            warn!(
                entity = %def.name,
                field,
                rule = %name,
                "No validation handler matched, rule skipped"
            );
            RuleOutcome::Valid
        }
        RuleSpec::Pattern(pattern) => match library::cached_pattern(pattern) {
            Ok(re) => library::text(value)
                .is_some_and(|s| re.is_match(&s))
                .into(),
            Err(e) => {
                warn!(
                    entity = %def.name,
                    field,
                    pattern = %pattern,
                    error = %e,
                    "Invalid validation pattern, rule skipped"
                );
                RuleOutcome::Valid
            }
        },
    }
}

fn validate_associations(doc: &mut Document, def: &EntityDef, options: &ValidateOptions) {
    let child_options = ValidateOptions::default();

    for association in &def.associations {
        let alias = association.alias();
        if !options.includes(alias) && !options.includes(&association.field) {
            continue;
        }

        let mut single: Option<ValidationErrors> = None;
        let mut indexed: Vec<(usize, ValidationErrors)> = Vec::new();
        match doc.association_mut(&association.field) {
            Some(AssociationSlot::One(Some(child))) => {
                validate_document(child, &child_options);
                single = Some(child.errors().clone());
            }
            Some(AssociationSlot::Many(children)) => {
                for (index, child) in children.iter_mut().enumerate() {
                    validate_document(child, &child_options);
                    indexed.push((index, child.errors().clone()));
                }
            }
            _ => continue,
        }

        let errors = doc.errors_mut();
        errors.clear_field(alias);
        if let Some(child_errors) = single {
            errors.nest(alias, child_errors);
        }
        for (index, child_errors) in indexed {
            errors.nest_at(alias, index, child_errors);
        }
    }
}

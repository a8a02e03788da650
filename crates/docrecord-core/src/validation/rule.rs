//! Validation rule declarations.

use docrecord_proto::Value;

use super::library;

/// Lifecycle context a rule is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleContext {
    /// Only for documents that have not been persisted yet.
    Create,
    /// Only for documents already managed by the persistence engine.
    Update,
}

/// What a rule checks.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleSpec {
    /// No content check: only the required and allow-empty checks apply.
    Blank,
    /// A named validator with extra parameters, resolved against the
    /// entity's validation methods first and the built-in library second.
    Named { name: String, params: Vec<Value> },
    /// A regular expression the value's string form must match.
    Pattern(String),
}

/// Result of evaluating a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The value passes.
    Valid,
    /// The value fails; the rule's message is recorded.
    Invalid,
    /// The value fails with this message.
    Message(String),
}

impl From<bool> for RuleOutcome {
    fn from(valid: bool) -> Self {
        if valid {
            RuleOutcome::Valid
        } else {
            RuleOutcome::Invalid
        }
    }
}

impl RuleOutcome {
    /// Check if the outcome passes.
    pub fn is_valid(&self) -> bool {
        matches!(self, RuleOutcome::Valid)
    }
}

/// A validation rule attached to a field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRule {
    /// Optional rule key, used as the message when none is given.
    pub key: Option<String>,
    /// The check to run.
    pub rule: RuleSpec,
    /// Message recorded on failure.
    pub message: Option<String>,
    /// `Some(true)` fails when the value is unset.
    pub required: Option<bool>,
    /// `Some(false)` fails on an empty non-numeric value; `Some(true)` lets an
    /// empty value skip the field's remaining rules.
    pub allow_empty: Option<bool>,
    /// Stop evaluating this field's rules after a failure.
    pub last: bool,
    /// Restrict the rule to create or update.
    pub on: Option<RuleContext>,
}

impl Default for ValidationRule {
    fn default() -> Self {
        Self {
            key: None,
            rule: RuleSpec::Blank,
            message: None,
            required: None,
            allow_empty: None,
            last: true,
            on: None,
        }
    }
}

impl ValidationRule {
    /// Create a rule from a name or a delimited pattern (`/pattern/flags`,
    /// `#pattern#`, `{pattern}`).
    pub fn rule(rule: impl Into<String>) -> Self {
        let rule = rule.into();
        if library::split_delimited(&rule).is_some() {
            Self::pattern(rule)
        } else {
            Self::named(rule)
        }
    }

    /// Create a named rule without parameters.
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_params(name, Vec::new())
    }

    /// Create a named rule with parameters.
    pub fn with_params(name: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            rule: RuleSpec::Named {
                name: name.into(),
                params,
            },
            ..Default::default()
        }
    }

    /// Create a pattern rule.
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            rule: RuleSpec::Pattern(pattern.into()),
            ..Default::default()
        }
    }

    /// Create a rule that only requires the field to be set.
    pub fn required() -> Self {
        Self {
            required: Some(true),
            ..Default::default()
        }
    }

    /// Set the rule key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the failure message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the required flag.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Set the allow-empty flag.
    pub fn with_allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = Some(allow_empty);
        self
    }

    /// Set the last flag.
    pub fn with_last(mut self, last: bool) -> Self {
        self.last = last;
        self
    }

    /// Restrict the rule to a lifecycle context.
    pub fn on(mut self, context: RuleContext) -> Self {
        self.on = Some(context);
        self
    }

    /// Message recorded when this rule fails without a custom message.
    pub fn failure_message(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        if let Some(key) = &self.key {
            return key.clone();
        }
        match &self.rule {
            RuleSpec::Named { name, .. } => name.clone(),
            RuleSpec::Blank | RuleSpec::Pattern(_) => "This field cannot be left blank".to_string(),
        }
    }
}

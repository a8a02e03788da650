//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docrecord_core::catalog::{
    AssociationDef, Catalog, CollectionStrategy, EntityDef, FieldDef, ScalarType,
};
use docrecord_core::document::{Document, DocumentHooks, FinderOutcome, HookOutcome};
use docrecord_core::manager::{DocumentManager, ManagerConfig};
use docrecord_core::query::{FinderScope, QueryOptions};
use docrecord_core::storage::{SledStore, StorageConfig};
use docrecord_core::validation::{RuleContext, RuleOutcome, ValidateOptions, ValidationRule};
use docrecord_proto::{FilterExpr, OrderSpec, QueryDescriptor, Value};

pub struct TestContext {
    pub manager: DocumentManager,
    pub saved: Arc<AtomicUsize>,
    pub deleted: Arc<AtomicUsize>,
    _storage_dir: tempfile::TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let storage_dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(StorageConfig::new(storage_dir.path())).unwrap();

        let saved = Arc::new(AtomicUsize::new(0));
        let deleted = Arc::new(AtomicUsize::new(0));
        let catalog = fixture_catalog(Arc::clone(&saved), Arc::clone(&deleted));

        let manager = DocumentManager::with_store(
            Arc::new(catalog),
            Arc::new(store),
            ManagerConfig::default().with_log_queries(true),
        );

        Self {
            manager,
            saved,
            deleted,
            _storage_dir: storage_dir,
        }
    }

    /// Save a user with a username and salary.
    pub fn user(&self, username: &str, salary: f64) -> Document {
        let mut doc = self.manager.create("User").unwrap();
        let data = Value::object([
            ("username", Value::from(username)),
            ("salary", Value::from(salary)),
        ]);
        assert!(self.manager.save(&mut doc, Some(&data), true).unwrap());
        doc
    }

    pub fn saved(&self) -> usize {
        self.saved.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> usize {
        self.deleted.load(Ordering::SeqCst)
    }
}

pub struct UserHooks {
    saved: Arc<AtomicUsize>,
    deleted: Arc<AtomicUsize>,
}

impl DocumentHooks for UserHooks {
    fn before_validate(&self, doc: &mut Document, _options: &ValidateOptions) -> bool {
        if doc.field("username").and_then(Value::as_str) == Some("thisshouldnotvalidate") {
            doc.invalidate("username", "This username is reserved");
            return false;
        }
        true
    }

    fn before_save(&self, doc: &mut Document, is_update: bool) -> HookOutcome {
        match doc.field("username").and_then(Value::as_str) {
            Some("jose sucks") if is_update => HookOutcome::Cancel,
            Some("jose rules") => {
                doc.set_field("username", "jose rules, it is true");
                HookOutcome::Continue
            }
            _ => HookOutcome::Continue,
        }
    }

    fn after_save(&self, _doc: &Document, _is_update: bool) {
        self.saved.fetch_add(1, Ordering::SeqCst);
    }

    fn before_delete(&self, doc: &mut Document) -> HookOutcome {
        if doc.field("username").and_then(Value::as_str) == Some("undeletable") {
            return HookOutcome::Cancel;
        }
        HookOutcome::Continue
    }

    fn after_delete(&self, _doc: &Document) {
        self.deleted.fetch_add(1, Ordering::SeqCst);
    }

    fn find_before(&self, finder: &str, query: QueryDescriptor) -> FinderOutcome {
        match finder {
            "topPaid" => {
                let limit = query.args.first().and_then(Value::as_i64);
                let mut query = query
                    .with_filter(FilterExpr::gt("salary", 100))
                    .with_order(OrderSpec::desc("salary"));
                if let Some(limit) = limit.and_then(|l| u32::try_from(l).ok()) {
                    query.pagination.limit = Some(limit);
                }
                FinderOutcome::Continue(query)
            }
            "nobody" => FinderOutcome::Cancel,
            _ => FinderOutcome::Continue(query),
        }
    }
}

pub struct PhonenumberHooks;

impl DocumentHooks for PhonenumberHooks {
    fn validation_method(
        &self,
        name: &str,
        _doc: &Document,
        _field: &str,
        value: &Value,
        _params: &[Value],
    ) -> Option<RuleOutcome> {
        match name {
            "shouldNotStartWith00" => Some(match value.as_str() {
                Some(number) if number.starts_with("00") => {
                    RuleOutcome::Message("Phone number cannot start with 00".to_string())
                }
                _ => RuleOutcome::Valid,
            }),
            _ => None,
        }
    }
}

pub struct AccountHooks;

impl DocumentHooks for AccountHooks {
    fn before_save(&self, doc: &mut Document, _is_update: bool) -> HookOutcome {
        if doc.field("name").and_then(Value::as_str) == Some("frozen") {
            return HookOutcome::Cancel;
        }
        HookOutcome::Continue
    }
}

pub fn fixture_catalog(saved: Arc<AtomicUsize>, deleted: Arc<AtomicUsize>) -> Catalog {
    let catalog = Catalog::new();

    catalog
        .register(
            EntityDef::new("Address")
                .with_field(FieldDef::scalar("street", ScalarType::String))
                .with_field(FieldDef::scalar("city", ScalarType::String))
                .with_field(FieldDef::scalar("state", ScalarType::String)),
        )
        .unwrap();

    catalog
        .register(
            EntityDef::new("Phonenumber")
                .with_field(FieldDef::scalar("phonenumber", ScalarType::String))
                .with_rule("phonenumber", ValidationRule::rule("notEmpty"))
                .with_rule("phonenumber", ValidationRule::rule("shouldNotStartWith00"))
                .with_hooks(PhonenumberHooks),
        )
        .unwrap();

    catalog
        .register(
            EntityDef::new("Account")
                .with_field(FieldDef::scalar("name", ScalarType::String))
                .with_field(FieldDef::scalar("balance", ScalarType::Float64).with_default(0.0))
                .with_rule(
                    "name",
                    ValidationRule::required().with_message("An account needs a name"),
                )
                .with_hooks(AccountHooks),
        )
        .unwrap();

    catalog
        .register(
            EntityDef::new("User")
                .with_field(FieldDef::scalar("username", ScalarType::String))
                .with_field(FieldDef::scalar("password", ScalarType::String))
                .with_field(FieldDef::scalar("salary", ScalarType::Float64))
                .with_field(FieldDef::optional_scalar("created", ScalarType::Timestamp))
                .with_field(FieldDef::optional_scalar("modified", ScalarType::Timestamp))
                .with_association(AssociationDef::embed_one("address", "Address"))
                .with_association(
                    AssociationDef::embed_many("phonenumbers", "Phonenumber")
                        .with_alias("PhoneNumber")
                        .with_strategy(CollectionStrategy::Set),
                )
                .with_association(AssociationDef::reference_many("accounts", "Account"))
                .with_rule("username", ValidationRule::rule("notEmpty"))
                .with_rule(
                    "username",
                    ValidationRule::pattern("/^[a-z]/").on(RuleContext::Update),
                )
                .with_rule(
                    "password",
                    ValidationRule::with_params("between", vec![Value::from(6), Value::from(100)])
                        .with_allow_empty(true),
                )
                .with_setter("password", |doc, value| {
                    let value = match value {
                        Value::String(s) => Value::from(s.trim()),
                        other => other,
                    };
                    doc.set_field("password", value);
                })
                .with_finder("topPaid", FinderScope::Hook)
                .with_finder("nobody", FinderScope::Hook)
                .with_finder(
                    "lesserPaid",
                    FinderScope::Options(
                        QueryOptions::new()
                            .condition("salary <", 102)
                            .order("salary", "asc"),
                    ),
                )
                .with_hooks(UserHooks { saved, deleted }),
        )
        .unwrap();

    catalog
}

//! Integration tests for finders, cursors and pagination.

mod common;

use std::sync::Arc;

use common::TestContext;
use docrecord_core::catalog::{Catalog, EntityDef, FieldDef, ScalarType};
use docrecord_core::connection::ConnectionManager;
use docrecord_core::manager::ManagerConfig;
use docrecord_core::paginate::{PageRequest, Paginator, PaginatorConfig};
use docrecord_core::query::{FindResult, QueryOptions, FIND_ALL, FIND_FIRST};
use docrecord_core::Error;
use docrecord_proto::{FilterExpr, OrderDirection, OrderSpec, Value};

fn seed(ctx: &TestContext) {
    for (username, salary) in [
        ("alice", 90.0),
        ("bob", 101.0),
        ("carol", 150.0),
        ("dave", 120.0),
        ("erin", 101.5),
    ] {
        ctx.user(username, salary);
    }
}

fn usernames(docs: &[docrecord_core::Document]) -> Vec<String> {
    docs.iter()
        .filter_map(|d| d.field("username").and_then(Value::as_str).map(str::to_string))
        .collect()
}

#[test]
fn test_condition_limit_page() {
    let ctx = TestContext::new();
    seed(&ctx);

    let options = QueryOptions::new()
        .condition("salary >", 100)
        .order("salary", "asc")
        .limit(2)
        .page(2);
    let mut cursor = ctx
        .manager
        .find("User", FIND_ALL, options)
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap();

    assert_eq!(cursor.query().filters, vec![FilterExpr::gt("salary", 100)]);
    assert_eq!(cursor.query().pagination.skip, Some(2));
    assert_eq!(usernames(&cursor.to_vec().unwrap()), vec!["dave", "carol"]);
    assert_eq!(cursor.count(false).unwrap(), 2);
    assert_eq!(cursor.count(true).unwrap(), 4);
}

#[test]
fn test_membership_conditions() {
    let ctx = TestContext::new();
    seed(&ctx);

    let in_list = QueryOptions::new()
        .condition("username", Value::array(["alice", "bob"]))
        .order("username", "asc");
    let mut cursor = ctx
        .manager
        .find("User", FIND_ALL, in_list)
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap();
    assert_eq!(
        cursor.query().filters,
        vec![FilterExpr::in_values("username", vec![Value::from("alice"), Value::from("bob")])]
    );
    assert_eq!(usernames(&cursor.to_vec().unwrap()), vec!["alice", "bob"]);

    let not_in = QueryOptions::new().condition("username !=", Value::array(["alice", "bob"]));
    let mut cursor = ctx
        .manager
        .find("User", FIND_ALL, not_in)
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap();
    assert_eq!(cursor.count(true).unwrap(), 3);
}

#[test]
fn test_between_and_prefixed_field() {
    let ctx = TestContext::new();
    seed(&ctx);

    let options = QueryOptions::new()
        .condition("User.salary between", Value::array([100, 121]))
        .order("salary", "desc");
    let docs = ctx
        .manager
        .find("User", FIND_ALL, options)
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap()
        .into_vec()
        .unwrap();
    assert_eq!(usernames(&docs), vec!["dave", "erin", "bob"]);
}

#[test]
fn test_hook_finder() {
    let ctx = TestContext::new();
    seed(&ctx);

    let docs = ctx
        .manager
        .find("User", "topPaid", QueryOptions::new().arg(1))
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap()
        .into_vec()
        .unwrap();
    assert_eq!(usernames(&docs), vec!["carol"]);

    let all = ctx
        .manager
        .find("User", "topPaid", QueryOptions::new())
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap()
        .into_vec()
        .unwrap();
    assert_eq!(usernames(&all), vec!["carol", "dave", "erin", "bob"]);

    assert!(ctx
        .manager
        .find("User", "nobody", QueryOptions::new())
        .unwrap()
        .is_none());
}

#[test]
fn test_options_finder() {
    let ctx = TestContext::new();
    seed(&ctx);

    let docs = ctx
        .manager
        .find("User", "lesserPaid", QueryOptions::new())
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap()
        .into_vec()
        .unwrap();
    assert_eq!(usernames(&docs), vec!["alice", "bob", "erin"]);
}

#[test]
fn test_unknown_finder_and_entity() {
    let ctx = TestContext::new();
    assert!(matches!(
        ctx.manager.find("User", "richest", QueryOptions::new()),
        Err(Error::UnknownFinder { .. })
    ));
    assert!(matches!(
        ctx.manager.find("Invoice", FIND_ALL, QueryOptions::new()),
        Err(Error::UnknownEntity(_))
    ));
}

#[test]
fn test_first_finder() {
    let ctx = TestContext::new();
    seed(&ctx);

    let result = ctx
        .manager
        .find("User", FIND_FIRST, QueryOptions::new().order("salary", "desc"))
        .unwrap()
        .unwrap();
    let FindResult::One(Some(doc)) = result else {
        panic!("expected a single document");
    };
    assert_eq!(doc.field("username"), Some(&Value::from("carol")));

    let none = ctx
        .manager
        .find("User", FIND_FIRST, QueryOptions::new().condition("username", "zed"))
        .unwrap()
        .unwrap()
        .into_document();
    assert!(none.is_none());
}

#[test]
fn test_cursor_is_lazy_and_refreshes() {
    let ctx = TestContext::new();
    seed(&ctx);
    ctx.manager.query_log(true);

    let mut cursor = ctx
        .manager
        .find("User", FIND_ALL, QueryOptions::new())
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap();
    assert!(cursor.is_dirty());
    assert!(ctx.manager.query_log(false).is_empty());

    assert_eq!(cursor.count(false).unwrap(), 5);
    assert_eq!(cursor.count(false).unwrap(), 5);
    assert_eq!(ctx.manager.query_log(false).len(), 1);

    cursor.sort("salary", OrderDirection::Desc).limit(2);
    assert!(cursor.is_dirty());
    assert_eq!(usernames(&cursor.to_vec().unwrap()), vec!["carol", "dave"]);
    assert_eq!(cursor.count(true).unwrap(), 5);
    assert_eq!(ctx.manager.query_log(true).len(), 2);
}

#[test]
fn test_cursor_projection_and_single_result() {
    let ctx = TestContext::new();
    seed(&ctx);

    let mut cursor = ctx
        .manager
        .find("User", FIND_ALL, QueryOptions::new())
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap();
    cursor.field_eq("username", "bob").select("username");

    let doc = cursor.single_result().unwrap().unwrap();
    assert_eq!(doc.field("username"), Some(&Value::from("bob")));
    assert!(doc.field("salary").is_none());
    assert_eq!(cursor.query().pagination.limit, Some(1));

    cursor.field_eq("username", "nobody");
    assert!(cursor.single_result().unwrap().is_none());
}

#[test]
fn test_mod_condition_on_extreme_values() {
    let ctx = TestContext::new();
    seed(&ctx);
    let mut extreme = ctx.manager.create("User").unwrap();
    extreme.set_field("username", "min");
    extreme.set_field("n", Value::Int64(i64::MIN));
    assert!(ctx.manager.save(&mut extreme, None, true).unwrap());

    let mut cursor = ctx
        .manager
        .find(
            "User",
            FIND_ALL,
            QueryOptions::new().condition("n mod", Value::array([-1, 0])),
        )
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap();
    assert_eq!(cursor.count(true).unwrap(), 1);

    cursor.filter(FilterExpr::modulo("n", 0, 0));
    assert_eq!(cursor.count(true).unwrap(), 0);
}

#[test]
fn test_cursor_compound_predicates() {
    let ctx = TestContext::new();
    seed(&ctx);
    let mut jose = ctx.manager.create("User").unwrap();
    let data = Value::object([
        ("username", Value::from("jose")),
        ("salary", Value::from(80.0)),
        (
            "PhoneNumber",
            Value::array([Value::object([("phonenumber", "555-1234")])]),
        ),
    ]);
    assert!(ctx.manager.save(&mut jose, Some(&data), true).unwrap());

    let all = || {
        ctx.manager
            .find("User", FIND_ALL, QueryOptions::new().order("username", "asc"))
            .unwrap()
            .unwrap()
            .into_cursor()
            .unwrap()
    };

    let mut cursor = all();
    cursor
        .add_or(FilterExpr::eq("username", "alice"))
        .add_or(FilterExpr::gt("salary", 140));
    assert_eq!(cursor.query().filters.len(), 1);
    assert_eq!(usernames(&cursor.to_vec().unwrap()), vec!["alice", "carol"]);

    let mut cursor = all();
    cursor.not(FilterExpr::lt("salary", 101));
    assert_eq!(usernames(&cursor.to_vec().unwrap()), vec!["bob", "carol", "dave", "erin"]);

    let mut cursor = all();
    cursor.elem_match("phonenumbers", vec![FilterExpr::eq("phonenumber", "555-1234")]);
    assert_eq!(usernames(&cursor.to_vec().unwrap()), vec!["jose"]);

    let mut cursor = all();
    cursor.exists("created", true).exists("password", false);
    assert_eq!(cursor.count(true).unwrap(), 6);

    let mut cursor = all();
    cursor.field_eq("username", "bob").exclude("salary");
    let docs = cursor.to_vec().unwrap();
    assert_eq!(docs[0].field("username"), Some(&Value::from("bob")));
    assert!(docs[0].field("salary").is_none());
    assert!(docs[0].is_partial());
}

#[test]
fn test_references_and_dotted_paths() {
    let ctx = TestContext::new();
    let mut user = ctx.manager.create("User").unwrap();
    let data = Value::object([
        ("username", Value::from("jose")),
        ("Address", Value::object([("city", "Los Angeles")])),
        ("Account", Value::array([Value::object([("name", "savings")])])),
    ]);
    ctx.manager.set(&mut user, &data, true).unwrap();
    assert!(ctx.manager.save(&mut user, None, true).unwrap());
    ctx.user("pepe", 10.0);

    let account = ctx
        .manager
        .find("Account", FIND_FIRST, QueryOptions::new())
        .unwrap()
        .unwrap()
        .into_document()
        .unwrap();

    let mut cursor = ctx
        .manager
        .find("User", FIND_ALL, QueryOptions::new())
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap();
    cursor.references("accounts", &account);
    assert_eq!(usernames(&cursor.to_vec().unwrap()), vec!["jose"]);

    let docs = ctx
        .manager
        .find(
            "User",
            FIND_ALL,
            QueryOptions::new().condition("address.city", "Los Angeles"),
        )
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap()
        .into_vec()
        .unwrap();
    assert_eq!(usernames(&docs), vec!["jose"]);
}

#[test]
fn test_descriptor_source() {
    let ctx = TestContext::new();
    seed(&ctx);

    let descriptor = docrecord_proto::QueryDescriptor::new("User")
        .with_filter(FilterExpr::lt("salary", 100))
        .with_order(OrderSpec::asc("username"));
    let docs = ctx
        .manager
        .find("User", FIND_ALL, descriptor)
        .unwrap()
        .unwrap()
        .into_cursor()
        .unwrap()
        .into_vec()
        .unwrap();
    assert_eq!(usernames(&docs), vec!["alice"]);
}

#[test]
fn test_paginator() {
    let ctx = TestContext::new();
    seed(&ctx);

    let paginator = Paginator::new(PaginatorConfig::default().with_limit(2).with_order("salary", "asc"));
    let mut page = paginator
        .paginate(&ctx.manager, "User", &PageRequest::new().page(3), &[])
        .unwrap();

    assert_eq!(page.paging.page, 3);
    assert_eq!(page.paging.current, 1);
    assert_eq!(page.paging.count, 5);
    assert!(page.paging.prev_page);
    assert!(!page.paging.next_page);
    assert_eq!(page.paging.page_count, 3);
    assert_eq!(page.paging.limit, 2);
    assert_eq!(page.paging.order, Some(OrderSpec::asc("salary")));
    assert_eq!(usernames(&page.cursor.to_vec().unwrap()), vec!["carol"]);
}

#[test]
fn test_paginator_request_handling() {
    let ctx = TestContext::new();
    seed(&ctx);

    let paginator = Paginator::new(PaginatorConfig::default().with_max_limit(3));
    let request = PageRequest::new()
        .page(-4)
        .limit(50)
        .sort("salary", "sideways")
        .scope("salary >", 100);
    let page = paginator
        .paginate(&ctx.manager, "User", &request, &["username"])
        .unwrap();

    assert_eq!(page.paging.page, 1);
    assert_eq!(page.paging.limit, 3);
    assert_eq!(page.paging.order, None);
    assert_eq!(page.paging.count, 4);
    assert_eq!(page.paging.current, 3);
    assert!(page.paging.next_page);
    assert!(!page.paging.prev_page);

    let request = PageRequest::new().sort("salary", "sideways");
    let page = paginator
        .paginate(&ctx.manager, "User", &request, &[])
        .unwrap();
    assert_eq!(page.paging.order, Some(OrderSpec::asc("salary")));
}

#[test]
fn test_connection_manager_routes_entities() {
    let catalog = Arc::new(Catalog::new());
    let note = catalog
        .register(
            EntityDef::new("Note")
                .with_field(FieldDef::scalar("body", ScalarType::String))
                .with_db_config("notes"),
        )
        .unwrap();

    let connections = ConnectionManager::new();
    assert!(matches!(connections.manager_for(&note), Err(Error::Configuration(_))));

    connections
        .open("notes", Arc::clone(&catalog), ManagerConfig::temporary())
        .unwrap();
    let manager = connections.manager_for(&note).unwrap();

    let mut doc = manager.create("Note").unwrap();
    let data = Value::object([("body", "hello")]);
    assert!(manager.save(&mut doc, Some(&data), true).unwrap());
    assert!(manager.find_by_id("Note", doc.id().unwrap()).unwrap().is_some());
}

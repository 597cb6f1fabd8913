#![allow(missing_docs)]

use cypherkit::query::{CreateBuilder, Criteria, OrderSpec, ParamStyle};
use cypherkit::{BuildError, MatchStep, QueryBuilder};
use serde_json::json;

fn friends_of_friends() -> QueryBuilder {
    QueryBuilder::new().match_json(&json!([
        { "type": "node", "ref": "a", "labels": ["users"] },
        { "type": "rel", "ref": "r", "labels": ["KNOWS"], "direction": "out" },
        { "type": "node", "ref": "b" }
    ]))
}

#[test]
fn json_chain_with_scoped_criteria_order_and_limit() {
    let built = friends_of_friends()
        .where_json(&json!({ "a": { "name": "x" }, "b": { "age": { ">": 1 } } }))
        .returns(["a", "b"])
        .orders([OrderSpec::asc("b", "name"), OrderSpec::desc("b", "age")])
        .limit_json(&json!("5"))
        .to_query()
        .unwrap();
    assert_eq!(
        built.query,
        "MATCH (a:users)-[r:KNOWS]->(b)\n\
         WHERE (a.name = {a_name} AND b.age > {b_age})\n\
         RETURN a, b\n\
         ORDER BY b.name, b.age DESC\n\
         LIMIT 5"
    );
    assert_eq!(built.params["a_name"], json!("x"));
    assert_eq!(built.params["b_age"], json!(1));
    assert_eq!(built.params.len(), 2);
}

#[test]
fn typed_predicates() {
    let built = QueryBuilder::new()
        .r#match(MatchStep::node().with_ref("u").label("users"))
        .where_ref("u", |p| {
            p.ge("age", 18)
                .any(|p| {
                    p.eq("role", "admin").not_exists("banned");
                })
                .in_list("tag", ["a", "b"]);
        })
        .to_query()
        .unwrap();
    assert_eq!(
        built.query,
        "MATCH (u:users)\n\
         WHERE (u.age >= {u_age} AND (u.role = {u_role} OR NOT EXISTS(u.banned)) AND u.tag IN {u_tag})\n\
         RETURN u"
    );
    assert_eq!(built.params["u_tag"], json!(["a", "b"]));
    assert!(!built.params.contains_key("u_banned"));
}

#[test]
fn explicit_criteria_values_are_classified_once() {
    let criteria = Criteria::parse(&json!({ "or": [ { "name": "a" }, { "name": "b" } ] }), &[]).unwrap();
    let built = QueryBuilder::new()
        .r#match(MatchStep::node().label("users"))
        .filter(&criteria)
        .to_query()
        .unwrap();
    assert_eq!(
        built.query,
        "MATCH (n:users)\nWHERE (n.name = {n_name} OR n.name = {n_name_1})\nRETURN n"
    );
}

#[test]
fn rendering_is_deterministic() {
    let build = || {
        friends_of_friends()
            .where_json(&json!({ "zeta": 1, "alpha": 2, "mid": { "<>": 3 } }))
            .returns(["b"])
            .to_query()
            .unwrap()
    };
    let first = build();
    let second = build();
    assert_eq!(first, second);
    assert_eq!(
        first.query,
        "MATCH (a:users)-[r:KNOWS]->(b)\n\
         WHERE (a.alpha = {a_alpha} AND a.mid <> {a_mid} AND a.zeta = {a_zeta})\n\
         RETURN b"
    );
}

#[test]
fn reference_errors() {
    let err = friends_of_friends().returns(["c"]).to_query().unwrap_err();
    assert_eq!(err, BuildError::ReturnNotRef { alias: "c".into() });

    let err = friends_of_friends().to_query().unwrap_err();
    assert_eq!(err.code(), "E_MISSING_CLAUSE_RETURN");

    let err = friends_of_friends()
        .returns(["a"])
        .order(OrderSpec::asc("c", "name"))
        .to_query()
        .unwrap_err();
    assert_eq!(err.code(), "E_ORDER_NOT_REF");

    let err = friends_of_friends()
        .where_scoped("c", &json!({ "name": "x" }))
        .returns(["a"])
        .to_query()
        .unwrap_err();
    assert_eq!(err.code(), "E_UNKNOWN_REF");
}

#[test]
fn malformed_json_steps() {
    let err = QueryBuilder::new()
        .match_json(&json!({ "ref": "a" }))
        .to_query()
        .unwrap_err();
    assert_eq!(err, BuildError::MissingType);

    let err = QueryBuilder::new()
        .match_json(&json!([
            { "type": "node" },
            { "type": "rel", "direction": "sideways" },
            { "type": "node" }
        ]))
        .to_query()
        .unwrap_err();
    assert_eq!(err.code(), "E_INVALID_KEY_DIRECTION");
}

#[test]
fn create_with_dollar_placeholders() {
    let built = CreateBuilder::new(Some("dogs"))
        .with_param_style(ParamStyle::Dollar)
        .one(json!({ "name": "fido" }).as_object().unwrap())
        .unwrap();
    assert_eq!(built.query, "CREATE (n:dogs { name: $n_name })\nRETURN n");
    assert_eq!(built.params["n_name"], json!("fido"));
}

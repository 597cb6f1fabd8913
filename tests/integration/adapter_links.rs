#![allow(missing_docs)]

mod support;

use cypherkit::{LinkUpdate, RawEntity, Traversal};
use serde_json::json;
use support::{adapter, props, row, CONN};

fn friends(rel_type: &str) -> Traversal {
    Traversal::new(rel_type)
        .with_predecessor(Some("users"), json!({ "name": "a" }))
        .with_successor(Some("users"), json!({ "name": "b" }))
}

#[tokio::test]
async fn link_merges_and_stamps_last_seen() {
    let (adapter, connector) = adapter();
    connector.executor.push_rows(vec![row(
        "n",
        RawEntity::relationship(40, "CONNECTED_TO", 1, 2, props(json!({}))),
    )]);
    connector.executor.push_rows(vec![row(
        "n",
        RawEntity::relationship(40, "CONNECTED_TO", 1, 2, props(json!({ "lastSeen": 1700 }))),
    )]);

    let first = adapter.link(CONN, &friends("CONNECTED_TO")).await.unwrap();
    let second = adapter.link(CONN, &friends("CONNECTED_TO")).await.unwrap();
    assert_eq!(first[0].identity, second[0].identity);
    assert!(first[0].get("lastSeen").is_none());
    assert_eq!(second[0].get("lastSeen"), Some(&json!(1700)));
    assert_eq!(second[0].rel_type.as_deref(), Some("CONNECTED_TO"));
    assert_eq!((second[0].start, second[0].end), (Some(1), Some(2)));

    let sent = connector.executor.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, sent[1].0);
    assert_eq!(
        sent[0].0,
        "MATCH (a:users), (b:users)\n\
         WHERE (a.name = {pred_name} AND b.name = {succ_name})\n\
         MERGE (a)-[n:CONNECTED_TO]->(b)\n\
         ON MATCH SET n.lastSeen = timestamp()\n\
         RETURN n"
    );
    assert_eq!(sent[0].1["pred_name"], json!("a"));
    assert_eq!(sent[0].1["succ_name"], json!("b"));
}

#[tokio::test]
async fn link_carries_relationship_properties() {
    let (adapter, connector) = adapter();
    let t = friends("KNOWS").with_rel_props(props(json!({ "since": 2001 })));
    adapter.link(CONN, &t).await.unwrap();

    let (query, params) = connector.executor.last();
    assert!(query.contains("MERGE (a)-[n:KNOWS { since: {rel_since} }]->(b)"));
    assert_eq!(params["rel_since"], json!(2001));
}

#[tokio::test]
async fn link_and_unlink_require_a_type() {
    let (adapter, connector) = adapter();
    let untyped = Traversal::default().with_predecessor(None, json!({ "name": "a" }));
    for err in [
        adapter.link(CONN, &untyped).await.unwrap_err(),
        adapter.unlink(CONN, &untyped).await.unwrap_err(),
    ] {
        assert_eq!(err.code(), Some("E_MISSING_LINK_TYPE"));
    }
    assert_eq!(connector.executor.sent_count(), 0);
}

#[tokio::test]
async fn unlink_with_no_match_is_empty() {
    let (adapter, connector) = adapter();
    let removed = adapter.unlink(CONN, &friends("KNOWS")).await.unwrap();
    assert!(removed.is_empty());

    let (query, _) = connector.executor.last();
    assert_eq!(
        query,
        "MATCH (a:users)-[r:KNOWS]-(b:users)\n\
         WHERE (a.name = {pred_name} AND b.name = {succ_name})\n\
         DELETE r\n\
         RETURN b"
    );
}

#[tokio::test]
async fn traversal_directions() {
    let (adapter, connector) = adapter();
    let t = Traversal::new("KNOWS").with_predecessor(Some("users"), json!({ "name": "a" }));

    adapter.get_out_nodes(CONN, &t).await.unwrap();
    assert_eq!(
        connector.executor.last().0,
        "MATCH (a:users)-[r:KNOWS]->(b)\nWHERE (a.name = {pred_name})\nRETURN b"
    );

    adapter.get_in_nodes(CONN, &t).await.unwrap();
    assert_eq!(
        connector.executor.last().0,
        "MATCH (a:users)<-[r:KNOWS]-(b)\nWHERE (a.name = {pred_name})\nRETURN b"
    );

    adapter.get_related_nodes(CONN, &t).await.unwrap();
    assert_eq!(
        connector.executor.last().0,
        "MATCH (a:users)-[r:KNOWS]-(b)\nWHERE (a.name = {pred_name})\nRETURN b"
    );

    adapter.get_out_links(CONN, &t).await.unwrap();
    assert_eq!(
        connector.executor.last().0,
        "MATCH (a:users)-[r:KNOWS]->(b)\nWHERE (a.name = {pred_name})\nRETURN r"
    );

    adapter.get_in_links(CONN, &t).await.unwrap();
    assert_eq!(
        connector.executor.last().0,
        "MATCH (a:users)<-[r:KNOWS]-(b)\nWHERE (a.name = {pred_name})\nRETURN r"
    );

    adapter.get_links(CONN, &t).await.unwrap();
    assert_eq!(
        connector.executor.last().0,
        "MATCH (a:users)-[r:KNOWS]-(b)\nWHERE (a.name = {pred_name})\nRETURN r"
    );
}

#[tokio::test]
async fn successor_criteria_and_sort() {
    let (adapter, connector) = adapter();
    connector.executor.push_rows(vec![
        row("b", RawEntity::node(2, ["users"], props(json!({ "name": "z", "age": 3 })))),
        row("b", RawEntity::node(3, ["users"], props(json!({ "name": "y", "age": 3 })))),
    ]);
    let t = Traversal::new("KNOWS")
        .with_predecessor(Some("users"), json!({ "name": "a" }))
        .with_successor(Some("users"), json!({ "age": 3, "sort": { "name": "desc" } }));

    let nodes = adapter.get_out_nodes(CONN, &t).await.unwrap();
    assert_eq!(nodes.iter().map(|n| n.identity).collect::<Vec<_>>(), [2, 3]);

    let (query, params) = connector.executor.last();
    assert_eq!(
        query,
        "MATCH (a:users)-[r:KNOWS]->(b:users)\n\
         WHERE (a.name = {pred_name} AND b.age = {succ_age})\n\
         RETURN b\n\
         ORDER BY b.name DESC"
    );
    assert_eq!(params["succ_age"], json!(3));
    assert!(!params.contains_key("succ_sort"));
}

#[tokio::test]
async fn grouped_predecessor_criteria() {
    let (adapter, connector) = adapter();
    let t = Traversal::new("KNOWS").with_predecessor(
        None,
        json!({ "or": [ { "name": "a" }, { "name": "b" } ] }),
    );
    adapter.get_out_links(CONN, &t).await.unwrap();

    let (query, params) = connector.executor.last();
    assert_eq!(
        query,
        "MATCH (a)-[r:KNOWS]->(b)\nWHERE (a.name = {pred_name} OR a.name = {pred_name_1})\nRETURN r"
    );
    assert_eq!(params["pred_name"], json!("a"));
    assert_eq!(params["pred_name_1"], json!("b"));
}

#[tokio::test]
async fn update_link_matches_outbound_relationships() {
    let (adapter, connector) = adapter();
    let update = LinkUpdate {
        from_label: Some("users".into()),
        from: json!({ "name": "a" }),
        to_label: Some("users".into()),
        to: json!({ "name": "b" }),
        rel_type: Some("KNOWS".into()),
        match_props: props(json!({ "since": 2000 })),
        update_props: Some(props(json!({ "since": 2001, "id": 3 }))),
    };
    adapter.update_link(CONN, &update).await.unwrap();

    let (query, params) = connector.executor.last();
    assert_eq!(
        query,
        "MATCH (a:users)-[n:KNOWS { since: {old_rel_since} }]->(b:users)\n\
         WHERE (a.name = {from_name} AND b.name = {to_name})\n\
         SET n.since = {new_rel_since}\n\
         RETURN n"
    );
    assert_eq!(params["old_rel_since"], json!(2000));
    assert_eq!(params["new_rel_since"], json!(2001));
    assert!(!params.values().any(|v| v == &json!(3)));
}

#[tokio::test]
async fn update_link_validation() {
    let (adapter, connector) = adapter();
    let untyped = LinkUpdate {
        update_props: Some(props(json!({ "since": 1 }))),
        ..LinkUpdate::default()
    };
    let err = adapter.update_link(CONN, &untyped).await.unwrap_err();
    assert_eq!(err.code(), Some("E_MISSING_LINK_TYPE"));

    for update_props in [None, Some(props(json!({ "_id": 1 })))] {
        let update = LinkUpdate {
            rel_type: Some("KNOWS".into()),
            update_props,
            ..LinkUpdate::default()
        };
        let err = adapter.update_link(CONN, &update).await.unwrap_err();
        assert_eq!(err.code(), Some("E_MISSING_LINK_UPDATE"));
    }
    assert_eq!(connector.executor.sent_count(), 0);
}

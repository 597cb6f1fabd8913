#![allow(missing_docs)]

mod support;

use cypherkit::registry::RegistryError;
use cypherkit::{ConnectionConfig, Error};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use support::{adapter, CONN};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_operations_share_one_handshake() {
    let (adapter, connector) = adapter();
    let adapter = Arc::new(adapter);

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move {
                adapter
                    .find(CONN, Some("users"), &json!({ "where": { "rank": i } }))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(connector.opened(), 1);
    assert_eq!(connector.executor.sent_count(), 32);
    assert!(adapter.registry().connection(CONN).unwrap().is_open());
}

#[tokio::test]
async fn registration_is_lazy_and_unique() {
    let (adapter, connector) = adapter();
    assert_eq!(connector.opened(), 0);
    assert!(!adapter.registry().connection(CONN).unwrap().is_open());

    let err = adapter
        .register_connection(CONN, ConnectionConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Registry(RegistryError::AlreadyRegistered(ref name)) if name == CONN
    ));

    let err = adapter
        .register_connection("", ConnectionConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::Registry(RegistryError::MissingIdentity)));

    adapter
        .register_connection("replica", ConnectionConfig::default())
        .unwrap();
    assert_eq!(adapter.registry().identities(), ["neo4j", "replica"]);
}

#[tokio::test]
async fn failed_handshake_can_be_retried() {
    let (adapter, connector) = adapter();
    connector.fail_first.store(1, Ordering::SeqCst);

    let err = adapter.find(CONN, None, &json!({})).await.unwrap_err();
    assert!(matches!(err, Error::Execution(_)));
    assert!(!adapter.registry().connection(CONN).unwrap().is_open());
    assert_eq!(connector.executor.sent_count(), 0);

    adapter.find(CONN, None, &json!({})).await.unwrap();
    assert_eq!(connector.opened(), 1);
    assert_eq!(connector.executor.last().0, "MATCH (n)\nRETURN n");
}

#[tokio::test]
async fn unregistered_connections_are_reported() {
    let (adapter, _) = adapter();
    let err = adapter.build_query("missing").unwrap_err();
    assert!(matches!(
        err,
        Error::Registry(RegistryError::NotRegistered(ref name)) if name == "missing"
    ));
}

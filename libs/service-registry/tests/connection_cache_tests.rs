//! Connection caching through the static registry.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{CountingConnector, SharedConnector};
use service_registry::{
    DialError, RegistryError, ServiceLocation, ServiceRegistry, StaticRegistry,
};

fn registry_with(connector: &Arc<CountingConnector>) -> Arc<StaticRegistry<SharedConnector>> {
    Arc::new(StaticRegistry::with_locations(
        SharedConnector(connector.clone()),
        vec![
            ServiceLocation::new("directoryd", "localhost", 9100).with_label("indexer"),
            ServiceLocation::new("state", "localhost", 9105).with_label("indexer"),
        ],
    ))
}

#[tokio::test]
async fn connection_is_dialed_once_and_reused() {
    let connector = Arc::new(CountingConnector::default());
    let registry = registry_with(&connector);

    let first = registry.get_connection("directoryd").await.unwrap();
    let second = registry.get_connection("DirectoryD").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(connector.dials(), 1);
    assert_eq!(connector.dialed_addresses(), vec!["localhost:9100"]);
    assert_eq!(registry.connection_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_connection() {
    let connector = Arc::new(CountingConnector::slow(Duration::from_millis(50)));
    let registry = registry_with(&connector);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.get_connection("state").await })
        })
        .collect();

    let conns: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let winner = &conns[0];
    assert!(conns.iter().all(|c| Arc::ptr_eq(c, winner)));
    assert_eq!(registry.connection_count(), 1);
    // Every losing dial was closed; exactly one survives.
    assert_eq!(connector.dials() - connector.closes(), 1);
}

#[tokio::test]
async fn removal_evicts_and_forces_a_fresh_dial() {
    let connector = Arc::new(CountingConnector::default());
    let registry = registry_with(&connector);

    let before = registry.get_connection("state").await.unwrap();
    registry.remove("state");
    assert_eq!(connector.closes(), 1);
    assert_eq!(registry.connection_count(), 0);
    assert!(matches!(
        registry.get_connection("state").await,
        Err(RegistryError::NotRegistered { .. })
    ));

    registry.add(vec![ServiceLocation::new("state", "localhost", 9105)]);
    let after = registry.get_connection("state").await.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(connector.dials(), 2);
}

#[tokio::test]
async fn re_registration_redirects_new_connections() {
    let connector = Arc::new(CountingConnector::default());
    let registry = registry_with(&connector);

    registry.get_connection("directoryd").await.unwrap();
    registry.add(vec![ServiceLocation::new("directoryd", "10.0.0.5", 9100)]);
    assert_eq!(connector.closes(), 1);

    let conn = registry.get_connection("directoryd").await.unwrap();
    assert!(conn.starts_with("10.0.0.5:9100#"));
}

#[tokio::test]
async fn remove_with_label_evicts_every_match() {
    let connector = Arc::new(CountingConnector::default());
    let registry = registry_with(&connector);

    registry.get_connection("directoryd").await.unwrap();
    registry.get_connection("state").await.unwrap();
    registry.remove_with_label("indexer");

    assert_eq!(connector.closes(), 2);
    assert_eq!(registry.connection_count(), 0);
    assert!(registry.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_dial_is_not_cached() {
    let connector = Arc::new(CountingConnector::failing());
    let registry = registry_with(&connector);

    for _ in 0..2 {
        match registry.get_connection("state").await {
            Err(RegistryError::DialFailed { service, source }) => {
                assert_eq!(service, "state");
                assert!(matches!(source, DialError::DeadlineExceeded { .. }));
            }
            other => panic!("expected DialFailed, got {other:?}"),
        }
    }
    assert_eq!(registry.connection_count(), 0);
}

#[tokio::test]
async fn unknown_service_is_never_dialed() {
    let connector = Arc::new(CountingConnector::default());
    let registry = registry_with(&connector);

    let err = registry.get_connection("nope").await.unwrap_err();
    assert!(err.is_not_registered());
    assert_eq!(connector.dials(), 0);
}

fn slow_registry(connector: &Arc<CountingConnector>) -> Arc<StaticRegistry<SharedConnector>> {
    Arc::new(StaticRegistry::with_locations(
        SharedConnector(connector.clone()),
        vec![ServiceLocation::new("svc", "old-host", 1)],
    ))
}

#[tokio::test]
async fn re_registration_during_dial_discards_old_address() {
    let connector = Arc::new(CountingConnector::slow(Duration::from_millis(200)));
    let registry = slow_registry(&connector);

    let pending = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.get_connection("svc").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    registry.add(vec![ServiceLocation::new("svc", "new-host", 2)]);

    let conn = pending.await.unwrap().unwrap();
    assert!(conn.starts_with("new-host:2#"), "got {conn}");
    assert_eq!(connector.closes(), 1);

    let again = registry.get_connection("svc").await.unwrap();
    assert!(Arc::ptr_eq(&conn, &again));
    assert_eq!(
        connector.dialed_addresses(),
        vec!["old-host:1", "new-host:2"]
    );
}

#[tokio::test]
async fn removal_during_dial_caches_nothing() {
    let connector = Arc::new(CountingConnector::slow(Duration::from_millis(200)));
    let registry = slow_registry(&connector);

    let pending = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.get_connection("svc").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    registry.remove("svc");

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(RegistryError::NotRegistered { .. })));
    assert_eq!(registry.connection_count(), 0);
    assert_eq!(connector.closes(), 1);
    assert!(
        registry
            .get_connection("svc")
            .await
            .unwrap_err()
            .is_not_registered()
    );
}

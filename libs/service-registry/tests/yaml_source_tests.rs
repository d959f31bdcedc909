//! Loading static registry files from a config directory.

use std::fs;
use std::path::Path;

use service_registry::{
    RegistryConfig, RegistryError, ServiceRegistry, build_registry, load_locations_from_dir,
};

fn write_module(root: &Path, module: &str, body: &str) {
    let dir = root.join(module);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("service_registry.yml"), body).unwrap();
}

const ORC8R: &str = r#"
services:
  directoryd:
    host: "localhost"
    port: 9100
    labels:
      orc8r.io/state_indexer: "true"
    annotations:
      orc8r.io/state_indexer_types: "directory_record"
  state:
    host: "localhost"
    port: 9105
    echo_port: 10105
"#;

const LTE: &str = r#"
services:
  subscriberdb:
    host: "localhost"
    port: 9083
    proxy_aliases:
      subscriberdb.internal:
        port: 9183
    labels:
      orc8r.io/stream_provider: "true"
    annotations:
      orc8r.io/stream_provider_streams: "subscriberdb, apn_rule_mappings,
        network_wide_rules"
"#;

#[test]
fn loads_every_module_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "orc8r", ORC8R);
    write_module(dir.path(), "lte", LTE);
    fs::create_dir_all(dir.path().join("empty_module")).unwrap();

    let names: Vec<String> = load_locations_from_dir(dir.path())
        .unwrap()
        .into_iter()
        .map(|l| l.name)
        .collect();
    assert_eq!(names, vec!["subscriberdb", "directoryd", "state"]);
}

#[test]
fn malformed_file_fails_the_whole_load() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "orc8r", ORC8R);
    write_module(dir.path(), "broken", "services:\n  svc: [not, a, map]\n");

    match load_locations_from_dir(dir.path()) {
        Err(RegistryError::InvalidSource { origin, .. }) => {
            assert!(origin.ends_with("service_registry.yml"), "origin: {origin}");
            assert!(origin.contains("broken"), "origin: {origin}");
        }
        other => panic!("expected InvalidSource, got {other:?}"),
    }
}

#[test]
fn missing_directory_is_invalid_source() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(matches!(
        load_locations_from_dir(&missing),
        Err(RegistryError::InvalidSource { .. })
    ));
}

#[tokio::test]
async fn static_registry_built_from_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "orc8r", ORC8R);
    write_module(dir.path(), "lte", LTE);

    let config = RegistryConfig {
        mode: Some("yaml".to_owned()),
        config_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let registry = build_registry(&config, None).unwrap();

    assert_eq!(
        registry.list_all().await.unwrap(),
        vec!["directoryd", "state", "subscriberdb"]
    );
    assert_eq!(
        registry.find("orc8r.io/state_indexer").await.unwrap(),
        vec!["directoryd"]
    );
    assert_eq!(
        registry.resolve_http_address("state").await.unwrap(),
        "localhost:10105"
    );
    assert_eq!(
        registry
            .get_annotation_list("subscriberdb", "orc8r.io/stream_provider_streams")
            .await
            .unwrap(),
        vec!["subscriberdb", "apn_rule_mappings", "network_wide_rules"]
    );
}

use std::path::Path;

use serde_json::json;

use crate::config::{ConfigData, ConfigFormat};

#[test]
fn test_format_from_path() {
    assert_eq!(ConfigFormat::from_path(Path::new("config.json")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("config.YML")), Some(ConfigFormat::Yaml));
    assert_eq!(ConfigFormat::from_path(Path::new("config.toml")), Some(ConfigFormat::Toml));
    assert_eq!(ConfigFormat::from_path(Path::new("config.ini")), None);
    assert_eq!(ConfigFormat::from_path(Path::new("config")), None);
}

#[test]
fn test_dotted_get_and_set() {
    let mut data = ConfigData::new();
    data.set("database.host", "localhost").unwrap();
    data.set("database.port", 27017).unwrap();
    data.set("app.name", "orders").unwrap();

    assert_eq!(data.get::<String>("database.host").as_deref(), Some("localhost"));
    assert_eq!(data.get::<u16>("database.port"), Some(27017));
    assert_eq!(data.get::<u16>("database.host"), None, "wrong type reads as missing");
    assert_eq!(data.get_or("database.user", "root".to_string()), "root");
    assert!(data.contains_key("app"));
    assert!(!data.contains_key("app.name.first"));
}

#[test]
fn test_set_replaces_scalar_intermediate() {
    let mut data = ConfigData::new();
    data.set("cache", "disabled").unwrap();
    data.set("cache.host", "redis").unwrap();
    assert_eq!(data.get::<String>("cache.host").as_deref(), Some("redis"));

    assert!(data.set("cache..host", "x").is_err());
}

#[test]
fn test_remove_nested_key() {
    let mut data = ConfigData::from_value(json!({"a": {"b": 1, "c": 2}})).unwrap();
    assert_eq!(data.remove("a.b"), Some(json!(1)));
    assert_eq!(data.remove("a.b"), None);
    assert_eq!(data.leaf_keys(), vec!["a.c".to_string()]);
}

#[test]
fn test_merge_is_deep() {
    let mut base = ConfigData::from_value(json!({
        "database": {"host": "", "port": 0, "driver": "memory"},
        "logging": {"level": "info"}
    }))
    .unwrap();
    let file = ConfigData::from_value(json!({
        "database": {"host": "db.internal", "port": 5432},
        "extra": true
    }))
    .unwrap();

    base.merge(&file);

    assert_eq!(base.get::<String>("database.host").as_deref(), Some("db.internal"));
    assert_eq!(base.get::<u16>("database.port"), Some(5432));
    assert_eq!(base.get::<String>("database.driver").as_deref(), Some("memory"));
    assert_eq!(base.get::<String>("logging.level").as_deref(), Some("info"));
    assert_eq!(base.get::<bool>("extra"), Some(true));
}

#[test]
fn test_section_and_leaf_keys() {
    let data = ConfigData::from_value(json!({
        "module": {"users": {"page_size": 20, "admin": {"enabled": true}}}
    }))
    .unwrap();

    let section = data.section("module.users");
    assert_eq!(section.get::<u32>("page_size"), Some(20));
    let mut keys = section.leaf_keys();
    keys.sort();
    assert_eq!(keys, vec!["admin.enabled".to_string(), "page_size".to_string()]);

    assert!(data.section("module.orders").is_empty());
    assert!(data.section("module.users.page_size").is_empty());
}

#[test]
fn test_from_value_rejects_non_objects() {
    assert!(ConfigData::from_value(json!(null)).unwrap().is_empty());
    assert!(ConfigData::from_value(json!([1, 2])).is_err());
}

#[test]
fn test_yaml_and_toml_documents_parse_to_the_same_tree() {
    let yaml = "database:\n  host: localhost\n  port: 5432\n";
    let toml = "[database]\nhost = \"localhost\"\nport = 5432\n";
    let json = r#"{"database": {"host": "localhost", "port": 5432}}"#;

    let from_yaml = ConfigData::deserialize(yaml, ConfigFormat::Yaml).unwrap();
    let from_toml = ConfigData::deserialize(toml, ConfigFormat::Toml).unwrap();
    let from_json = ConfigData::deserialize(json, ConfigFormat::Json).unwrap();

    assert_eq!(from_yaml, from_json);
    assert_eq!(from_toml, from_json);

    let written = from_json.serialize(ConfigFormat::Yaml).unwrap();
    assert!(written.contains("host: localhost"));
}

#[test]
fn test_invalid_document_reports_format() {
    let err = ConfigData::deserialize("{not json", ConfigFormat::Json).unwrap_err();
    assert!(err.to_string().contains("json"));
}

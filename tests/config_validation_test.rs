use std::io::Write;

use pitwall::config::{AppConfig, LogFormat, StoreBackendKind, StoreSection};
use pitwall::store::StoreConfig;
use tempfile::Builder;

fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn rest_backend_requires_credentials() {
    let config = AppConfig {
        store: StoreSection {
            backend: StoreBackendKind::Rest,
            ..Default::default()
        },
        ..Default::default()
    };

    let result = config.store_runtime();
    assert!(
        result.is_err(),
        "Expected rest backend without url/key to fail validation"
    );
}

#[test]
fn flat_json_layout_maps_onto_rest_store() {
    let file = write_config(
        ".json",
        r#"{ "url": "https://abc.supabase.co", "key": "anon-key" }"#,
    );

    let config = AppConfig::load_from(Some(file.path())).unwrap();

    match config.store_runtime().unwrap() {
        StoreConfig::Rest {
            url,
            key,
            schema,
            timeout,
        } => {
            assert_eq!(url, "https://abc.supabase.co");
            assert_eq!(key, "anon-key");
            assert!(schema.is_none());
            assert!(timeout.is_none());
        }
        other => panic!("Unexpected store config: {other:?}"),
    }
}

#[test]
fn toml_layout_with_memory_backend() {
    let file = write_config(
        ".toml",
        r#"
[server]
port = 9090
cors = false

[store]
backend = "memory"

[store.memory]
fixture = "tests/fixtures/f1.json"

[logging]
level = "debug"
format = "json"
"#,
    );

    let config = AppConfig::load_from(Some(file.path())).unwrap();
    assert_eq!(config.server.port, 9090);
    assert!(!config.server.cors);
    assert_eq!(config.bind_addr(), "0.0.0.0:9090");
    assert_eq!(config.logging.level, "debug");
    assert!(matches!(config.logging.format, LogFormat::Json));

    match config.store_runtime().unwrap() {
        StoreConfig::Memory { fixture } => {
            assert_eq!(
                fixture.unwrap().to_str(),
                Some("tests/fixtures/f1.json")
            );
        }
        other => panic!("Unexpected store config: {other:?}"),
    }
}

#[test]
fn rest_section_timeout_and_schema() {
    let file = write_config(
        ".toml",
        r#"
[store.rest]
url = "https://abc.supabase.co/"
key = "anon-key"
schema = " f1 "
timeout_secs = 5
"#,
    );

    let config = AppConfig::load_from(Some(file.path())).unwrap();
    match config.store_runtime().unwrap() {
        StoreConfig::Rest {
            schema, timeout, ..
        } => {
            assert_eq!(schema.as_deref(), Some("f1"));
            assert_eq!(timeout, Some(std::time::Duration::from_secs(5)));
        }
        other => panic!("Unexpected store config: {other:?}"),
    }
}

#[test]
fn missing_explicit_file_is_an_error() {
    let result = AppConfig::load_from(Some(std::path::Path::new("/nonexistent/pitwall.toml")));
    assert!(result.is_err());
}

#[test]
fn defaults_without_file() {
    let config = AppConfig::load_from(None).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.logging.level, "info");
}

//! Config loading integration tests

use osr_assessment::Config;
use tempfile::TempDir;

#[test]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(config.server.port, 5000);
    assert!(config.cache.enabled);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_with_all_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("osr-assessment.toml");
    std::fs::write(
        &path,
        r#"
[server]
host = "127.0.0.1"
port = 8080
max_body_bytes = 1048576
debug = true
environment = "development"

[cache]
enabled = false
score_ttl_secs = 30
max_entries = 50

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.listen_addr().to_string(), "127.0.0.1:8080");
    assert_eq!(config.server.max_body_bytes, 1_048_576);
    assert!(config.server.debug);
    assert_eq!(config.server.environment, "development");
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.score_ttl_secs, 30);
    assert_eq!(config.cache.max_entries, 50);
    assert_eq!(config.logging.level, "debug");
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_toml_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[server\nport = ").unwrap();

    assert!(Config::load(&path).is_err());
}

#[test]
fn test_bad_host_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad-host.toml");
    std::fs::write(&path, "[server]\nhost = \"not-an-ip\"\n").unwrap();

    assert!(Config::load(&path).is_err());
}

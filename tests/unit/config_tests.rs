// Configuration file loading and saving

use mirror_cache::config::{Config, ConfigError, PropertiesError};
use mirror_cache::constants::{DEFAULT_ADDRESS, DEFAULT_PORT, DEFAULT_SERVERS};
use std::time::Duration;

#[test]
fn test_absent_keys_take_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("minimal.properties");
    std::fs::write(
        &location,
        format!("cache-directory={}\n", dir.path().join("cache").display()),
    )
    .unwrap();

    let config = Config::load_from(&location).unwrap();

    assert_eq!(config.servers, DEFAULT_SERVERS);
    assert_eq!(config.server.address, DEFAULT_ADDRESS);
    assert_eq!(config.server.port, DEFAULT_PORT);
    assert_eq!(config.timeouts.connect, Duration::from_millis(5000));
}

#[test]
fn test_load_creates_and_canonicalizes_cache_directory() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("mirror.properties");
    let cache = dir.path().join("nested/cache");
    std::fs::write(
        &location,
        format!("servers=http://repo.example/maven2\ncache-directory={}\n", cache.display()),
    )
    .unwrap();

    let config = Config::load_from(&location).unwrap();

    assert!(config.cache_directory.is_dir());
    assert_eq!(
        config.cache_directory,
        dir.path().join("nested/cache").canonicalize().unwrap()
    );
}

#[test]
fn test_save_writes_every_key_and_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("conf/mirror.properties");
    std::fs::create_dir_all(dir.path().join("conf")).unwrap();
    std::fs::write(
        &location,
        format!(
            "# upstreams in priority order\nservers = http://a.example/, http://b.example # two\ncache-directory={}\nport=8080\n",
            dir.path().join("cache").display()
        ),
    )
    .unwrap();

    let config = Config::load_from(&location).unwrap();
    config.save_to(&location).unwrap();
    let saved = std::fs::read_to_string(&location).unwrap();

    assert!(saved.contains("servers=http://a.example, http://b.example\n"));
    assert!(saved.contains("port=8080\n"));
    assert!(saved.contains("address=127.0.0.1\n"));
    assert!(saved.contains("connect-timeout-ms=5000\n"));
    assert!(saved.contains("request-timeout-ms=5000\n"));
    assert!(saved.contains("read-timeout-ms=5000\n"));
    assert!(saved.contains("transfer-timeout-ms=120000\n"));

    let reloaded = Config::load_from(&location).unwrap();
    assert_eq!(reloaded.servers, config.servers);
    assert_eq!(reloaded.cache_directory, config.cache_directory);
    assert_eq!(reloaded.server.port, 8080);
}

#[test]
fn test_save_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(
        vec!["http://repo.example".to_string()],
        dir.path().join("cache"),
    )
    .unwrap();
    let location = dir.path().join("etc/deep/mirror.properties");

    config.save_to(&location).unwrap();

    assert!(location.exists());
}

#[test]
fn test_line_without_separator_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("bad.properties");
    std::fs::write(&location, "servers=http://a.example\njust some words\n").unwrap();

    let err = Config::load_from(&location).unwrap_err();

    match err {
        ConfigError::Properties(PropertiesError::MissingSeparator { line, content }) => {
            assert_eq!(line, 2);
            assert_eq!(content, "just some words");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_empty_server_list_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("empty.properties");
    std::fs::write(&location, "servers= , \n").unwrap();

    let err = Config::load_from(&location).unwrap_err();

    assert!(matches!(err, ConfigError::NoServers));
    assert_eq!(err.to_string(), "No servers provided!");
}

#[test]
fn test_non_numeric_timeout_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("bad-timeout.properties");
    std::fs::write(
        &location,
        format!(
            "cache-directory={}\nread-timeout-ms=soon\n",
            dir.path().join("cache").display()
        ),
    )
    .unwrap();

    let err = Config::load_from(&location).unwrap_err();

    assert!(matches!(
        err,
        ConfigError::InvalidValue {
            key: "read-timeout-ms",
            ..
        }
    ));
}

//! Configuration layering: defaults, TOML file, environment and CLI flags.

use clap::Parser;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use spandupe::cli::Cli;
use spandupe::config::{Config, ConfigError};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_defaults_extract() {
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.io_threads, 4);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "skip_hidden = true\n").unwrap();

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .extract()
        .unwrap();

    assert!(config.skip_hidden);
    assert_eq!(config.io_threads, 4);
    assert!(!config.dry_run);
}

#[test]
fn test_env_layer_parses_lists() {
    std::env::set_var("SPANDUPE_ITEST_EXCLUDE", "[\"*.tmp\", \"cache/\"]");
    std::env::set_var("SPANDUPE_ITEST_DRY_RUN", "true");

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("SPANDUPE_ITEST_"))
        .extract()
        .unwrap();

    std::env::remove_var("SPANDUPE_ITEST_EXCLUDE");
    std::env::remove_var("SPANDUPE_ITEST_DRY_RUN");

    assert_eq!(config.exclude, vec!["*.tmp", "cache/"]);
    assert!(config.dry_run);
}

#[test]
fn test_load_explicit_file_then_cli() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("spandupe.toml");
    fs::write(
        &path,
        r#"
volumes_root = "/mnt"
volume_prefix = "disk"
io_threads = 2
exclude = ["*.!qB"]
"#,
    )
    .unwrap();

    let mut config = Config::load(Some(&path)).unwrap();
    let cli = Cli::try_parse_from(["spandupe", "--io-threads", "6", "--exclude", "*.part"]).unwrap();
    config.apply_cli(&cli);

    assert_eq!(config.volumes_root, Some(PathBuf::from("/mnt")));
    assert_eq!(config.volume_prefix.as_deref(), Some("disk"));
    assert_eq!(config.io_threads, 6);
    assert_eq!(config.exclude, vec!["*.!qB", "*.part"]);
}

#[test]
fn test_load_missing_explicit_file() {
    let result = Config::load(Some(std::path::Path::new("/no/such/spandupe.toml")));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_load_malformed_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "io_threads = [").unwrap();

    let result = Config::load(Some(&path));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_config_serializes_to_toml() {
    let config = Config {
        io_threads: 1,
        dry_run: true,
        ..Config::default()
    };
    let text = toml::to_string_pretty(&config).unwrap();

    assert!(text.contains("io_threads = 1"));
    assert!(text.contains("dry_run = true"));
}

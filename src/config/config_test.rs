use std::path::PathBuf;

use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::Error;

fn cleanup_all_provenance_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("PROVENANCE__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = ProvenanceConfig::default();

    assert_eq!(
        config.control.securityfs_dir,
        PathBuf::from("/sys/kernel/security/provenance")
    );
    assert_eq!(config.relay.relay_dir, PathBuf::from("/sys/kernel/debug"));
    assert_eq!(config.relay.short_channel_prefix, "provenance");
    assert_eq!(config.relay.long_channel_prefix, "long_provenance");
    assert_eq!(config.relay.read_buffer_size, 16 * 1024);
    assert_eq!(config.relay.idle_poll_interval_ms, 10);
    assert_eq!(config.relay.stop_grace_period_ms, 1000);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_provenance_env_vars();
    with_vars(
        vec![
            ("PROVENANCE__RELAY__READ_BUFFER_SIZE", Some("4096")),
            ("PROVENANCE__CONTROL__SECURITYFS_DIR", Some("/tmp/prov")),
        ],
        || {
            let config = ProvenanceConfig::new().unwrap();

            assert_eq!(config.relay.read_buffer_size, 4096);
            assert_eq!(config.control.securityfs_dir, PathBuf::from("/tmp/prov"));
        },
    );
}

#[test]
#[serial]
fn new_should_load_file_from_config_path() {
    cleanup_all_provenance_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("relay.toml");
    std::fs::write(
        &config_path,
        r#"
        [relay]
        stop_grace_period_ms = 250
        "#,
    )
    .unwrap();

    with_vars(vec![("CONFIG_PATH", Some(config_path.to_str().unwrap()))], || {
        let config = ProvenanceConfig::new().unwrap();

        assert_eq!(config.relay.stop_grace_period_ms, 250);
        assert_eq!(config.relay.idle_poll_interval_ms, 10);
    });
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_provenance_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(
        &config_path,
        r#"
        [control]
        securityfs_dir = "/tmp/xx/securityfs"

        [relay]
        short_channel_prefix = "prov"
        idle_poll_interval_ms = 50
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base_config = ProvenanceConfig::new().expect("success");
        let config = base_config
            .with_override_config(config_path.to_str().unwrap())
            .unwrap();

        assert_eq!(
            config.control.securityfs_dir,
            PathBuf::from("/tmp/xx/securityfs")
        );
        assert_eq!(config.relay.short_channel_prefix, "prov");
        assert_eq!(config.relay.idle_poll_interval_ms, 50);
        assert_eq!(config.relay.long_channel_prefix, "long_provenance");
    });
}

#[test]
#[serial]
fn environment_should_win_over_override_file() {
    cleanup_all_provenance_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(&config_path, "[relay]\nread_buffer_size = 8192\n").unwrap();

    with_vars(vec![("PROVENANCE__RELAY__READ_BUFFER_SIZE", Some("2048"))], || {
        let config = ProvenanceConfig::default()
            .with_override_config(config_path.to_str().unwrap())
            .unwrap();

        assert_eq!(config.relay.read_buffer_size, 2048);
    });
}

#[test]
fn validation_should_reject_undersized_read_buffer() {
    let mut config = ProvenanceConfig::default();
    config.relay.read_buffer_size = 16;

    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validation_should_reject_zero_intervals() {
    let mut config = ProvenanceConfig::default();
    config.relay.idle_poll_interval_ms = 0;
    assert!(matches!(config.validate(), Err(Error::Config(_))));

    let mut config = ProvenanceConfig::default();
    config.relay.stop_grace_period_ms = 0;
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validation_should_reject_ambiguous_prefixes() {
    let mut config = ProvenanceConfig::default();
    config.relay.long_channel_prefix = config.relay.short_channel_prefix.clone();
    assert!(matches!(config.validate(), Err(Error::Config(_))));

    let mut config = ProvenanceConfig::default();
    config.relay.short_channel_prefix.clear();
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validation_should_reject_relative_securityfs_dir() {
    let mut config = ProvenanceConfig::default();
    config.control.securityfs_dir = PathBuf::from("relative/provenance");

    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

//! Configuration resolution and graceful degradation tests
//!
//! Note: tests that manipulate BEATPLANNER_ROOT_FOLDER or BEATPLANNER_ROOT
//! are marked #[serial] to prevent ENV variable race conditions between
//! parallel test threads.

use std::env;
use std::path::PathBuf;

use bp_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig, ENV_ROOT,
    ENV_ROOT_FOLDER,
};
use serial_test::serial;
use tempfile::TempDir;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ENV_ROOT_FOLDER);
    env::remove_var(ENV_ROOT);

    let resolver = RootFolderResolver::new("test-module");
    let root_folder = resolver.resolve();

    assert!(!root_folder.as_os_str().is_empty());
    assert_eq!(
        root_folder,
        CompiledDefaults::for_current_platform().root_folder
    );
}

#[test]
#[serial]
fn test_resolver_env_var_root_folder() {
    let test_path = "/tmp/bp-test-env-folder";
    env::set_var(ENV_ROOT_FOLDER, test_path);

    let resolver = RootFolderResolver::new("test-module");
    assert_eq!(resolver.resolve(), PathBuf::from(test_path));

    env::remove_var(ENV_ROOT_FOLDER);
}

#[test]
#[serial]
fn test_resolver_env_var_root() {
    let test_path = "/tmp/bp-test-env-root";
    env::set_var(ENV_ROOT, test_path);

    let resolver = RootFolderResolver::new("test-module");
    assert_eq!(resolver.resolve(), PathBuf::from(test_path));

    env::remove_var(ENV_ROOT);
}

#[test]
#[serial]
fn test_root_folder_var_takes_precedence() {
    env::remove_var(ENV_ROOT_FOLDER);
    env::remove_var(ENV_ROOT);

    env::set_var(ENV_ROOT_FOLDER, "/tmp/bp-priority-1");
    env::set_var(ENV_ROOT, "/tmp/bp-priority-2");

    let resolver = RootFolderResolver::new("test-module");
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/bp-priority-1"));

    env::remove_var(ENV_ROOT_FOLDER);
    env::remove_var(ENV_ROOT);
}

#[test]
#[serial]
fn test_cli_argument_beats_environment() {
    env::set_var(ENV_ROOT_FOLDER, "/tmp/bp-from-env");

    let resolver = RootFolderResolver::new("test-module");
    let cli_root = PathBuf::from("/tmp/bp-from-cli");
    let resolved = resolver.resolve_with_cli(Some(cli_root.as_path()));
    assert_eq!(resolved, cli_root);

    env::remove_var(ENV_ROOT_FOLDER);
}

#[test]
#[serial]
fn test_missing_config_file_does_not_error() {
    env::remove_var(ENV_ROOT_FOLDER);
    env::remove_var(ENV_ROOT);

    // A module name no config file will ever exist for
    let resolver = RootFolderResolver::new("nonexistent-test-module-29581");
    let root_folder = resolver.resolve();

    assert!(!root_folder.as_os_str().is_empty());
    assert_eq!(
        root_folder,
        CompiledDefaults::for_current_platform().root_folder
    );
}

#[test]
fn test_initializer_creates_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("nested").join("beatplanner-root");

    let initializer = RootFolderInitializer::new(root.clone());
    assert!(!initializer.database_exists());

    initializer
        .ensure_directory_exists()
        .expect("directory creation should succeed");
    assert!(root.is_dir(), "root folder was not created");

    // Second call is idempotent
    initializer
        .ensure_directory_exists()
        .expect("repeat creation should succeed");
}

#[test]
fn test_initializer_database_path() {
    let initializer = RootFolderInitializer::new(PathBuf::from("/tmp/bp-test-root"));
    assert_eq!(
        initializer.database_path(),
        PathBuf::from("/tmp/bp-test-root").join("beatplanner.db")
    );
}

#[test]
fn test_toml_roundtrip() {
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/data/beatplanner")),
        ..TomlConfig::default()
    };

    let encoded = toml::to_string(&config).unwrap();
    let parsed: TomlConfig = toml::from_str(&encoded).unwrap();

    assert_eq!(parsed.root_folder, Some(PathBuf::from("/data/beatplanner")));
    assert_eq!(parsed.logging.level, "info");
    assert_eq!(parsed.sync.interval_secs, 30);
}

#[test]
fn test_logging_level_from_toml() {
    let config: TomlConfig = toml::from_str(
        r#"
        [logging]
        level = "debug"
        "#,
    )
    .unwrap();
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_configured_log_level_without_file_is_the_compiled_default() {
    // A module name no config file will ever exist for
    let resolver = RootFolderResolver::new("nonexistent-test-module-29581");
    assert_eq!(
        resolver.configured_log_level(),
        CompiledDefaults::for_current_platform().log_level
    );
}

#[test]
fn test_sync_can_be_disabled_in_toml() {
    let config: TomlConfig = toml::from_str(
        r#"
        [sync]
        enabled = false
        "#,
    )
    .unwrap();
    assert!(!config.sync.enabled);
}

//! Configuration loading and root folder resolution
//!
//! Tests that manipulate MLIB_ROOT_FOLDER are marked #[serial] so they do not
//! race on the process environment.

use mlib_common::config::{
    default_root_folder, load_or_default, load_toml_config, write_toml_config, LibraryOptions,
    LoggingConfig, RootFolderResolver, TomlConfig, DATABASE_FILE_NAME, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_defaults_when_fields_missing() {
    let config: TomlConfig = toml::from_str("").unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.library.preferred_metadata_language, "en");
    assert_eq!(config.library.metadata_country_code, "US");
    assert!(config.library.enable_internet_providers);
    assert!(!config.library.save_local_metadata);
}

#[test]
fn test_partial_library_section() {
    let config: TomlConfig = toml::from_str(
        r#"
        [library]
        preferred_metadata_language = "de"
        save_local_metadata = true
        "#,
    )
    .unwrap();

    assert_eq!(config.library.preferred_metadata_language, "de");
    assert_eq!(config.library.metadata_country_code, "US");
    assert!(config.library.save_local_metadata);
    assert!(config.library.enable_internet_providers);
}

#[test]
fn test_write_then_load_preserves_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/media")),
        database_path: None,
        logging: LoggingConfig {
            level: "debug".to_string(),
            file: None,
        },
        library: LibraryOptions {
            preferred_metadata_language: "fr".to_string(),
            ..LibraryOptions::default()
        },
    };

    write_toml_config(&config, &path).unwrap();
    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = [unterminated").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(matches!(err, mlib_common::Error::Config(_)));
}

#[test]
fn test_load_or_default_degrades_gracefully() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist.toml");
    assert_eq!(load_or_default(Some(missing.as_path())), TomlConfig::default());
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/mlib-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/mlib-toml")),
        ..TomlConfig::default()
    };

    let resolver = RootFolderResolver::new(Some(PathBuf::from("/tmp/mlib-cli")), config);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/mlib-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/mlib-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/mlib-toml")),
        ..TomlConfig::default()
    };

    let resolver = RootFolderResolver::new(None, config);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/mlib-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_then_compiled_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/mlib-toml")),
        ..TomlConfig::default()
    };
    let resolver = RootFolderResolver::new(None, config);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/mlib-toml"));
    assert_eq!(
        resolver.database_path(),
        PathBuf::from("/tmp/mlib-toml").join(DATABASE_FILE_NAME)
    );

    let resolver = RootFolderResolver::new(None, TomlConfig::default());
    assert_eq!(resolver.resolve(), default_root_folder());
}

#[test]
#[serial]
fn test_explicit_database_path() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig {
        database_path: Some(PathBuf::from("/tmp/elsewhere/catalog.db")),
        ..TomlConfig::default()
    };
    let resolver = RootFolderResolver::new(None, config);
    assert_eq!(resolver.database_path(), PathBuf::from("/tmp/elsewhere/catalog.db"));
}

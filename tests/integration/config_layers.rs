//! Configuration layering: defaults, global file, environment

use super::test_utils::with_isolated_env;
use snapfs::config::global_config_path;
use snapfs::{ConfigLoader, OverwritePolicy};
use tempfile::TempDir;

fn write_global_config(test_dir: &TempDir, content: &str) {
    let config_dir = test_dir.path().join("snapfs");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), content).unwrap();
}

#[test]
fn test_defaults_without_any_sources() {
    let test_dir = TempDir::new().unwrap();
    let config = with_isolated_env(&test_dir, ConfigLoader::load).unwrap();
    assert_eq!(config.filesystem.overwrite, OverwritePolicy::Replace);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_global_file_is_picked_up() {
    let test_dir = TempDir::new().unwrap();
    write_global_config(
        &test_dir,
        "[filesystem]\noverwrite = \"reject\"\n\n[storage]\npath = \"/var/snapfs\"\n",
    );

    let (path, config) = with_isolated_env(&test_dir, || {
        (global_config_path(), ConfigLoader::load().unwrap())
    });
    assert_eq!(path, Some(test_dir.path().join("snapfs").join("config.toml")));
    assert_eq!(config.filesystem.overwrite, OverwritePolicy::Reject);
    assert_eq!(config.storage.path, std::path::PathBuf::from("/var/snapfs"));
}

#[test]
fn test_environment_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    write_global_config(&test_dir, "[filesystem]\noverwrite = \"reject\"\n");

    let config = with_isolated_env(&test_dir, || {
        std::env::set_var("SNAPFS_FILESYSTEM__OVERWRITE", "replace");
        ConfigLoader::load().unwrap()
    });
    assert_eq!(config.filesystem.overwrite, OverwritePolicy::Replace);
}

#[test]
fn test_invalid_global_file_is_reported() {
    let test_dir = TempDir::new().unwrap();
    write_global_config(&test_dir, "[logging]\nformat = \"xml\"\n");
    let result = with_isolated_env(&test_dir, ConfigLoader::load);
    assert!(result.is_err());
}

//! Integration tests for the layered configuration system

use crate::integration::test_utils::with_isolated_env;
use numctx::config::{global_config_path, ConfigLoader, NumctxConfig};
use numctx::context::Context;
use numctx::delegate::LengthPolicy;
use numctx::value::Value;
use tempfile::TempDir;

fn write_global(test_dir: &TempDir, body: &str) {
    let dir = test_dir.path().join("numctx");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), body).unwrap();
}

#[test]
fn test_defaults_without_any_file() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let config = with_isolated_env(&test_dir, &[], || ConfigLoader::load(workspace.path()))
        .unwrap();
    assert_eq!(config, NumctxConfig::default());
}

#[test]
fn test_user_file_is_found_under_config_home() {
    let test_dir = TempDir::new().unwrap();
    let path = with_isolated_env(&test_dir, &[], global_config_path).unwrap();
    assert!(path.starts_with(test_dir.path()));
    assert!(path.ends_with("numctx/config.toml"));
}

#[test]
fn test_workspace_file_overrides_user_file() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_global(
        &test_dir,
        r#"
[context]
length_policy = "reject"
arrays_only = true

[logging]
level = "info"
"#,
    );
    std::fs::write(
        workspace.path().join("numctx.toml"),
        r#"
[context]
arrays_only = false
"#,
    )
    .unwrap();

    let config = with_isolated_env(&test_dir, &[], || ConfigLoader::load(workspace.path()))
        .unwrap();
    assert_eq!(config.context.length_policy, LengthPolicy::Reject);
    assert!(!config.context.arrays_only);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_environment_overrides_files() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    std::fs::write(
        workspace.path().join("numctx.toml"),
        "[snapshot]\nstrict = false\n",
    )
    .unwrap();

    let config = with_isolated_env(
        &test_dir,
        &[
            ("NUMCTX__SNAPSHOT__STRICT", "true"),
            ("NUMCTX__CONTEXT__LENGTH_POLICY", "reject"),
        ],
        || ConfigLoader::load(workspace.path()),
    )
    .unwrap();
    assert!(config.snapshot.strict);
    assert_eq!(config.context.length_policy, LengthPolicy::Reject);
}

#[test]
fn test_profile_file_layers_over_workspace_file() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    std::fs::write(
        workspace.path().join("numctx.toml"),
        "[logging]\nlevel = \"warn\"\nformat = \"json\"\n",
    )
    .unwrap();
    std::fs::write(
        workspace.path().join("numctx.ci.toml"),
        "[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    let config = with_isolated_env(&test_dir, &[("NUMCTX_ENV", "ci")], || {
        ConfigLoader::load(workspace.path())
    })
    .unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
}

#[test]
fn test_invalid_value_fails_to_load() {
    let workspace = TempDir::new().unwrap();
    let path = workspace.path().join("numctx.toml");
    std::fs::write(&path, "[context]\nlength_policy = \"sometimes\"\n").unwrap();
    assert!(ConfigLoader::load_from_file(&path).is_err());
}

#[test]
fn test_loaded_context_section_builds_leaves() {
    let workspace = TempDir::new().unwrap();
    let path = workspace.path().join("numctx.toml");
    std::fs::write(&path, "[context]\nlength_policy = \"reject\"\n").unwrap();
    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert!(config.validate().is_ok());

    let leaf = config.context.build_leaf();
    leaf.set("a", Value::from(vec![1i64, 2, 3])).unwrap();
    leaf.set("b", Value::from(vec![1i64, 2, 3])).unwrap();
    assert!(leaf.set("a", Value::from(vec![1i64])).is_err());
    assert_eq!(leaf.len(), 3);
}

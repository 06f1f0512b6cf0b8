//! Unit tests for configuration resolution
//!
//! Tests cover:
//! - Root folder priority: CLI → ENV → TOML → default
//! - Missing config file falls back to defaults
//! - Auth credential resolution from ENV and TOML
//! - AI key resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SNAILTRACK_* or credential variables are marked with
//! #[serial] so they run sequentially.

use serial_test::serial;
use snailtrack_common::config::{
    AiConfig, AiSection, AuthConfig, AuthMode, AuthSection, RootFolderInitializer, RootFolderResolver,
    TomlConfig, AI_API_KEY_ENV, AUTH_PASS_ENV, AUTH_USER_ENV, CONFIG_FILE_ENV, ROOT_FOLDER_ENV,
};
use std::env;
use std::io::Write;
use std::path::PathBuf;

fn clear_env() {
    for var in [
        ROOT_FOLDER_ENV,
        CONFIG_FILE_ENV,
        AUTH_USER_ENV,
        AUTH_PASS_ENV,
        AI_API_KEY_ENV,
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    clear_env();
    let toml = TomlConfig::default();

    let root = RootFolderResolver::new(None, &toml).resolve();

    assert!(!root.as_os_str().is_empty());
    assert!(root.to_string_lossy().contains("snailtrack"));
}

#[test]
#[serial]
fn test_resolver_priority_order() {
    clear_env();
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    // TOML beats default
    assert_eq!(
        RootFolderResolver::new(None, &toml).resolve(),
        PathBuf::from("/from/toml")
    );

    // ENV beats TOML
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    assert_eq!(
        RootFolderResolver::new(None, &toml).resolve(),
        PathBuf::from("/from/env")
    );

    // CLI beats ENV
    assert_eq!(
        RootFolderResolver::new(Some(PathBuf::from("/from/cli")), &toml).resolve(),
        PathBuf::from("/from/cli")
    );

    clear_env();
}

#[test]
fn test_initializer_creates_image_directory() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("nested").join("root");

    let init = RootFolderInitializer::new(root.clone());
    init.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert!(init.images_path().is_dir());
    assert_eq!(init.database_path(), root.join("snailtrack.db"));
}

#[test]
#[serial]
fn test_load_explicit_config_file() {
    clear_env();
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "bind_address = \"0.0.0.0:9000\"").unwrap();
    writeln!(file, "[matching]").unwrap();
    writeln!(file, "candidate_limit = 8").unwrap();

    let config = TomlConfig::load(Some(&path)).unwrap();

    assert_eq!(config.bind_address.as_deref(), Some("0.0.0.0:9000"));
    assert_eq!(config.matching.candidate_limit, Some(8));
}

#[test]
#[serial]
fn test_load_config_file_from_env() {
    clear_env();
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("snail.toml");
    std::fs::write(&path, "log_level = \"debug\"\n").unwrap();
    env::set_var(CONFIG_FILE_ENV, &path);

    let config = TomlConfig::load(None).unwrap();
    assert_eq!(config.log_level.as_deref(), Some("debug"));

    clear_env();
}

#[test]
#[serial]
fn test_missing_explicit_config_is_error() {
    clear_env();
    let result = TomlConfig::load(Some(&PathBuf::from("/definitely/not/here.toml")));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_auth_from_toml() {
    clear_env();
    let section = AuthSection {
        username: Some("family".to_string()),
        password: Some("garden".to_string()),
        ..Default::default()
    };

    let auth = AuthConfig::resolve(&section).unwrap();
    let AuthMode::Basic(creds) = auth.mode else {
        panic!("expected Basic auth, got {:?}", auth.mode);
    };
    assert_eq!(creds.username, "family");
    assert_eq!(creds.password, "garden");
}

#[test]
#[serial]
fn test_auth_env_overrides_toml() {
    clear_env();
    env::set_var(AUTH_USER_ENV, "envuser");
    env::set_var(AUTH_PASS_ENV, "envpass");
    let section = AuthSection {
        username: Some("family".to_string()),
        password: Some("garden".to_string()),
        ..Default::default()
    };

    let auth = AuthConfig::resolve(&section).unwrap();
    let AuthMode::Basic(creds) = auth.mode else {
        panic!("expected Basic auth, got {:?}", auth.mode);
    };
    assert_eq!(creds.username, "envuser");
    assert_eq!(creds.password, "envpass");

    clear_env();
}

#[test]
#[serial]
fn test_auth_locked_when_unset() {
    clear_env();
    let auth = AuthConfig::resolve(&AuthSection::default()).unwrap();
    assert_eq!(auth.mode, AuthMode::Locked);
}

#[test]
#[serial]
fn test_auth_disabled_only_when_explicit() {
    clear_env();
    let toml = TomlConfig::parse("[auth]\ndisabled = true\n").unwrap();
    let auth = AuthConfig::resolve(&toml.auth).unwrap();
    assert_eq!(auth.mode, AuthMode::Disabled);

    let toml = TomlConfig::parse("[auth]\ndisabled = false\n").unwrap();
    let auth = AuthConfig::resolve(&toml.auth).unwrap();
    assert_eq!(auth.mode, AuthMode::Locked);
}

#[test]
#[serial]
fn test_auth_half_configured_is_error() {
    clear_env();
    env::set_var(AUTH_USER_ENV, "lonely");
    assert!(AuthConfig::resolve(&AuthSection::default()).is_err());
    clear_env();
}

#[test]
#[serial]
fn test_ai_key_from_env() {
    clear_env();
    assert!(!AiConfig::resolve(&AiSection::default()).is_configured());

    env::set_var(AI_API_KEY_ENV, "sk-test");
    let ai = AiConfig::resolve(&AiSection::default());
    assert!(ai.is_configured());
    assert_eq!(ai.api_key.as_deref(), Some("sk-test"));
    assert_eq!(ai.vision_model, "gpt-4o");

    clear_env();
}

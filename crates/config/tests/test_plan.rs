//! Test plan for the `huddle-config` crate.
//!
//! These tests exercise the configuration loader across default handling,
//! file discovery, environment overrides, and validation behaviour.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use huddle_config::{load, AppConfig, ChannelConfig, HttpConfig, TypingConfig};

const ENV_VARS_TO_RESET: &[&str] = &[
    "HUDDLE_CONFIG",
    "HUDDLE__CHANNELS__CAPACITY",
    "HUDDLE__CHANNELS__OUTBOUND_BUFFER",
    "HUDDLE__DATABASE__MAX_CONNECTIONS",
    "HUDDLE__DATABASE__URL",
    "HUDDLE__HTTP__ADDRESS",
    "HUDDLE__HTTP__PORT",
    "HUDDLE__TYPING__COOLDOWN_MS",
    "HUDDLE__TYPING__TIMEOUT_MS",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(path, contents).expect("failed to write config file");
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.http.port, defaults.http.port);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(
        config.database.max_connections,
        defaults.database.max_connections
    );
    assert_eq!(config.channels.capacity, defaults.channels.capacity);
    assert_eq!(config.typing.cooldown_ms, defaults.typing.cooldown_ms);
    assert_eq!(config.typing.timeout_ms, defaults.typing.timeout_ms);
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "huddle.toml",
        r#"
        [http]
        port = 4242
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/huddle.toml",
        r#"
        [http]
        port = 5151
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.http.port, 4242);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "huddle.toml",
        r#"
        [database]
        max_connections = 50

        [typing]
        timeout_ms = 5000
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.http.port, defaults.http.port);
    assert_eq!(config.database.max_connections, 50);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(config.typing.timeout_ms, 5000);
    assert_eq!(config.typing.cooldown_ms, defaults.typing.cooldown_ms);
}

#[test]
#[serial]
fn load_reads_explicit_config_path() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "elsewhere/custom.toml",
        r#"
        [channels]
        capacity = 16
        "#,
    );
    let explicit = temp_dir.path().join("elsewhere/custom.toml");
    ctx.set_var("HUDDLE_CONFIG", explicit.display().to_string());

    let config = load().expect("configuration load should use HUDDLE_CONFIG");
    assert_eq!(config.channels.capacity, 16);
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "huddle.toml",
        r#"
        [http]
        port = 3030
        "#,
    );

    ctx.set_var("HUDDLE__HTTP__PORT", "8080");
    ctx.set_var("HUDDLE__TYPING__COOLDOWN_MS", "750");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.http.port, 8080);
    assert_eq!(config.typing.cooldown_ms, 750);
}

#[test]
#[serial]
fn load_replaces_zero_channel_sizes_with_defaults() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    ctx.set_var("HUDDLE__CHANNELS__CAPACITY", "0");
    ctx.set_var("HUDDLE__CHANNELS__OUTBOUND_BUFFER", "0");

    let config = load().expect("configuration load should succeed");
    let defaults = ChannelConfig::default();
    assert_eq!(config.channels.capacity, defaults.capacity);
    assert_eq!(config.channels.outbound_buffer, defaults.outbound_buffer);
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "huddle.toml",
        r#"
        [http]
        port = "not-a-number
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration") || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn typing_config_exposes_durations() {
    let defaults = TypingConfig::default();
    assert_eq!(defaults.cooldown(), std::time::Duration::from_secs(2));
    assert_eq!(defaults.timeout(), std::time::Duration::from_secs(3));
}

#[test]
fn http_config_defaults_match_expected_host_and_port() {
    let defaults = HttpConfig::default();
    assert_eq!(defaults.address, "127.0.0.1");
    assert_eq!(defaults.port, 7070);
}

// ABOUTME: Tests for configuration loading from TOML files and environment variables
// ABOUTME: Env-mutating tests run serially to avoid cross-test contamination

use cable::config::Config;
use serial_test::serial;
use std::io::Write;
use std::path::Path;

const CONFIG_ENV_VARS: &[&str] = &[
    "CABLE_CONFIG_PATH",
    "PORT",
    "BIND_ADDRESS",
    "SLACK_TOKEN",
    "SLACK_APP_TOKEN",
    "SLACK_RELAYED_CHANNEL",
    "SLACK_BOT_USER_ID",
    "TELEGRAM_TOKEN",
    "TELEGRAM_RELAYED_CHANNEL",
    "TELEGRAM_BOT_USER_ID",
];

/// Helper to clear all config-related env vars
fn clear_config_env_vars() {
    for var in CONFIG_ENV_VARS {
        std::env::remove_var(var);
    }
}

fn set_required_env_vars() {
    std::env::set_var("SLACK_TOKEN", "xoxb-env");
    std::env::set_var("SLACK_APP_TOKEN", "xapp-env");
    std::env::set_var("SLACK_RELAYED_CHANNEL", "CENV");
    std::env::set_var("TELEGRAM_TOKEN", "123:env");
    std::env::set_var("TELEGRAM_RELAYED_CHANNEL", "-100999");
}

fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("cable.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

const FULL_CONFIG: &str = r#"
[server]
port = 9000
bind_address = "127.0.0.1"

[slack]
bot_token = "xoxb-file"
app_token = "xapp-file"
relayed_channel = "CFILE"

[telegram]
bot_token = "123:file"
relayed_chat = -100123
bot_user_id = 77
"#;

#[test]
#[serial]
fn test_config_loads_from_toml_file() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), FULL_CONFIG);

    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.server.port, 9000);
    assert_eq!(config.listen_address(), "127.0.0.1:9000");
    assert_eq!(config.slack.bot_token, "xoxb-file");
    assert_eq!(config.slack.relayed_channel, "CFILE");
    assert!(config.slack.bot_user_id.is_empty());
    assert_eq!(config.telegram.relayed_chat, -100123);
    assert_eq!(config.telegram.bot_user_id, 77);
}

#[test]
#[serial]
fn test_config_path_from_env() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), FULL_CONFIG);
    std::env::set_var("CABLE_CONFIG_PATH", &path);

    assert_eq!(Config::config_path(), path);
    let config = Config::load().unwrap();
    assert_eq!(config.slack.relayed_channel, "CFILE");

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_env_overrides_file_values() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), FULL_CONFIG);

    std::env::set_var("PORT", ":3000");
    std::env::set_var("SLACK_RELAYED_CHANNEL", "COVERRIDE");
    std::env::set_var("SLACK_BOT_USER_ID", "UBOT");
    std::env::set_var("TELEGRAM_BOT_USER_ID", "12345");

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.slack.relayed_channel, "COVERRIDE");
    assert_eq!(config.slack.bot_user_id, "UBOT");
    assert_eq!(config.telegram.bot_user_id, 12345);
    assert_eq!(config.slack.bot_token, "xoxb-file");

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_env_only_config_without_file() {
    clear_config_env_vars();
    set_required_env_vars();
    let dir = tempfile::tempdir().unwrap();

    let config = Config::load_from(&dir.path().join("missing.toml")).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.bind_address, "0.0.0.0");
    assert_eq!(config.slack.app_token, "xapp-env");
    assert_eq!(config.telegram.relayed_chat, -100999);
    assert_eq!(config.telegram.bot_user_id, 0);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_missing_required_values_fail() {
    clear_config_env_vars();
    set_required_env_vars();
    std::env::remove_var("SLACK_APP_TOKEN");
    let dir = tempfile::tempdir().unwrap();

    let err = Config::load_from(&dir.path().join("missing.toml"))
        .unwrap_err()
        .to_string();
    assert!(err.contains("SLACK_APP_TOKEN"), "unexpected error: {}", err);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_swapped_slack_tokens_fail() {
    clear_config_env_vars();
    set_required_env_vars();
    std::env::set_var("SLACK_APP_TOKEN", "xoxb-env");
    let dir = tempfile::tempdir().unwrap();

    let err = Config::load_from(&dir.path().join("missing.toml"))
        .unwrap_err()
        .to_string();
    assert!(err.contains("xapp-"), "unexpected error: {}", err);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_invalid_numeric_env_values_fail() {
    clear_config_env_vars();
    set_required_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.toml");

    std::env::set_var("TELEGRAM_RELAYED_CHANNEL", "general");
    assert!(Config::load_from(&missing).is_err());

    std::env::set_var("TELEGRAM_RELAYED_CHANNEL", "-100999");
    std::env::set_var("TELEGRAM_BOT_USER_ID", "-5");
    assert!(Config::load_from(&missing).is_err());

    std::env::remove_var("TELEGRAM_BOT_USER_ID");
    std::env::set_var("PORT", "eighty");
    assert!(Config::load_from(&missing).is_err());

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_malformed_toml_fails() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[slack\nbot_token = ");

    let err = Config::load_from(&path).unwrap_err().to_string();
    assert!(err.contains("Failed to parse"), "unexpected error: {}", err);
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use salesbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run(options: LoadOptions) -> String {
    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let entries: [(&str, String, &[&str]); 15] = [
        ("database.url", config.database.url.clone(), &["SALESBOT_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["SALESBOT_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["SALESBOT_DATABASE_TIMEOUT_SECS"],
        ),
        ("llm.provider", format!("{:?}", config.llm.provider), &["SALESBOT_LLM_PROVIDER"]),
        ("llm.model", config.llm.model.clone(), &["SALESBOT_LLM_MODEL"]),
        ("llm.base_url", config.llm.effective_base_url(), &["SALESBOT_LLM_BASE_URL"]),
        ("llm.api_key", api_key, &["SALESBOT_LLM_API_KEY", "OPENAI_API_KEY"]),
        ("llm.temperature", config.llm.temperature.to_string(), &["SALESBOT_LLM_TEMPERATURE"]),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["SALESBOT_LLM_TIMEOUT_SECS"]),
        (
            "dialogue.default_language",
            config.dialogue.default_language.name().to_string(),
            &["SALESBOT_DIALOGUE_DEFAULT_LANGUAGE"],
        ),
        (
            "dialogue.max_steps_per_turn",
            config.dialogue.max_steps_per_turn.to_string(),
            &["SALESBOT_DIALOGUE_MAX_STEPS_PER_TURN"],
        ),
        (
            "dialogue.confirm_read_only_tools",
            config.dialogue.confirm_read_only_tools.to_string(),
            &["SALESBOT_DIALOGUE_CONFIRM_READ_ONLY_TOOLS"],
        ),
        (
            "dialogue.show_tool_output",
            config.dialogue.show_tool_output.to_string(),
            &["SALESBOT_DIALOGUE_SHOW_TOOL_OUTPUT"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["SALESBOT_LOGGING_LEVEL", "SALESBOT_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["SALESBOT_LOGGING_FORMAT", "SALESBOT_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in entries {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }
    lines.join("\n")
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    [PathBuf::from("salesbot.toml"), PathBuf::from("config/salesbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognizable prefix of `sk-...` style keys and hides the rest.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

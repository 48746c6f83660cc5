use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chainflow_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

struct ConfigSource {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ConfigField {
    key: String,
    value: String,
    source: String,
}

#[derive(Debug, Serialize)]
struct PolicyView {
    kind: String,
    requires_document_signing: bool,
    comments_required_on_approval: bool,
    amount_required: bool,
}

#[derive(Debug, Serialize)]
struct EffectiveConfig {
    precedence: &'static str,
    fields: Vec<ConfigField>,
    policies: Vec<PolicyView>,
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let path = detect_config_path(options.config_path.as_deref());
    let source = ConfigSource { doc: load_config_file_doc(path.as_deref()), path };

    let scalar_fields: [(&str, String, &[&str]); 5] = [
        ("database.url", config.database.url.clone(), &["CHAINFLOW_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["CHAINFLOW_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["CHAINFLOW_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["CHAINFLOW_LOGGING_LEVEL", "CHAINFLOW_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["CHAINFLOW_LOGGING_FORMAT", "CHAINFLOW_LOG_FORMAT"],
        ),
    ];
    let mut fields: Vec<ConfigField> = scalar_fields
        .into_iter()
        .map(|(key, value, env_keys)| field(key, value, field_source(key, env_keys, &source)))
        .collect();

    let rule_ids: Vec<&str> = config.routing.rules.iter().map(|rule| rule.id.as_str()).collect();
    fields.push(field(
        "routing.rules",
        format!("[{}]", rule_ids.join(", ")),
        field_source("routing.rules", &[], &source),
    ));
    fields.push(field(
        "directory",
        format!("{} approver(s)", config.directory.len()),
        field_source("directory", &[], &source),
    ));

    let policies = config
        .routing
        .policies
        .iter()
        .map(|policy| PolicyView {
            kind: policy.kind.to_string(),
            requires_document_signing: policy.requires_document_signing,
            comments_required_on_approval: policy.comments_required_on_approval,
            amount_required: policy.amount_required,
        })
        .collect();

    let effective = EffectiveConfig {
        precedence: "override > env > file > default",
        fields,
        policies,
    };
    let correlation_id = uuid::Uuid::new_v4().to_string();
    CommandResult::success_with_data("config", "effective configuration", &correlation_id, &effective)
}

fn field(key: &str, value: String, source: String) -> ConfigField {
    ConfigField { key: key.to_string(), value, source }
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("chainflow.toml"), PathBuf::from("config/chainflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_keys: &[&str], source: &ConfigSource) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = &source.doc {
        if contains_path(doc, key_path) {
            let file_path = source
                .path
                .as_deref()
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

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::contains_path;

    #[test]
    fn nested_keys_are_found_in_the_config_document() {
        let doc: Value = r#"
[database]
url = "sqlite://x.db"

[[routing.rules]]
id = "r"
"#
        .parse()
        .expect("toml");

        assert!(contains_path(&doc, "database.url"));
        assert!(contains_path(&doc, "routing.rules"));
        assert!(!contains_path(&doc, "logging.level"));
    }
}

//! `.env.<name>` rendering.

use serde::{Deserialize, Serialize};

use super::app::EnvMap;

/// A known environment key and its human label (`[[env_keys]]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvKey {
    pub value: String,
    pub label: String,
}

/// `common` overlaid with `env`. Keys keep their first position.
pub fn merge_env(common: &EnvMap, env: &EnvMap) -> EnvMap {
    let mut merged = common.clone();
    for (key, value) in env {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render an env file body.
///
/// Null values are dropped. Keys are ordered by their position in `keys`;
/// unknown keys sort first and keep their relative order. Each entry is an
/// optional `# <label>` line followed by `VITE_<KEY> = <value>`, with entries
/// separated by a blank line.
pub fn render_env_file(values: &EnvMap, keys: &[EnvKey]) -> String {
    let position = |key: &str| keys.iter().position(|k| k.value == key);

    let mut entries: Vec<(&String, &serde_json::Value)> =
        values.iter().filter(|(_, v)| !v.is_null()).collect();
    // Stable sort: unknown (None) before any known position
    entries.sort_by_key(|(key, _)| position(key));

    entries
        .into_iter()
        .map(|(key, value)| {
            let label = keys
                .iter()
                .find(|k| &k.value == key)
                .map(|k| k.label.as_str())
                .unwrap_or("");
            let line = format!("VITE_{} = {}", key, render_value(value));
            if label.is_empty() {
                line
            } else {
                format!("# {}\n{}", label, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: serde_json::Value) -> EnvMap {
        value.as_object().cloned().unwrap()
    }

    fn key(value: &str, label: &str) -> EnvKey {
        EnvKey {
            value: value.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn test_merge_env_env_wins_common_order_first() {
        let merged = merge_env(
            &map(json!({ "API": "common", "TITLE": "Shop" })),
            &map(json!({ "DEBUG": true, "API": "prod" })),
        );
        let keys: Vec<_> = merged.keys().cloned().collect();
        assert_eq!(keys, vec!["API", "TITLE", "DEBUG"]);
        assert_eq!(merged["API"], json!("prod"));
    }

    #[test]
    fn test_render_env_file() {
        let values = map(json!({
            "TITLE": "Shop",
            "EXTRA": 3,
            "API": "https://api.example.com",
            "UNSET": null,
        }));
        let keys = [key("API", "Backend address"), key("TITLE", "")];

        assert_eq!(
            render_env_file(&values, &keys),
            "VITE_EXTRA = 3\n\n# Backend address\nVITE_API = https://api.example.com\n\nVITE_TITLE = Shop"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_env_file(&EnvMap::new(), &[]), "");
    }
}

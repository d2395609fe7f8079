//! `code-inject`: uncomment marked blocks and fill in the app config.
//!
//! ```text
//! // TODO: #code_inject
//! // const APP = __APP_CONFIG__;
//! // TODO: #end_code_inject
//! ```
//!
//! becomes `const APP = {"name":...};`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::core::App;

/// Placeholder replaced by the app's base config JSON.
pub const APP_CONFIG_PLACEHOLDER: &str = "__APP_CONFIG__";

static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"//\s*TODO:\s*#code_inject\s*((?s:.*?))\s*//\sTODO:\s*#end_code_inject[ ]*")
        .expect("code_inject block pattern is valid")
});

static LEADING_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^//\s*").expect("leading comment pattern is valid"));

pub fn code_inject(source: &str, app: &App) -> String {
    let config = app.base_config_json().to_string();

    BLOCK
        .replace_all(source, |caps: &Captures<'_>| {
            let body = LEADING_COMMENT.replace(&caps[1], "");
            body.replace(APP_CONFIG_PLACEHOLDER, &config)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::{resolve_apps, AppConfig};
    use std::path::Path;

    fn app() -> App {
        let config = AppConfig {
            name: "main".to_string(),
            description: "Shop".to_string(),
            ..AppConfig::default()
        };
        resolve_apps(&[config], "acme", Path::new("apps"))
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_injects_config() {
        let source = "before\n// TODO: #code_inject\n// export const APP = __APP_CONFIG__;\n// TODO: #end_code_inject\nafter\n";
        let out = code_inject(source, &app());

        assert!(out.starts_with("before\nexport const APP = {"));
        assert!(out.contains(r#""name":"main""#));
        assert!(out.contains(r#""description":"Shop""#));
        assert!(out.ends_with(";\nafter\n"));
        assert!(!out.contains("TODO"));
    }

    #[test]
    fn test_only_first_comment_removed() {
        let source = "// TODO: #code_inject\n// a();\n// b();\n// TODO: #end_code_inject";
        assert_eq!(code_inject(source, &app()), "a();\n// b();");
    }

    #[test]
    fn test_untouched_without_markers() {
        let source = "const x = 1; // TODO: later";
        assert_eq!(code_inject(source, &app()), source);
    }
}

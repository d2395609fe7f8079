//! `code-custom-if`: keep a marked block only for matching apps.
//!
//! ```text
//! // TODO: #code_cu_if_app(app.env.MODE === "mall")
//! import Mall from "./mall.vue";
//! // TODO: #end_code_cu_if_app
//! ```

use std::sync::LazyLock;

use regex::Regex;

use super::condition::{Condition, ConditionError};
use crate::core::App;

static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"//\s*TODO:\s*#code_cu_if_app\(([^\n]+?)\)\s*((?s:.*?))\s*//\sTODO:\s*#end_code_cu_if_app\s*",
    )
    .expect("code_cu_if_app block pattern is valid")
});

pub fn code_custom_if(source: &str, app: &App) -> Result<String, ConditionError> {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for caps in BLOCK.captures_iter(source) {
        let (Some(block), Some(cond), Some(body)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        out.push_str(&source[last..block.start()]);
        if Condition::parse(cond.as_str())?.eval(app)? {
            out.push_str(body.as_str());
        }
        last = block.end();
    }

    out.push_str(&source[last..]);
    Ok(out)
}

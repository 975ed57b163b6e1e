//! Step type tags such as `[SEARCH]` embedded in step content.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([A-Z_]+)\]").unwrap());

/// First uppercase `[TAG]` in `content`, without the brackets.
pub fn step_tag(content: &str) -> Option<&str> {
    TAG_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

//! Permission graph of legal input → output format pairs.
//!
//! The table only says *whether* a pair may be requested; the engines decide
//! *how*. Inputs without an entry are not gated here at all.

use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const CONVERSION_RULES: &[(&str, &[&str])] = &[
    ("pdf", &["html", "markdown", "text"]),
    ("markdown", &["html", "pdf"]),
    ("html", &["pdf", "markdown"]),
    ("csv", &["json", "xlsx"]),
    ("json", &["csv", "toml", "yaml", "ini", "xml", "ndjson"]),
    ("yaml", &["json"]),
    ("ini", &["json"]),
    ("xml", &["json"]),
    ("ndjson", &["json"]),
    ("png", &["jpg", "webp"]),
    ("jpg", &["png", "webp"]),
    ("webp", &["png", "jpg"]),
];

static RULE_INDEX: Lazy<HashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| CONVERSION_RULES.iter().copied().collect());

/// Ordered permitted outputs for `input`; empty when no rule exists.
pub fn allowed(input: &str) -> &'static [&'static str] {
    RULE_INDEX.get(input).copied().unwrap_or(&[])
}

/// `true` when `input` has no rule or its rule lists `target`.
pub fn permits(input: &str, target: &str) -> bool {
    let outputs = allowed(input);
    outputs.is_empty() || outputs.contains(&target)
}

//! Environment substitution for administrator-supplied values.
//!
//! `$(NAME)` is replaced by the environment variable `NAME`, and
//! `$(NAME:fallback)` falls back to `fallback` when the variable is unset or
//! empty. Unknown variables without a fallback expand to the empty string.

use std::sync::OnceLock;

use regex::{Captures, Regex};

fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\(([A-Z0-9_]+)(?::([^)]*))?\)").expect("placeholder pattern is valid")
    })
}

/// Expand placeholders using the process environment.
pub fn parse_config_value(value: &str) -> String {
    expand_with(value, |name| std::env::var(name).ok())
}

/// Expand placeholders using an arbitrary lookup.
pub fn expand_with<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    placeholder()
        .replace_all(value, |caps: &Captures<'_>| {
            lookup(&caps[1])
                .filter(|v| !v.is_empty())
                .or_else(|| caps.get(2).map(|d| d.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

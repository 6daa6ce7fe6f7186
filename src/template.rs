//! `{name}` placeholders in prompt templates and plan asks.

use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\w+)\}").unwrap());

/// Replace every `{name}` in `template` with `lookup(name)` in a single pass.
/// Inserted text is never rescanned; names `lookup` rejects stay as written.
pub(crate) fn fill_with<'v>(template: &str, lookup: impl Fn(&str) -> Option<&'v str>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| match lookup(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

pub(crate) fn fill<'v>(template: &str, values: &[(&str, &'v str)]) -> String {
    fill_with(template, |name| {
        values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|&(_, value)| value)
    })
}

//! Placeholder templatization for captured items.
//!
//! A captured solution must not carry the concrete identifiers of the
//! portal it came from. Every identifier that will be different in the
//! target portal is frozen into a placeholder token:
//!
//! ```text
//! {{<identifier>.<parameter>}}      e.g. {{6f2a91c0.id}}  {{6f2a91c0.url}}
//! ```
//!
//! At deployment time each token is thawed back into the value recorded for
//! `<identifier>` once that item has been created. The parameter defaults to
//! `id`; other parameters name post-creation facts such as `url`.
//!
//! The token syntax is the only artifact this crate persists on its own
//! terms, so anything that serializes items must keep it byte-for-byte.
//!
//! # Examples
//!
//! ```rust
//! use solkit_cli::templating::{detemplatize, templatize, templatize_with};
//!
//! assert_eq!(templatize("abc"), "{{abc.id}}");
//! assert_eq!(templatize_with("abc", "url"), "{{abc.url}}");
//! assert_eq!(templatize("{{abc.id}}"), "{{abc.id}}");
//! assert_eq!(detemplatize("{{abc.url}}"), "abc");
//! assert_eq!(detemplatize("abc"), "abc");
//! ```

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

/// Opening marker of a placeholder token.
pub const PLACEHOLDER_START: &str = "{{";
/// Closing marker of a placeholder token.
pub const PLACEHOLDER_END: &str = "}}";
/// Parameter used when none is given.
pub const DEFAULT_PARAM: &str = "id";

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([^{}.\s]+)\.([^{}\s]+)\}\}").expect("placeholder pattern is valid")
});

/// Convert an identifier into its `{{id.id}}` placeholder.
///
/// Already-templatized input is returned unchanged.
pub fn templatize(id: &str) -> String {
    templatize_with(id, DEFAULT_PARAM)
}

/// Convert an identifier into a placeholder naming `param`.
pub fn templatize_with(id: &str, param: &str) -> String {
    if is_templatized(id) {
        return id.to_string();
    }
    format!("{PLACEHOLDER_START}{id}.{param}{PLACEHOLDER_END}")
}

/// Element-wise [`templatize`].
pub fn templatize_all<S: AsRef<str>>(ids: &[S]) -> Vec<String> {
    ids.iter().map(|id| templatize(id.as_ref())).collect()
}

/// Recover the identifier from a placeholder.
///
/// Returns the text between the opening marker and the first `.`; input that
/// does not start with the marker is returned unchanged.
pub fn detemplatize(token: &str) -> String {
    let Some(rest) = token.strip_prefix(PLACEHOLDER_START) else {
        return token.to_string();
    };
    let end = rest.find('.').or_else(|| rest.find(PLACEHOLDER_END)).unwrap_or(rest.len());
    rest[..end].to_string()
}

/// Element-wise [`detemplatize`].
pub fn detemplatize_all<S: AsRef<str>>(tokens: &[S]) -> Vec<String> {
    tokens.iter().map(|token| detemplatize(token.as_ref())).collect()
}

/// Whether the string already starts with the placeholder marker.
pub fn is_templatized(value: &str) -> bool {
    value.starts_with(PLACEHOLDER_START)
}

/// A placeholder found inside a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    /// Original item identifier
    pub id: String,
    /// Parameter name (`id`, `url`, ...)
    pub param: String,
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PLACEHOLDER_START}{}.{}{PLACEHOLDER_END}", self.id, self.param)
    }
}

/// List every placeholder in `text`, in order of appearance.
pub fn placeholders(text: &str) -> Vec<Placeholder> {
    PLACEHOLDER_RE
        .captures_iter(text)
        .map(|caps| Placeholder {
            id: caps[1].to_string(),
            param: caps[2].to_string(),
        })
        .collect()
}

/// List every placeholder in every string scalar of a JSON tree.
pub fn placeholders_in_value(value: &Value) -> Vec<Placeholder> {
    let mut found = Vec::new();
    collect_placeholders(value, &mut found);
    found
}

fn collect_placeholders(value: &Value, found: &mut Vec<Placeholder>) {
    match value {
        Value::String(s) => found.extend(placeholders(s)),
        Value::Array(items) => items.iter().for_each(|v| collect_placeholders(v, found)),
        Value::Object(map) => map.values().for_each(|v| collect_placeholders(v, found)),
        _ => {}
    }
}

/// Rewrite every raw occurrence of `id` inside `text` into `{{id.id}}`.
///
/// Only whole identifiers match: an occurrence directly preceded or followed
/// by an identifier character (`svc1` inside `svc10`) is left alone. Text
/// that is already inside a placeholder is skipped too, which makes the
/// operation idempotent.
pub fn templatize_text(text: &str, id: &str) -> String {
    if id.is_empty() || !text.contains(id) {
        return text.to_string();
    }

    let token = templatize(id);
    let mut out = String::with_capacity(text.len() + 8);
    let mut cursor = 0;
    for m in PLACEHOLDER_RE.find_iter(text) {
        out.push_str(&replace_whole(&text[cursor..m.start()], id, &token));
        out.push_str(m.as_str());
        cursor = m.end();
    }
    out.push_str(&replace_whole(&text[cursor..], id, &token));
    out
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn replace_whole(segment: &str, id: &str, token: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut cursor = 0;
    for (start, _) in segment.match_indices(id) {
        let end = start + id.len();
        let glued = segment[..start].chars().next_back().is_some_and(is_identifier_char)
            || segment[end..].chars().next().is_some_and(is_identifier_char);
        if glued {
            continue;
        }
        out.push_str(&segment[cursor..start]);
        out.push_str(token);
        cursor = end;
    }
    out.push_str(&segment[cursor..]);
    out
}

/// Apply [`templatize_text`] for each of `ids` to every string in a JSON tree.
///
/// Longer ids are tried first. Returns the number of string values that
/// changed.
pub fn templatize_value<S: AsRef<str>>(value: &mut Value, ids: &[S]) -> usize {
    let mut ordered: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
    ordered.sort_by_key(|id| std::cmp::Reverse(id.len()));
    templatize_ordered(value, &ordered)
}

fn templatize_ordered(value: &mut Value, ids: &[&str]) -> usize {
    match value {
        Value::String(s) => {
            let mut rewritten = s.clone();
            for id in ids {
                rewritten = templatize_text(&rewritten, id);
            }
            if rewritten == *s {
                0
            } else {
                *s = rewritten;
                1
            }
        }
        Value::Array(items) => items.iter_mut().map(|v| templatize_ordered(v, ids)).sum(),
        Value::Object(map) => map.values_mut().map(|v| templatize_ordered(v, ids)).sum(),
        _ => 0,
    }
}

/// Outcome of looking up a single placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Substitute this value
    Value(String),
    /// Leave the token in place to be resolved later
    Defer,
    /// No value is known for this placeholder
    Missing,
}

/// Source of values for placeholder resolution.
pub trait PlaceholderLookup {
    /// Look up the value for `param` of the item originally called `id`.
    fn lookup(&self, id: &str, param: &str) -> Lookup;
}

impl<F> PlaceholderLookup for F
where
    F: Fn(&str, &str) -> Lookup,
{
    fn lookup(&self, id: &str, param: &str) -> Lookup {
        self(id, param)
    }
}

/// Substitute every placeholder in `text`.
///
/// Fails with the first placeholder whose lookup is [`Lookup::Missing`].
pub fn resolve_text(text: &str, lookup: &dyn PlaceholderLookup) -> Result<String, Placeholder> {
    if !text.contains(PLACEHOLDER_START) {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for caps in PLACEHOLDER_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[cursor..whole.start()]);
        match lookup.lookup(&caps[1], &caps[2]) {
            Lookup::Value(v) => out.push_str(&v),
            Lookup::Defer => out.push_str(whole.as_str()),
            Lookup::Missing => {
                return Err(Placeholder {
                    id: caps[1].to_string(),
                    param: caps[2].to_string(),
                });
            }
        }
        cursor = whole.end();
    }
    out.push_str(&text[cursor..]);
    Ok(out)
}

/// Substitute placeholders in every string scalar of a JSON tree, in place.
pub fn resolve_value(value: &mut Value, lookup: &dyn PlaceholderLookup) -> Result<(), Placeholder> {
    match value {
        Value::String(s) => {
            *s = resolve_text(s, lookup)?;
            Ok(())
        }
        Value::Array(items) => items.iter_mut().try_for_each(|v| resolve_value(v, lookup)),
        Value::Object(map) => map.values_mut().try_for_each(|v| resolve_value(v, lookup)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_and_idempotence() {
        for id in ["abc", "6f2a91c0b1e94c4d", "with-dash_and_underscore"] {
            let token = templatize(id);
            assert_eq!(detemplatize(&token), id);
            assert_eq!(templatize(&token), token);
        }
    }

    #[test]
    fn test_detemplatize_plain_is_noop() {
        assert_eq!(detemplatize("plain"), "plain");
        assert_eq!(detemplatize(""), "");
    }

    #[test]
    fn test_detemplatize_without_dot() {
        assert_eq!(detemplatize("{{abc}}"), "abc");
    }

    #[test]
    fn test_sequence_variants() {
        let ids = vec!["a", "{{b.id}}"];
        let tokens = templatize_all(&ids);
        assert_eq!(tokens, vec!["{{a.id}}", "{{b.id}}"]);
        assert_eq!(detemplatize_all(&tokens), vec!["a", "b"]);
    }

    #[test]
    fn test_placeholders_finds_all_tokens() {
        let found = placeholders("https://x/{{a.url}}/items/{{b.id}}?x=1");
        assert_eq!(
            found,
            vec![
                Placeholder {
                    id: "a".into(),
                    param: "url".into()
                },
                Placeholder {
                    id: "b".into(),
                    param: "id".into()
                },
            ]
        );
    }

    #[test]
    fn test_templatize_text_skips_existing_tokens() {
        let once = templatize_text("apps/abc?appid=abc", "abc");
        assert_eq!(once, "apps/{{abc.id}}?appid={{abc.id}}");
        assert_eq!(templatize_text(&once, "abc"), once);
    }

    #[test]
    fn test_templatize_matches_whole_identifiers_only() {
        let mut body = json!({"a": "svc10", "b": "svc1", "c": "layers svc1,svc10 and svc100x"});
        templatize_value(&mut body, &["svc1", "svc10"]);
        assert_eq!(body["a"], "{{svc10.id}}");
        assert_eq!(body["b"], "{{svc1.id}}");
        assert_eq!(body["c"], "layers {{svc1.id}},{{svc10.id}} and svc100x");

        assert_eq!(templatize_text("svc10/FeatureServer", "svc1"), "svc10/FeatureServer");
        assert_eq!(templatize_text("my-svc1", "svc1"), "my-svc1");
    }

    #[test]
    fn test_templatize_value_counts_changes() {
        let mut body = json!({
            "layers": [{"itemId": "svc1"}, {"itemId": "other"}],
            "title": "uses svc1 twice: svc1",
            "n": 3
        });
        let changed = templatize_value(&mut body, &["svc1"]);
        assert_eq!(changed, 2);
        assert_eq!(body["layers"][0]["itemId"], "{{svc1.id}}");
        assert_eq!(body["layers"][1]["itemId"], "other");
    }

    #[test]
    fn test_resolve_text_with_defer_and_missing() {
        let lookup = |id: &str, param: &str| match (id, param) {
            ("a", "id") => Lookup::Value("new-a".to_string()),
            ("self", _) => Lookup::Defer,
            _ => Lookup::Missing,
        };
        assert_eq!(resolve_text("{{a.id}}-{{self.id}}", &lookup).unwrap(), "new-a-{{self.id}}");
        let err = resolve_text("{{zzz.url}}", &lookup).unwrap_err();
        assert_eq!(err.to_string(), "{{zzz.url}}");
    }

    #[test]
    fn test_resolve_value_walks_tree() {
        let mut body = json!({"a": ["{{x.id}}", {"b": "pre {{x.url}} post"}]});
        let lookup = |_: &str, param: &str| Lookup::Value(format!("X-{param}"));
        resolve_value(&mut body, &lookup).unwrap();
        assert_eq!(body, json!({"a": ["X-id", {"b": "pre X-url post"}]}));
    }
}

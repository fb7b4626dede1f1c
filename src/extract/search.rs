//! Recursive field search over JSON bodies.

use serde_json::Value;

/// A value found under a matching key, with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch<'a> {
    /// JSON-pointer style path of the matched value
    pub path: String,
    /// The matched value
    pub value: &'a Value,
}

/// Collect the value of every key named `field`, at any depth.
///
/// Walks objects and each element of arrays. Matches are not searched
/// further, so a `webmap` object nested inside another `webmap` is reported
/// once. Null branches are simply empty.
pub fn find_field_values<'a>(body: &'a Value, field: &str) -> Vec<FieldMatch<'a>> {
    let mut found = Vec::new();
    walk(body, field, String::new(), &mut found);
    found
}

fn walk<'a>(value: &'a Value, field: &str, path: String, found: &mut Vec<FieldMatch<'a>>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = format!("{path}/{key}");
                if key == field {
                    found.push(FieldMatch {
                        path: child_path,
                        value: child,
                    });
                } else {
                    walk(child, field, child_path, found);
                }
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk(child, field, format!("{path}/{i}"), found);
            }
        }
        _ => {}
    }
}

/// Follow a dotted path (`values.story.sections`) through nested objects.
pub fn lookup_path<'a>(body: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(body, |current, key| current.get(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finds_nested_fields_in_maps_and_arrays() {
        let body = json!({
            "a": {"webmap": "one"},
            "list": [{"x": {"webmap": {"id": "two"}}}, null, 5],
            "webmap": "three"
        });
        let mut values: Vec<String> =
            find_field_values(&body, "webmap").iter().map(|m| m.value.to_string()).collect();
        values.sort();
        assert_eq!(values, vec!["\"one\"", "\"three\"", "{\"id\":\"two\"}"]);
    }

    #[test]
    fn test_reports_paths() {
        let body = json!({"list": [{"webmap": "x"}]});
        let found = find_field_values(&body, "webmap");
        assert_eq!(found[0].path, "/list/0/webmap");
    }

    #[test]
    fn test_null_body_yields_nothing() {
        assert!(find_field_values(&Value::Null, "webmap").is_empty());
    }

    #[test]
    fn test_lookup_path() {
        let body = json!({"values": {"story": {"sections": [1]}}});
        assert_eq!(lookup_path(&body, "values.story.sections"), Some(&json!([1])));
        assert_eq!(lookup_path(&body, "values.missing"), None);
    }
}

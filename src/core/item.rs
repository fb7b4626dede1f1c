//! Content items and their kind tags.
//!
//! An [`Item`] is the unit solkit captures, orders and deploys. Its `body`
//! is an opaque JSON tree whose shape depends on the item's kind; the
//! per-kind handlers in [`crate::handlers`] know how to read it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known kind tags understood by the built-in handlers.
pub mod kinds {
    /// Web map: layers and tables reference services by `itemId`
    pub const WEB_MAP: &str = "Web Map";
    /// Web application configured with a web map or group
    pub const WEB_MAPPING_APPLICATION: &str = "Web Mapping Application";
    /// Operations dashboard with typed widgets
    pub const DASHBOARD: &str = "Dashboard";
    /// Classic story map (Cascade, Map Journal, Map Series, ...)
    pub const STORY_MAP: &str = "Story Map";
    /// Express story map
    pub const STORYMAP: &str = "StoryMap";
    /// Group whose membership is listed remotely
    pub const GROUP: &str = "Group";
    /// Hosted feature service
    pub const FEATURE_SERVICE: &str = "Feature Service";
    /// Survey form
    pub const FORM: &str = "Form";
}

/// Default deployment cost factor for items whose handler does not refine it.
pub const DEFAULT_COST_FACTOR: f64 = 3.0;

/// A unit of content with an identifier, a kind, a body and dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Identifier, unique within a solution.
    pub id: String,
    /// Kind tag selecting extraction and deployment rules.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Keywords used by some kinds to select a sub-strategy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_keywords: Vec<String>,
    /// Item URL, often self-referential for applications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Item-level metadata passed through to the remote create call.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    /// Kind specific content.
    #[serde(default)]
    pub body: Value,
    /// Identifiers this item depends on (raw before freeze, placeholders after).
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Names of auxiliary resources stored alongside the item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    /// Relative deployment cost, used only to weight progress.
    #[serde(default = "default_cost_factor", rename = "estimatedDeploymentCostFactor")]
    pub cost_factor: f64,
}

fn default_cost_factor() -> f64 {
    DEFAULT_COST_FACTOR
}

impl Item {
    /// Create an item with an empty body.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            title: String::new(),
            type_keywords: Vec::new(),
            url: None,
            properties: Map::new(),
            body: Value::Null,
            dependencies: Vec::new(),
            resources: Vec::new(),
            cost_factor: DEFAULT_COST_FACTOR,
        }
    }

    /// Builder-style body setter.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Builder-style title setter.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Builder-style dependency list setter.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style keyword setter.
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style URL setter.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Case-insensitive keyword check.
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.type_keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword))
    }

    /// Display name used in progress output: title when present, id otherwise.
    pub fn display_name(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_serializes_with_portal_field_names() {
        let item = Item::new("abc", kinds::WEB_MAP).with_dependencies(["svc"]);
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "Web Map");
        assert_eq!(value["estimatedDeploymentCostFactor"], 3.0);
        assert_eq!(value["dependencies"], json!(["svc"]));
        assert!(value.get("typeKeywords").is_none());
    }

    #[test]
    fn test_item_deserializes_with_defaults() {
        let item: Item = serde_json::from_value(json!({"id": "x", "type": "Form"})).unwrap();
        assert_eq!(item.cost_factor, DEFAULT_COST_FACTOR);
        assert!(item.dependencies.is_empty());
        assert_eq!(item.body, Value::Null);
        assert_eq!(item.display_name(), "x");
    }

    #[test]
    fn test_has_keyword_ignores_case() {
        let item = Item::new("s", kinds::STORY_MAP).with_keywords(["Story Map", "MapSeries"]);
        assert!(item.has_keyword("mapseries"));
        assert!(!item.has_keyword("Cascade"));
    }
}

//! Story map handlers.
//!
//! Classic story maps come in several templates that keep their sections
//! in different places. The template is announced by a type keyword, which
//! selects a [`StoryStrategy`]. Within the chosen scope every `webmap`
//! field is collected, whether it holds an id string or an object with an
//! `id`. Express story maps keep web maps as typed resources instead.

use serde_json::Value;

use super::ItemHandler;
use crate::core::{Item, kinds};
use crate::extract::{Extraction, id_from_reference, search, type_name};

/// Field name that carries web map references in story bodies.
pub const WEBMAP_FIELD: &str = "webmap";

/// Sub-strategy used to locate dependency-bearing sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryStrategy {
    /// Cascade: `values.story.sections`
    Cascade,
    /// Map Journal: `values.story.sections`
    MapJournal,
    /// Map Series: `values.story.entries`
    MapSeries,
    /// Express story map: `resources.*` of type `webmap`
    Express,
    /// Any other template: search the whole body
    Generic,
}

impl StoryStrategy {
    /// Pick the strategy for an item from its kind and keywords.
    pub fn select(item: &Item) -> Self {
        if item.kind == kinds::STORYMAP {
            Self::Express
        } else if item.has_keyword("Cascade") {
            Self::Cascade
        } else if item.has_keyword("MapJournal") {
            Self::MapJournal
        } else if item.has_keyword("MapSeries") {
            Self::MapSeries
        } else {
            Self::Generic
        }
    }

    /// Dotted scope path searched by this strategy, `None` for the whole body.
    pub fn scope(self) -> Option<&'static str> {
        match self {
            Self::Cascade | Self::MapJournal => Some("values.story.sections"),
            Self::MapSeries => Some("values.story.entries"),
            Self::Express => Some("resources"),
            Self::Generic => None,
        }
    }
}

/// Handler for `Story Map` and `StoryMap` items.
#[derive(Debug, Clone)]
pub struct StoryMapHandler {
    kind: &'static str,
}

impl StoryMapHandler {
    /// Handler for classic `Story Map` items.
    pub fn classic() -> Self {
        Self {
            kind: kinds::STORY_MAP,
        }
    }

    /// Handler for express `StoryMap` items.
    pub fn express() -> Self {
        Self {
            kind: kinds::STORYMAP,
        }
    }
}

impl ItemHandler for StoryMapHandler {
    fn kind(&self) -> &str {
        self.kind
    }

    fn extract_dependencies(&self, item: &Item) -> Extraction {
        let strategy = StoryStrategy::select(item);
        let scope = match strategy.scope() {
            Some(path) => match search::lookup_path(&item.body, path) {
                Some(value) => value,
                None => return Extraction::new(),
            },
            None => &item.body,
        };
        tracing::debug!("Story '{}' uses {:?} extraction", item.id, strategy);

        let mut out = Extraction::new();
        if strategy == StoryStrategy::Express {
            express_resources(item, scope, &mut out);
            return out;
        }

        for found in search::find_field_values(scope, WEBMAP_FIELD) {
            match found.value {
                Value::Null => {}
                value => match id_from_reference(value) {
                    Some(id) => out.push_id(id),
                    None => out.fault(
                        &item.id,
                        found.path,
                        format!("expected a web map reference, found {}", type_name(value)),
                    ),
                },
            }
        }
        out
    }
}

fn express_resources(item: &Item, resources: &Value, out: &mut Extraction) {
    let Some(resources) = resources.as_object() else {
        out.fault(&item.id, "resources", format!("expected an object, found {}", type_name(resources)));
        return;
    };
    for (key, resource) in resources {
        if resource.get("type").and_then(Value::as_str) != Some(WEBMAP_FIELD) {
            continue;
        }
        match resource.pointer("/data/itemId").and_then(Value::as_str) {
            Some(id) => out.push_id(id),
            None => out.fault(&item.id, format!("resources/{key}/data/itemId"), "missing web map id"),
        }
    }
}

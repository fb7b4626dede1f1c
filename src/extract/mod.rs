//! Dependency extraction.
//!
//! Extraction turns an item body into the raw identifiers of the items it
//! depends on. The rule used depends on the item's kind and lives in that
//! kind's [`ItemHandler`](crate::handlers::ItemHandler); this module owns the
//! dispatch, the result type and the shape-checking helpers the rules share.
//!
//! Extraction never fails as a whole. A body segment with the wrong shape is
//! recorded as an [`SolkitError::ExtractionFault`] and skipped, and the ids
//! found elsewhere in the body are still returned.

pub mod search;

use serde_json::Value;

use crate::core::{Item, SolkitError};
use crate::handlers::HandlerRegistry;

/// Identifiers found in one item, plus any recovered faults.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Raw identifiers, possibly with duplicates
    pub ids: Vec<String>,
    /// Malformed segments that were skipped
    pub faults: Vec<SolkitError>,
}

impl Extraction {
    /// Empty extraction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an identifier. Empty strings are ignored.
    pub fn push_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !id.is_empty() {
            self.ids.push(id);
        }
    }

    /// Record a malformed segment.
    pub fn fault(&mut self, item: &str, path: impl Into<String>, reason: impl Into<String>) {
        self.faults.push(SolkitError::ExtractionFault {
            item: item.to_string(),
            path: path.into(),
            reason: reason.into(),
        });
    }

    /// Append another extraction's ids and faults.
    pub fn merge(&mut self, other: Extraction) {
        self.ids.extend(other.ids);
        self.faults.extend(other.faults);
    }

    /// Identifiers with duplicates removed, first occurrence kept.
    pub fn unique_ids(&self) -> Vec<String> {
        dedupe(self.ids.iter().cloned())
    }
}

/// Deduplicate while keeping first-seen order.
pub fn dedupe<I: IntoIterator<Item = String>>(ids: I) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Read identifiers from an array of entries that carry an id field.
///
/// `path` is a dotted path from the body root to the array. A missing or
/// null array contributes nothing. Entries without the field are skipped
/// silently (not every layer references an item); entries of the wrong
/// shape are faults.
pub fn ids_from_entries(item: &Item, body: &Value, path: &str, field: &str, out: &mut Extraction) {
    let Some(entries) = search::lookup_path(body, path) else {
        return;
    };
    match entries {
        Value::Null => {}
        Value::Array(list) => {
            for (i, entry) in list.iter().enumerate() {
                match entry {
                    Value::Object(map) => match map.get(field) {
                        None | Some(Value::Null) => {}
                        Some(Value::String(id)) => out.push_id(id.clone()),
                        Some(other) => out.fault(
                            &item.id,
                            format!("{path}/{i}/{field}"),
                            format!("expected a string identifier, found {}", type_name(other)),
                        ),
                    },
                    other => out.fault(
                        &item.id,
                        format!("{path}/{i}"),
                        format!("expected an object, found {}", type_name(other)),
                    ),
                }
            }
        }
        other => out.fault(&item.id, path, format!("expected an array, found {}", type_name(other))),
    }
}

/// Identifier carried by a reference value: a string, or an object's `id`.
pub fn id_from_reference(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Object(map) => map.get("id").and_then(Value::as_str).filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// JSON type name for fault messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Kind-dispatching extractor over a handler registry.
pub struct DependencyExtractor<'a> {
    registry: &'a HandlerRegistry,
}

impl<'a> DependencyExtractor<'a> {
    /// Create an extractor backed by `registry`.
    pub fn new(registry: &'a HandlerRegistry) -> Self {
        Self {
            registry,
        }
    }

    /// Extract the raw dependency identifiers of `item`.
    ///
    /// Unknown kinds fall through to the generic handler and yield nothing.
    pub fn extract(&self, item: &Item) -> Extraction {
        let handler = self.registry.handler_for(&item.kind);
        let extraction = handler.extract_dependencies(item);
        for fault in &extraction.faults {
            tracing::warn!("Skipping malformed segment: {}", fault);
        }
        tracing::debug!(
            "Extracted {} reference(s) from {} '{}'",
            extraction.ids.len(),
            item.kind,
            item.id
        );
        extraction
    }
}

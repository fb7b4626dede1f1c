//! Identifier remapping table.
//!
//! One table exists per deployment run. It maps the original identifier of
//! every created item to the identifier the target portal assigned, plus
//! any other facts the create call reported (for example the new `url`).
//! Placeholders are resolved against it.
//!
//! The table only grows. Each original identifier can be recorded once; a
//! second [`RemapTable::record`] for the same key is a
//! [`SolkitError::DuplicateMapping`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::SolkitError;
use crate::store::CreatedItem;
use crate::templating::{DEFAULT_PARAM, Lookup, PlaceholderLookup};

/// What an original identifier maps to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// New identifier in the target portal
    pub id: String,
    /// Other post-creation facts, by parameter name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facts: BTreeMap<String, String>,
    /// Whether this entry points at an item outside the run
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

/// Append-only map of original identifier to [`Mapping`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemapTable {
    entries: BTreeMap<String, Mapping>,
}

impl RemapTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of creating `original`.
    ///
    /// # Errors
    ///
    /// [`SolkitError::DuplicateMapping`] if `original` was already recorded.
    pub fn record(&mut self, original: &str, created: &CreatedItem) -> Result<(), SolkitError> {
        self.insert(
            original,
            Mapping {
                id: created.id.clone(),
                facts: created.facts.clone(),
                external: false,
            },
        )
    }

    /// Record an item that lives outside the run and keeps its identifier.
    pub fn record_external(&mut self, id: &str) -> Result<(), SolkitError> {
        self.insert(
            id,
            Mapping {
                id: id.to_string(),
                facts: BTreeMap::new(),
                external: true,
            },
        )
    }

    fn insert(&mut self, original: &str, mapping: Mapping) -> Result<(), SolkitError> {
        if self.entries.contains_key(original) {
            return Err(SolkitError::DuplicateMapping {
                id: original.to_string(),
            });
        }
        tracing::debug!("Mapped '{}' to '{}'", original, mapping.id);
        self.entries.insert(original.to_string(), mapping);
        Ok(())
    }

    /// Mapping recorded for `original`.
    pub fn get(&self, original: &str) -> Option<&Mapping> {
        self.entries.get(original)
    }

    /// New identifier recorded for `original`.
    pub fn new_id(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(|m| m.id.as_str())
    }

    /// Value of placeholder parameter `param` for `original`.
    ///
    /// `id` is the new identifier; anything else is looked up in the facts.
    pub fn value(&self, original: &str, param: &str) -> Option<&str> {
        let mapping = self.entries.get(original)?;
        if param == DEFAULT_PARAM {
            Some(&mapping.id)
        } else {
            mapping.facts.get(param).map(String::as_str)
        }
    }

    /// Whether `original` has been recorded.
    pub fn contains(&self, original: &str) -> bool {
        self.entries.contains_key(original)
    }

    /// Number of recorded identifiers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Mapping)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Placeholder lookup over this table that leaves `deferred` untouched.
    pub fn lookup_deferring<'a>(&'a self, deferred: &'a str) -> TableLookup<'a> {
        TableLookup {
            table: self,
            deferred: Some(deferred),
        }
    }
}

/// [`PlaceholderLookup`] backed by a [`RemapTable`].
pub struct TableLookup<'a> {
    table: &'a RemapTable,
    deferred: Option<&'a str>,
}

impl PlaceholderLookup for TableLookup<'_> {
    fn lookup(&self, id: &str, param: &str) -> Lookup {
        if self.deferred == Some(id) {
            return Lookup::Defer;
        }
        match self.table.value(id, param) {
            Some(value) => Lookup::Value(value.to_string()),
            None => Lookup::Missing,
        }
    }
}

impl PlaceholderLookup for RemapTable {
    fn lookup(&self, id: &str, param: &str) -> Lookup {
        TableLookup {
            table: self,
            deferred: None,
        }
        .lookup(id, param)
    }
}

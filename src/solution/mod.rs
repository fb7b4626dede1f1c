//! Solution files.
//!
//! A [`Solution`] is a captured, frozen set of items: every internal
//! identifier in it has been replaced by a `{{id.param}}` placeholder and
//! every item's dependency list holds placeholders for the items it needs.
//! Solutions are stored as pretty-printed JSON and written atomically.
//!
//! ```json
//! {
//!   "name": "Field survey",
//!   "created": "2024-06-01T12:00:00Z",
//!   "items": [
//!     { "id": "svc", "type": "Feature Service", "dependencies": [] },
//!     { "id": "map", "type": "Web Map", "dependencies": ["{{svc.id}}"] }
//!   ]
//! }
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::core::{Item, SolkitError};
use crate::graph::{GraphBuilder, TopologicalSorter};
use crate::handlers::HandlerRegistry;
use crate::templating;
use crate::utils::safe_write;

/// A named collection of frozen items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub name: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<Item>,
    /// Identifiers referenced by items but deliberately left out, such as
    /// basemaps or content owned by another organisation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external: Vec<String>,
}

impl Solution {
    /// New solution stamped with the current time.
    pub fn new(name: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            name: name.into(),
            created: Utc::now(),
            items,
            external: Vec::new(),
        }
    }

    /// Record references that are expected to exist in the target portal.
    #[must_use]
    pub fn with_external(mut self, external: Vec<String>) -> Self {
        self.external = external;
        self
    }

    /// Read a solution file.
    pub fn load(path: &Path) -> Result<Self, SolkitError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| SolkitError::SolutionParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Write the solution as pretty JSON, atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        safe_write(path, &content)?;
        tracing::debug!("Wrote {} item(s) to {}", self.items.len(), path.display());
        Ok(())
    }

    /// Item with the given (original) identifier.
    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// One problem found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// Two items share an identifier.
    DuplicateId { id: String },
    /// The dependency graph has a cycle.
    Cycle { chain: String },
    /// A dependency names an item that is not part of the solution.
    DanglingDependency { item: String, dependency: String, suggestion: Option<String> },
    /// A placeholder in the content names an item that is not part of the
    /// solution and not a declared dependency.
    UnknownPlaceholder { item: String, placeholder: String },
    /// The body could not be read by the kind's handler.
    Extraction { item: String, reason: String },
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId {
                id,
            } => write!(f, "duplicate item id '{id}'"),
            Self::Cycle {
                chain,
            } => write!(f, "dependency cycle: {chain}"),
            Self::DanglingDependency {
                item,
                dependency,
                suggestion,
            } => {
                write!(f, "'{item}' depends on '{dependency}', which is not in the solution")?;
                if let Some(suggestion) = suggestion {
                    write!(f, " (did you mean '{suggestion}'?)")?;
                }
                Ok(())
            }
            Self::UnknownPlaceholder {
                item,
                placeholder,
            } => write!(f, "'{item}' uses {placeholder}, which nothing in the solution provides"),
            Self::Extraction {
                item,
                reason,
            } => write!(f, "'{item}': {reason}"),
        }
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
    /// Build order, when the graph is acyclic.
    pub order: Option<Vec<String>>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check that a solution can be deployed.
///
/// Dependencies on items listed in [`Solution::external`] are accepted.
/// Any other dangling dependency is reported even though deployment would
/// treat it as a pre-existing item: inside a solution file it usually
/// means an item was dropped from the capture.
pub fn validate(solution: &Solution, registry: &HandlerRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();
    let ids: Vec<&str> = solution.items.iter().map(|i| i.id.as_str()).collect();

    let external: HashSet<&str> = solution.external.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    for id in &ids {
        if !seen.insert(*id) {
            report.issues.push(Issue::DuplicateId {
                id: (*id).to_string(),
            });
        }
    }

    let graph = GraphBuilder::new(registry).build(&solution.items);
    for fault in graph.faults() {
        if let SolkitError::ExtractionFault {
            item,
            ..
        } = fault
        {
            report.issues.push(Issue::Extraction {
                item: item.clone(),
                reason: fault.to_string(),
            });
        }
    }

    let mut checked = HashSet::new();
    for item in solution.items.iter().filter(|i| checked.insert(i.id.as_str())) {
        for dependency in graph.dependencies_of(&item.id) {
            if !seen.contains(dependency.as_str()) && !external.contains(dependency.as_str()) {
                report.issues.push(Issue::DanglingDependency {
                    item: item.id.clone(),
                    dependency: dependency.clone(),
                    suggestion: closest(dependency, &ids),
                });
            }
        }

        let declared: HashSet<String> =
            templating::detemplatize_all(&item.dependencies).into_iter().collect();
        let mut found = templating::placeholders_in_value(&item.body);
        if let Some(url) = &item.url {
            found.extend(templating::placeholders(url));
        }
        for value in item.properties.values() {
            found.extend(templating::placeholders_in_value(value));
        }
        let mut reported = HashSet::new();
        for placeholder in found {
            let known = placeholder.id == item.id
                || seen.contains(placeholder.id.as_str())
                || external.contains(placeholder.id.as_str())
                || declared.contains(&placeholder.id);
            if !known && reported.insert(placeholder.to_string()) {
                report.issues.push(Issue::UnknownPlaceholder {
                    item: item.id.clone(),
                    placeholder: placeholder.to_string(),
                });
            }
        }
    }

    match TopologicalSorter::new().sort(&graph) {
        Ok(order) => report.order = Some(order),
        Err(SolkitError::CyclicalDependency {
            chain,
            ..
        }) => report.issues.push(Issue::Cycle {
            chain,
        }),
        Err(other) => report.issues.push(Issue::Extraction {
            item: solution.name.clone(),
            reason: other.to_string(),
        }),
    }

    report
}

/// Closest known id, if it is a plausible typo.
fn closest(target: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (strsim::levenshtein(target, c), *c))
        .filter(|(distance, _)| *distance <= 3.max(target.len() / 4))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, c)| c.to_string())
}

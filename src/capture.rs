//! Capturing items from a portal into a reusable solution.
//!
//! Capture walks the dependency graph breadth first starting at the
//! requested roots. Each level is fetched concurrently but kept in
//! discovery order, so the captured item list is stable between runs.
//! Dependencies that cannot be fetched (public content of another
//! organisation, deleted items) are kept as external references and
//! logged; failing to fetch a root is an error.
//!
//! [`freeze_items`] then turns the captured items into templates.

use anyhow::{Context, Result};
use futures::{StreamExt, stream};
use std::collections::HashSet;

use crate::core::Item;
use crate::extract::dedupe;
use crate::handlers::HandlerRegistry;
use crate::store::ItemStore;
use crate::templating;

/// Requests in flight at once while capturing a level.
const CAPTURE_CONCURRENCY: usize = 8;

/// Items captured from a store.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    /// Fetched items in discovery order
    pub items: Vec<Item>,
    /// Dependencies that could not be fetched
    pub external: Vec<String>,
}

/// Fetch `root_ids` and everything they transitively depend on.
///
/// Items come back raw: dependency lists hold plain identifiers and bodies
/// are untouched. Pass them to [`freeze_items`] to make a template.
pub async fn capture_solution(
    store: &dyn ItemStore,
    registry: &HandlerRegistry,
    root_ids: &[String],
) -> Result<Capture> {
    let mut capture = Capture::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut level: Vec<String> = dedupe(root_ids.iter().cloned());
    visited.extend(level.iter().cloned());
    let roots: HashSet<String> = level.iter().cloned().collect();

    while !level.is_empty() {
        tracing::debug!("Capturing {} item(s)", level.len());
        let fetched: Vec<(String, Result<Item>)> = stream::iter(level.iter().cloned())
            .map(|id| async move {
                let result = capture_item(store, registry, &id).await;
                (id, result)
            })
            .buffered(CAPTURE_CONCURRENCY)
            .collect()
            .await;

        let mut next = Vec::new();
        for (id, result) in fetched {
            let item = match result {
                Ok(item) => item,
                Err(e) if roots.contains(&id) => {
                    return Err(e).with_context(|| format!("Failed to capture '{id}'"));
                }
                Err(e) => {
                    tracing::warn!("Keeping '{}' as an external reference: {:#}", id, e);
                    capture.external.push(id);
                    continue;
                }
            };
            for dependency in &item.dependencies {
                if visited.insert(dependency.clone()) {
                    next.push(dependency.clone());
                }
            }
            capture.items.push(item);
        }
        level = next;
    }

    tracing::info!(
        "Captured {} item(s), {} external reference(s)",
        capture.items.len(),
        capture.external.len()
    );
    Ok(capture)
}

async fn capture_item(store: &dyn ItemStore, registry: &HandlerRegistry, id: &str) -> Result<Item> {
    let mut item = store.fetch_item(id).await?;
    let handler = registry.handler_for(&item.kind);
    handler.capture(&mut item, store).await.with_context(|| format!("Failed to enrich '{id}'"))?;

    item.resources = match store.fetch_item_resources(id).await {
        Ok(resources) => resources,
        Err(e) => {
            tracing::warn!("Could not list resources of '{}': {:#}", id, e);
            Vec::new()
        }
    };

    let extraction = handler.extract_dependencies(&item);
    for fault in &extraction.faults {
        tracing::warn!("{}", fault);
    }
    let listed = templating::detemplatize_all(&item.dependencies);
    item.dependencies = dedupe(
        listed.into_iter().chain(extraction.unique_ids()).filter(|dep| dep != &item.id),
    );
    tracing::debug!("Captured '{}' ({}) with {} dependencies", id, item.kind, item.dependencies.len());
    Ok(item)
}

/// Turn captured items into templates.
///
/// Sets each item's cost factor, rewrites identifiers in its content into
/// placeholders, and replaces its dependency list with placeholder tokens.
pub fn freeze_items(items: &mut [Item], registry: &HandlerRegistry) {
    for item in items.iter_mut() {
        let handler = registry.handler_for(&item.kind);
        item.dependencies = templating::detemplatize_all(&item.dependencies);
        item.cost_factor = handler.cost_factor(item);
        handler.templatize(item);
    }
}

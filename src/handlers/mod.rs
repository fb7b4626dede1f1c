//! Per-kind item handlers.
//!
//! Every item kind supplies one [`ItemHandler`] that knows how to:
//!
//! - extract the identifiers the item depends on from its body
//! - freeze the item into a reusable template (placeholders, cost factor)
//! - enrich the item while it is being captured (e.g. page group membership)
//! - create it in a target portal and run any follow-up calls
//!
//! Handlers are looked up by kind tag through a [`HandlerRegistry`]. Kinds
//! without a registered handler use [`GenericHandler`], which finds no
//! dependencies and creates the item as-is, so unknown kinds are never an
//! error.
//!
//! # Built-in handlers
//!
//! | Kind | Handler | Dependency rule |
//! |------|---------|-----------------|
//! | `Web Map` | [`WebMapHandler`] | `itemId` of layers, tables and basemap layers |
//! | `Web Mapping Application` | [`WebAppHandler`] | `values.webmap`, `values.group`, `map.itemId` |
//! | `Dashboard` | [`DashboardHandler`] | `itemId` of `mapWidget` widgets |
//! | `Story Map`, `StoryMap` | [`StoryMapHandler`] | `webmap` fields, scope chosen by keyword |
//! | `Group` | [`GroupHandler`] | members paged from the portal at capture time |
//! | `Feature Service` | [`FeatureServiceHandler`] | none |

mod dashboard;
mod feature_service;
mod group;
mod story_map;
mod web_app;
mod web_map;

pub use dashboard::DashboardHandler;
pub use feature_service::FeatureServiceHandler;
pub use group::GroupHandler;
pub use story_map::{StoryMapHandler, StoryStrategy};
pub use web_app::WebAppHandler;
pub use web_map::WebMapHandler;

use anyhow::Result;
use futures::future::{self, BoxFuture};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{DEFAULT_COST_FACTOR, Item};
use crate::extract::Extraction;
use crate::store::{CreatedItem, DeployTarget, ItemStore};
use crate::templating;

/// Capability interface implemented once per item kind.
pub trait ItemHandler: Send + Sync {
    /// Kind tag this handler is registered under.
    fn kind(&self) -> &str;

    /// Raw identifiers this item depends on. Must not mutate anything.
    fn extract_dependencies(&self, item: &Item) -> Extraction;

    /// Relative cost of deploying this item, for progress weighting.
    fn cost_factor(&self, _item: &Item) -> f64 {
        DEFAULT_COST_FACTOR
    }

    /// Rewrite identifiers in the item into placeholders.
    ///
    /// Called once during freeze, after `item.dependencies` holds the raw
    /// dependency ids.
    fn templatize(&self, item: &mut Item) {
        templatize_references(item);
    }

    /// Enrich a freshly fetched item with data only the store can provide.
    fn capture<'a>(
        &'a self,
        _item: &'a mut Item,
        _store: &'a dyn ItemStore,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(future::ready(Ok(())))
    }

    /// Create the (already resolved) item in the target portal.
    fn create<'a>(
        &'a self,
        item: &'a Item,
        store: &'a dyn ItemStore,
        target: &'a DeployTarget,
    ) -> BoxFuture<'a, Result<CreatedItem>> {
        store.create_item(item, target)
    }

    /// Follow-up calls that need the freshly assigned identifier.
    fn post_process<'a>(
        &'a self,
        _item: &'a Item,
        _created: &'a CreatedItem,
        _store: &'a dyn ItemStore,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(future::ready(Ok(())))
    }
}

/// Default freeze: templatize the item's own id and its dependency ids
/// wherever they appear in the body, url and properties.
pub fn templatize_references(item: &mut Item) {
    let mut ids = templating::detemplatize_all(&item.dependencies);
    ids.push(item.id.clone());

    templating::templatize_value(&mut item.body, &ids);
    if let Some(url) = item.url.as_mut() {
        for id in &ids {
            *url = templating::templatize_text(url, id);
        }
    }
    for value in item.properties.values_mut() {
        templating::templatize_value(value, &ids);
    }
    item.dependencies = templating::templatize_all(&item.dependencies);
}

/// Fallback handler for kinds without a registered handler.
#[derive(Debug, Clone, Default)]
pub struct GenericHandler;

impl ItemHandler for GenericHandler {
    fn kind(&self) -> &str {
        "*"
    }

    fn extract_dependencies(&self, _item: &Item) -> Extraction {
        Extraction::new()
    }
}

/// Registry of handlers keyed by kind tag.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ItemHandler>>,
    fallback: Arc<dyn ItemHandler>,
}

impl HandlerRegistry {
    /// Registry with no handlers; everything uses the fallback.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(GenericHandler),
        }
    }

    /// Registry with all built-in handlers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(WebMapHandler);
        registry.register(WebAppHandler);
        registry.register(DashboardHandler);
        registry.register(StoryMapHandler::classic());
        registry.register(StoryMapHandler::express());
        registry.register(GroupHandler::default());
        registry.register(FeatureServiceHandler);
        registry
    }

    /// Register (or replace) the handler for its kind.
    pub fn register<H: ItemHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.register_arc(Arc::new(handler))
    }

    /// Register an already shared handler.
    pub fn register_arc(&mut self, handler: Arc<dyn ItemHandler>) -> &mut Self {
        let kind = handler.kind().to_string();
        if self.handlers.insert(kind.clone(), handler).is_some() {
            tracing::debug!("Replaced handler for kind '{}'", kind);
        }
        self
    }

    /// Handler for `kind`, or the fallback.
    pub fn handler_for(&self, kind: &str) -> &dyn ItemHandler {
        self.handlers.get(kind).map_or(self.fallback.as_ref(), AsRef::as_ref)
    }

    /// Whether a dedicated handler exists for `kind`.
    pub fn is_registered(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kind tags, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

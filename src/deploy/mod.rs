//! Ordered deployment of a captured solution.
//!
//! The [`DeploymentDriver`] creates items in a target portal in build order.
//! For each item it walks the [`ItemState`] machine:
//!
//! 1. **resolving-body**: every placeholder in the body, url, properties and
//!    dependency list is replaced from the run's [`RemapTable`]. A token for
//!    an item that has not been created is an
//!    [`UnresolvedReference`](SolkitError::UnresolvedReference). Tokens that
//!    point at the item itself are left for post-processing.
//! 2. **creating**: the kind's handler creates the item; the new identifier
//!    and facts are recorded under the *original* identifier. Facts that
//!    still carry the item's own placeholder (an app url echoing
//!    `{{app.id}}`) are resolved against the new identifier first.
//! 3. **post-processing**: self references are resolved and written back
//!    with `update_item`, then the handler's follow-up hook runs. The created
//!    resource is never rolled back.
//! 4. **done**
//!
//! A failure at any step fails the item only. Items that depend on a failed
//! item fail as well without being attempted; independent items carry on.
//! Only a dependency cycle aborts the whole run, before anything is created.
//!
//! # Concurrency
//!
//! With the default `max_concurrency` of 1 items run strictly one at a time
//! in build order. Larger values group the order into dependency waves and
//! run up to that many items of a wave at once. The remap table sits behind
//! a [`tokio::sync::RwLock`] so lookups never observe a half-written entry.
//!
//! # Example
//!
//! ```rust,no_run
//! use solkit_cli::deploy::{DeployOptions, DeploymentDriver, NoopSink};
//! use solkit_cli::handlers::HandlerRegistry;
//! # async fn demo(store: &dyn solkit_cli::store::ItemStore, items: &[solkit_cli::core::Item]) -> anyhow::Result<()> {
//! let registry = HandlerRegistry::with_defaults();
//! let driver = DeploymentDriver::new(store, &registry)
//!     .with_options(DeployOptions::default().with_max_concurrency(4));
//! let report = driver.deploy(items, &NoopSink).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod progress;
pub mod remap;
pub mod state;

pub use progress::{CancelToken, DeployEvent, NoopSink, ProgressSink};
pub use remap::{Mapping, RemapTable};
pub use state::ItemState;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::core::{Item, SolkitError};
use crate::graph::{DependencyGraph, GraphBuilder, TopologicalSorter};
use crate::handlers::HandlerRegistry;
use crate::store::{CreatedItem, DeployTarget, ItemStore};
use crate::templating::{self, Lookup, Placeholder, PlaceholderLookup};

/// Tuning for a deployment run.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Where to create items
    pub target: DeployTarget,
    /// Items of one wave in flight at once; 1 means strictly sequential
    pub max_concurrency: usize,
    /// Limit for each remote call; expiry fails the item
    pub item_timeout: Option<Duration>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            target: DeployTarget::default(),
            max_concurrency: 1,
            item_timeout: None,
        }
    }
}

impl DeployOptions {
    /// Set the deploy target.
    #[must_use]
    pub fn with_target(mut self, target: DeployTarget) -> Self {
        self.target = target;
        self
    }

    /// Set the per-wave concurrency (values below 1 are treated as 1).
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = Some(timeout);
        self
    }
}

/// Why an item failed, as shown in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Error label, e.g. `create-failure`
    pub error: String,
    /// Full reason
    pub reason: String,
}

/// Outcome of a deployment run.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    /// Unique id of this run
    pub run_id: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Build order that was followed
    pub order: Vec<String>,
    /// Original id → new id for every item that reached `done`
    pub deployed: BTreeMap<String, String>,
    /// Original id → reason for every item that reached `failed`
    pub failed: BTreeMap<String, ItemFailure>,
    /// Whether the run was cancelled
    pub cancelled: bool,
    /// Final state of the remap table
    pub remap: RemapTable,
    #[serde(skip)]
    errors: BTreeMap<String, SolkitError>,
}

impl DeploymentReport {
    /// Typed error for a failed item.
    pub fn error(&self, id: &str) -> Option<&SolkitError> {
        self.errors.get(id)
    }

    /// Whether every item reached `done`.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        let mut summary = format!("{} deployed, {} failed", self.deployed.len(), self.failed.len());
        if self.cancelled {
            summary.push_str(" (cancelled)");
        }
        summary
    }
}

/// Cost-weighted completion tracking.
#[derive(Debug)]
struct Tracker {
    total_cost: f64,
    total_items: usize,
    completed_cost: f64,
    completed_items: usize,
}

impl Tracker {
    fn fraction(&self) -> f64 {
        if self.total_cost > 0.0 {
            (self.completed_cost / self.total_cost).min(1.0)
        } else if self.total_items > 0 {
            self.completed_items as f64 / self.total_items as f64
        } else {
            1.0
        }
    }
}

/// Shared state of one run.
struct Run<'s> {
    table: RwLock<RemapTable>,
    tracker: Mutex<Tracker>,
    sink: &'s dyn ProgressSink,
}

impl Run<'_> {
    async fn emit(&self, item: &Item, status: ItemState, message: Option<String>) {
        let progress = {
            let mut tracker = self.tracker.lock().await;
            if status.is_terminal() {
                tracker.completed_cost += item.cost_factor.max(0.0);
                tracker.completed_items += 1;
            }
            tracker.fraction()
        };
        self.sink.on_event(&DeployEvent {
            item_id: item.id.clone(),
            kind: item.kind.clone(),
            status,
            progress,
            message,
        });
    }

    async fn advance(
        &self,
        item: &Item,
        state: &mut ItemState,
        next: ItemState,
        message: Option<String>,
    ) {
        debug_assert!(state.can_transition_to(next), "{state} -> {next}");
        *state = next;
        tracing::debug!("{} '{}': {}", item.kind, item.id, next);
        self.emit(item, next, message).await;
    }
}

/// Creates items in dependency order against an [`ItemStore`].
pub struct DeploymentDriver<'a> {
    store: &'a dyn ItemStore,
    registry: &'a HandlerRegistry,
    options: DeployOptions,
    cancel: CancelToken,
}

impl<'a> DeploymentDriver<'a> {
    /// Driver with default options.
    pub fn new(store: &'a dyn ItemStore, registry: &'a HandlerRegistry) -> Self {
        Self {
            store,
            registry,
            options: DeployOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Replace the options.
    #[must_use]
    pub fn with_options(mut self, options: DeployOptions) -> Self {
        self.options = options;
        self
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this driver's runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Deploy `items`, reporting every transition to `sink`.
    ///
    /// # Errors
    ///
    /// Only [`SolkitError::CyclicalDependency`]; per-item failures are
    /// reported in the returned [`DeploymentReport`].
    pub async fn deploy(
        &self,
        items: &[Item],
        sink: &dyn ProgressSink,
    ) -> Result<DeploymentReport, SolkitError> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        let graph = GraphBuilder::new(self.registry).build(items);
        let order = TopologicalSorter::new().sort(&graph)?;

        let mut by_id: HashMap<&str, &Item> = HashMap::new();
        for item in items {
            by_id.entry(item.id.as_str()).or_insert(item);
        }

        let mut table = RemapTable::new();
        for external in graph.external_references() {
            table.record_external(external)?;
        }
        if !table.is_empty() {
            tracing::info!("{} reference(s) point outside the solution and are kept as-is", table.len());
        }

        let run = Run {
            table: RwLock::new(table),
            tracker: Mutex::new(Tracker {
                total_cost: order
                    .iter()
                    .filter_map(|id| by_id.get(id.as_str()))
                    .map(|item| item.cost_factor.max(0.0))
                    .sum(),
                total_items: order.len(),
                completed_cost: 0.0,
                completed_items: 0,
            }),
            sink,
        };

        tracing::info!("Deploying {} item(s) (run {})", order.len(), run_id);
        let concurrency = self.options.max_concurrency.max(1);
        let mut outcomes: HashMap<String, Result<CreatedItem, SolkitError>> = HashMap::new();

        for wave in self.waves(&graph, &order) {
            let results: Vec<(String, Result<CreatedItem, SolkitError>)> =
                stream::iter(wave.iter().filter_map(|id| by_id.get(id.as_str()).copied()))
                    .map(|item| {
                        let blocked = self.blocked_by(item, &graph, &outcomes);
                        let run = &run;
                        async move {
                            let result = match blocked {
                                Some(err) => Err(err),
                                None => self.deploy_item(item, run).await,
                            };
                            if let Err(err) = &result {
                                tracing::error!("{} '{}' failed: {}", item.kind, item.id, err);
                                run.emit(item, ItemState::Failed, Some(err.to_string())).await;
                            }
                            (item.id.clone(), result)
                        }
                    })
                    .buffer_unordered(concurrency)
                    .collect()
                    .await;
            outcomes.extend(results);
        }

        let mut report = DeploymentReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            order,
            deployed: BTreeMap::new(),
            failed: BTreeMap::new(),
            cancelled: self.cancel.is_cancelled(),
            remap: run.table.into_inner(),
            errors: BTreeMap::new(),
        };
        for (id, outcome) in outcomes {
            match outcome {
                Ok(created) => {
                    report.deployed.insert(id, created.id);
                }
                Err(err) => {
                    report.failed.insert(
                        id.clone(),
                        ItemFailure {
                            error: err.kind_label().to_string(),
                            reason: err.to_string(),
                        },
                    );
                    report.errors.insert(id, err);
                }
            }
        }

        tracing::info!("Deployment finished: {}", report.summary());
        Ok(report)
    }

    /// Group the build order into batches that may run together.
    fn waves(&self, graph: &DependencyGraph, order: &[String]) -> Vec<Vec<String>> {
        if self.options.max_concurrency <= 1 {
            return order.iter().map(|id| vec![id.clone()]).collect();
        }

        let mut levels: HashMap<&str, usize> = HashMap::new();
        let mut waves: Vec<Vec<String>> = Vec::new();
        for id in order {
            let level = graph
                .dependencies_of(id)
                .iter()
                .filter_map(|dep| levels.get(dep.as_str()))
                .map(|level| level + 1)
                .max()
                .unwrap_or(0);
            levels.insert(id.as_str(), level);
            if waves.len() <= level {
                waves.resize_with(level + 1, Vec::new);
            }
            waves[level].push(id.clone());
        }
        waves
    }

    /// Reason an item cannot start: cancellation or a failed dependency.
    fn blocked_by(
        &self,
        item: &Item,
        graph: &DependencyGraph,
        outcomes: &HashMap<String, Result<CreatedItem, SolkitError>>,
    ) -> Option<SolkitError> {
        if self.cancel.is_cancelled() {
            return Some(SolkitError::Cancelled {
                item: item.id.clone(),
            });
        }
        graph.dependencies_of(&item.id).iter().find_map(|dep| match outcomes.get(dep) {
            Some(Err(err)) => Some(SolkitError::DependencyFailed {
                item: item.id.clone(),
                dependency: dep.clone(),
                reason: err.to_string(),
            }),
            _ => None,
        })
    }

    fn checkpoint(&self, item: &Item) -> Result<(), SolkitError> {
        if self.cancel.is_cancelled() {
            return Err(SolkitError::Cancelled {
                item: item.id.clone(),
            });
        }
        Ok(())
    }

    async fn guarded<T, F>(&self, call: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match self.options.item_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| anyhow!("timed out after {:.1}s", limit.as_secs_f64()))?,
            None => call.await,
        }
    }

    async fn deploy_item(&self, item: &Item, run: &Run<'_>) -> Result<CreatedItem, SolkitError> {
        let handler = self.registry.handler_for(&item.kind);
        let mut state = ItemState::Pending;

        run.advance(item, &mut state, ItemState::ResolvingBody, None).await;
        let mut resolved = item.clone();
        {
            let table = run.table.read().await;
            resolve_item(&mut resolved, &item.id, &table.lookup_deferring(&item.id))?;
        }
        let self_referencing = references(&resolved, &item.id);

        self.checkpoint(item)?;
        run.advance(item, &mut state, ItemState::Creating, None).await;
        let mut created = self
            .guarded(handler.create(&resolved, self.store, &self.options.target))
            .await
            .map_err(|e| SolkitError::CreateFailure {
                item: item.id.clone(),
                reason: format!("{e:#}"),
            })?;
        {
            let table = run.table.read().await;
            resolve_facts(&mut created, &item.id, &table)?;
        }
        run.table.write().await.record(&item.id, &created)?;
        resolved.id.clone_from(&created.id);

        self.checkpoint(item)?;
        run.advance(item, &mut state, ItemState::PostProcessing, None).await;
        let post_failure = |e: anyhow::Error| SolkitError::PostProcessFailure {
            item: item.id.clone(),
            reason: format!("{e:#}"),
        };
        if self_referencing {
            let patch = {
                let table = run.table.read().await;
                self_reference_patch(&mut resolved, &item.id, &*table)?
            };
            if !patch.is_empty() {
                tracing::debug!("Updating {} self-referencing field(s) of '{}'", patch.len(), item.id);
                self.guarded(self.store.update_item(&created.id, &patch)).await.map_err(post_failure)?;
            }
        }
        self.guarded(handler.post_process(&resolved, &created, self.store))
            .await
            .map_err(post_failure)?;

        run.advance(item, &mut state, ItemState::Done, Some(created.id.clone())).await;
        Ok(created)
    }
}

fn unresolved(original: &str) -> impl Fn(Placeholder) -> SolkitError + '_ {
    move |placeholder| SolkitError::UnresolvedReference {
        item: original.to_string(),
        reference: placeholder.to_string(),
    }
}

/// Replace placeholders in every part of `item` that can hold one.
fn resolve_item(
    item: &mut Item,
    original: &str,
    lookup: &dyn PlaceholderLookup,
) -> Result<(), SolkitError> {
    templating::resolve_value(&mut item.body, lookup).map_err(unresolved(original))?;
    if let Some(url) = item.url.as_mut() {
        *url = templating::resolve_text(url, lookup).map_err(unresolved(original))?;
    }
    for value in item.properties.values_mut() {
        templating::resolve_value(value, lookup).map_err(unresolved(original))?;
    }
    for dep in &mut item.dependencies {
        *dep = templating::resolve_text(dep, lookup).map_err(unresolved(original))?;
    }
    match leftover(item, lookup) {
        Some(placeholder) => Err(unresolved(original)(placeholder)),
        None => Ok(()),
    }
}

/// First placeholder still in `item` that `lookup` does not defer.
///
/// Substituted values are not rescanned, so a value that itself carries a
/// token would otherwise reach the target portal verbatim.
fn leftover(item: &Item, lookup: &dyn PlaceholderLookup) -> Option<Placeholder> {
    let mut found = templating::placeholders_in_value(&item.body);
    if let Some(url) = &item.url {
        found.extend(templating::placeholders(url));
    }
    for value in item.properties.values() {
        found.extend(templating::placeholders_in_value(value));
    }
    for dep in &item.dependencies {
        found.extend(templating::placeholders(dep));
    }
    found.into_iter().find(|p| lookup.lookup(&p.id, &p.param) != Lookup::Defer)
}

/// Resolve placeholders in the facts a create call reported.
///
/// The item's own `id` placeholder maps to the identifier just assigned;
/// everything else comes from the table.
fn resolve_facts(
    created: &mut CreatedItem,
    original: &str,
    table: &RemapTable,
) -> Result<(), SolkitError> {
    let new_id = created.id.clone();
    let lookup = |id: &str, param: &str| {
        if id == original && param == templating::DEFAULT_PARAM {
            Lookup::Value(new_id.clone())
        } else {
            table.lookup(id, param)
        }
    };
    for fact in created.facts.values_mut() {
        *fact = templating::resolve_text(fact, &lookup).map_err(unresolved(original))?;
        if let Some(placeholder) = templating::placeholders(fact).into_iter().next() {
            return Err(unresolved(original)(placeholder));
        }
    }
    Ok(())
}

/// Whether any placeholder in `item` still points at `id`.
fn references(item: &Item, id: &str) -> bool {
    let in_text = |text: &str| templating::placeholders(text).iter().any(|p| p.id == id);
    templating::placeholders_in_value(&item.body).iter().any(|p| p.id == id)
        || item.url.as_deref().is_some_and(in_text)
        || item
            .properties
            .values()
            .any(|v| templating::placeholders_in_value(v).iter().any(|p| p.id == id))
}

/// Resolve the remaining self references and describe what changed.
///
/// The body travels as the `text` field; url and properties keep their names.
fn self_reference_patch(
    item: &mut Item,
    original: &str,
    lookup: &dyn PlaceholderLookup,
) -> Result<Map<String, Value>, SolkitError> {
    let before = item.clone();
    resolve_item(item, original, lookup)?;

    let mut patch = Map::new();
    if item.url != before.url
        && let Some(url) = &item.url
    {
        patch.insert("url".to_string(), Value::String(url.clone()));
    }
    if item.body != before.body {
        patch.insert("text".to_string(), Value::String(item.body.to_string()));
    }
    for (key, value) in &item.properties {
        if before.properties.get(key) != Some(value) {
            patch.insert(key.clone(), value.clone());
        }
    }
    Ok(patch)
}

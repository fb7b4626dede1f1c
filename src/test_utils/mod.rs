//! Test utilities for solkit
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration suite.
//!
//! - [`MockStore`] - in-memory [`ItemStore`] with scripted failures and delays
//! - [`RecordingSink`] - [`ProgressSink`] that keeps every event
//! - [`init_test_logging`] - one-time tracing setup that writes through the
//!   test harness
//!
//! # Example
//!
//! ```rust,no_run
//! use solkit_cli::core::Item;
//! use solkit_cli::test_utils::MockStore;
//!
//! let store = MockStore::new()
//!     .with_item(Item::new("svc", "Feature Service"))
//!     .fail_create("svc", "quota exceeded");
//! ```

use anyhow::{Result, anyhow};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::{Item, kinds};
use crate::deploy::{DeployEvent, ItemState, ProgressSink};
use crate::store::{ContentPage, CreatedItem, DeployTarget, ItemStore};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`. Without either, tests run
/// silently.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Base URL of the services the mock store hosts.
pub const MOCK_PORTAL_URL: &str = "https://mock.example.com";

/// Service url [`MockStore`] assigns to a feature service created without one.
pub fn hosted_service_url(id: &str) -> String {
    format!("{MOCK_PORTAL_URL}/rest/services/Hosted/{id}/FeatureServer")
}

/// Identifier [`MockStore`] assigns to a created item.
pub fn deployed_id(original: &str) -> String {
    format!("{original}-deployed")
}

/// In-memory [`ItemStore`].
///
/// Created items get the id from [`deployed_id`]. Like a portal, it reports a
/// `url` fact only when one exists: the item's own url, or for a feature
/// service created without one, [`hosted_service_url`]. Every call is
/// appended to a log readable with [`MockStore::calls`].
#[derive(Default)]
pub struct MockStore {
    items: HashMap<String, Item>,
    resources: HashMap<String, Vec<String>>,
    groups: HashMap<String, Vec<String>>,
    create_failures: HashMap<String, String>,
    update_failures: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
    created: Mutex<Vec<Item>>,
    updates: Mutex<Vec<(String, Map<String, Value>)>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item that can be fetched.
    #[must_use]
    pub fn with_item(mut self, item: Item) -> Self {
        self.items.insert(item.id.clone(), item);
        self
    }

    #[must_use]
    pub fn with_resources(mut self, id: &str, names: &[&str]) -> Self {
        self.resources.insert(id.to_string(), names.iter().map(|n| (*n).to_string()).collect());
        self
    }

    /// Membership listing for a group.
    #[must_use]
    pub fn with_group(mut self, group_id: &str, members: &[&str]) -> Self {
        self.groups.insert(group_id.to_string(), members.iter().map(|m| (*m).to_string()).collect());
        self
    }

    /// Make creating `original` fail with `reason`.
    #[must_use]
    pub fn fail_create(mut self, original: &str, reason: &str) -> Self {
        self.create_failures.insert(original.to_string(), reason.to_string());
        self
    }

    /// Make updating the item created for `original` fail.
    #[must_use]
    pub fn fail_update(mut self, original: &str) -> Self {
        self.update_failures.insert(deployed_id(original));
        self
    }

    /// Delay creating `original`.
    #[must_use]
    pub fn delay_create(mut self, original: &str, delay: Duration) -> Self {
        self.delays.insert(original.to_string(), delay);
        self
    }

    /// Every call made so far, e.g. `create map` or `update map-deployed`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Original ids in the order they were created.
    pub fn created_ids(&self) -> Vec<String> {
        self.created().into_iter().map(|item| item.id).collect()
    }

    /// Items exactly as they were passed to `create_item`.
    pub fn created(&self) -> Vec<Item> {
        self.created.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Item as it was passed to `create_item`.
    pub fn created_item(&self, original: &str) -> Option<Item> {
        self.created().into_iter().find(|item| item.id == original)
    }

    /// Patches passed to `update_item`, keyed by the new id.
    pub fn updates(&self) -> Vec<(String, Map<String, Value>)> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }

    /// Largest number of creates that were running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn log(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    async fn create(&self, item: &Item) -> Result<CreatedItem> {
        self.log(format!("create {}", item.id));
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&item.id) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(reason) = self.create_failures.get(&item.id) {
            return Err(anyhow!("{reason}"));
        }
        if let Ok(mut created) = self.created.lock() {
            created.push(item.clone());
        }

        let id = deployed_id(&item.id);
        let url = match &item.url {
            Some(url) => Some(url.clone()),
            None if item.kind == kinds::FEATURE_SERVICE => Some(hosted_service_url(&id)),
            None => None,
        };
        let created = CreatedItem::new(id);
        Ok(match url {
            Some(url) => created.with_fact("url", url),
            None => created,
        })
    }
}

impl ItemStore for MockStore {
    fn fetch_item<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Item>> {
        self.log(format!("fetch {id}"));
        let result = self.items.get(id).cloned().ok_or_else(|| anyhow!("item '{id}' not found"));
        Box::pin(async move { result })
    }

    fn fetch_item_resources<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        let resources = self.resources.get(id).cloned().unwrap_or_default();
        Box::pin(async move { Ok(resources) })
    }

    fn group_content<'a>(
        &'a self,
        group_id: &'a str,
        start: usize,
        num: usize,
    ) -> BoxFuture<'a, Result<ContentPage>> {
        self.log(format!("list {group_id} {start}"));
        let result = self
            .groups
            .get(group_id)
            .map(|members| {
                let skip = start.saturating_sub(1);
                let ids: Vec<String> = members.iter().skip(skip).take(num).cloned().collect();
                let end = skip + ids.len();
                ContentPage {
                    ids,
                    total: members.len(),
                    next_start: (end < members.len()).then_some(end + 1),
                }
            })
            .ok_or_else(|| anyhow!("group '{group_id}' not found"));
        Box::pin(async move { result })
    }

    fn create_item<'a>(
        &'a self,
        item: &'a Item,
        _target: &'a DeployTarget,
    ) -> BoxFuture<'a, Result<CreatedItem>> {
        Box::pin(self.create(item))
    }

    fn update_item<'a>(
        &'a self,
        id: &'a str,
        patch: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<()>> {
        self.log(format!("update {id}"));
        let result = if self.update_failures.contains(id) {
            Err(anyhow!("update of '{id}' rejected"))
        } else {
            if let Ok(mut updates) = self.updates.lock() {
                updates.push((id.to_string(), patch.clone()));
            }
            Ok(())
        };
        Box::pin(async move { result })
    }
}

/// [`ProgressSink`] that records every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DeployEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeployEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// States reported for one item, in order.
    pub fn statuses(&self, item_id: &str) -> Vec<ItemState> {
        self.events().into_iter().filter(|e| e.item_id == item_id).map(|e| e.status).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_event(&self, event: &DeployEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_group_paging() {
        let store = MockStore::new().with_group("g", &["a", "b", "c"]);
        let first = store.group_content("g", 1, 2).await.unwrap();
        assert_eq!(first.ids, vec!["a", "b"]);
        assert_eq!(first.next_start, Some(3));
        let last = store.group_content("g", 3, 2).await.unwrap();
        assert_eq!(last.ids, vec!["c"]);
        assert_eq!(last.next_start, None);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let store = MockStore::new().fail_create("x", "boom");
        let err = store.create_item(&Item::new("x", "Thing"), &DeployTarget::default()).await;
        assert_eq!(err.unwrap_err().to_string(), "boom");

        let ok = store.create_item(&Item::new("y", "Thing"), &DeployTarget::default()).await;
        assert_eq!(ok.unwrap().id, "y-deployed");
        assert_eq!(store.calls(), vec!["create x", "create y"]);
    }
}

//! The remote content store seam.
//!
//! The engine never talks HTTP itself. Everything it needs from the portal
//! goes through [`ItemStore`]: reading items during capture, paging group
//! membership, creating items and patching them afterwards. The REST
//! implementation lives in [`crate::portal`]; tests use an in-memory store.
//!
//! Methods return [`BoxFuture`] so the trait stays object safe and handlers
//! can take `&dyn ItemStore`.

use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::core::Item;

/// Where created items are placed in the target portal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTarget {
    /// Folder to create items in; `None` means the owner's root folder.
    pub folder: Option<String>,
    /// Owner to create items for; `None` lets the store use its own user.
    pub owner: Option<String>,
}

impl DeployTarget {
    /// Target a named folder.
    pub fn folder(folder: impl Into<String>) -> Self {
        Self {
            folder: Some(folder.into()),
            owner: None,
        }
    }
}

/// Result of a successful remote create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedItem {
    /// Identifier assigned by the target portal
    pub id: String,
    /// Other facts about the new item, e.g. `url`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facts: BTreeMap<String, String>,
}

impl CreatedItem {
    /// Created item with no extra facts.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            facts: BTreeMap::new(),
        }
    }

    /// Builder-style fact setter.
    #[must_use]
    pub fn with_fact(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.facts.insert(key.into(), value.into());
        self
    }
}

/// One page of a group's content listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPage {
    /// Member item identifiers on this page
    pub ids: Vec<String>,
    /// Total number of members
    pub total: usize,
    /// Start index of the next page, `None` on the last page
    pub next_start: Option<usize>,
}

/// Remote content store operations consumed by capture and deployment.
pub trait ItemStore: Send + Sync {
    /// Fetch an item with its body.
    fn fetch_item<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Item>>;

    /// List the names of auxiliary resources stored with an item.
    fn fetch_item_resources<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;

    /// One page of a group's membership listing. `start` is 1-based.
    fn group_content<'a>(
        &'a self,
        group_id: &'a str,
        start: usize,
        num: usize,
    ) -> BoxFuture<'a, Result<ContentPage>>;

    /// Create an item in the target location.
    fn create_item<'a>(
        &'a self,
        item: &'a Item,
        target: &'a DeployTarget,
    ) -> BoxFuture<'a, Result<CreatedItem>>;

    /// Patch fields of an existing item.
    fn update_item<'a>(
        &'a self,
        id: &'a str,
        patch: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Page size used when walking group membership.
pub const GROUP_PAGE_SIZE: usize = 100;

/// Walk every page of a group's membership listing.
pub async fn all_group_content(store: &dyn ItemStore, group_id: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut start = 1;
    loop {
        let page = store.group_content(group_id, start, GROUP_PAGE_SIZE).await?;
        tracing::debug!(
            "Group '{}' page at {}: {} of {} member(s)",
            group_id,
            start,
            page.ids.len(),
            page.total
        );
        ids.extend(page.ids);
        match page.next_start {
            // Guard against a store that never advances
            Some(next) if next > start => start = next,
            _ => break,
        }
    }
    Ok(ids)
}

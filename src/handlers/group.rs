//! Group handler.
//!
//! A group's members are not in its body; they come from the portal's
//! paged content listing. [`GroupHandler::capture`] walks every page and
//! records the member ids under `members` in the body, which is what
//! extraction reads afterwards. Members therefore deploy before the group.

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::Value;

use super::ItemHandler;
use crate::core::{Item, kinds};
use crate::extract::{Extraction, type_name};
use crate::store::{self, ItemStore};

/// Body field holding captured member ids.
pub const MEMBERS_FIELD: &str = "members";

/// Handler for `Group` items.
#[derive(Debug, Clone, Default)]
pub struct GroupHandler {
    /// Skip paging (members already recorded, or offline capture).
    pub skip_listing: bool,
}

impl ItemHandler for GroupHandler {
    fn kind(&self) -> &str {
        kinds::GROUP
    }

    fn extract_dependencies(&self, item: &Item) -> Extraction {
        let mut out = Extraction::new();
        match item.body.get(MEMBERS_FIELD) {
            None | Some(Value::Null) => {}
            Some(Value::Array(members)) => {
                for (i, member) in members.iter().enumerate() {
                    match member.as_str() {
                        Some(id) => out.push_id(id),
                        None => out.fault(
                            &item.id,
                            format!("{MEMBERS_FIELD}/{i}"),
                            format!("expected a member id, found {}", type_name(member)),
                        ),
                    }
                }
            }
            Some(other) => out.fault(
                &item.id,
                MEMBERS_FIELD,
                format!("expected an array, found {}", type_name(other)),
            ),
        }
        out
    }

    fn capture<'a>(
        &'a self,
        item: &'a mut Item,
        store: &'a dyn ItemStore,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.skip_listing {
                return Ok(());
            }
            let members = store::all_group_content(store, &item.id).await?;
            tracing::debug!("Group '{}' has {} member(s)", item.id, members.len());
            if !item.body.is_object() {
                item.body = Value::Object(serde_json::Map::new());
            }
            if let Some(body) = item.body.as_object_mut() {
                body.insert(
                    MEMBERS_FIELD.to_string(),
                    Value::Array(members.into_iter().map(Value::String).collect()),
                );
            }
            Ok(())
        })
    }

    fn cost_factor(&self, item: &Item) -> f64 {
        let members = item.body.get(MEMBERS_FIELD).and_then(Value::as_array).map_or(0, Vec::len);
        // Sharing each member is a small extra call
        2.0 + members as f64 * 0.1
    }
}

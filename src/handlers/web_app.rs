//! Web mapping application handler.

use serde_json::Value;

use super::ItemHandler;
use crate::core::{Item, kinds};
use crate::extract::{Extraction, id_from_reference, search, type_name};

/// Body locations that may reference another item.
const REFERENCE_PATHS: [&str; 3] = ["values.webmap", "values.group", "map.itemId"];

/// Handler for `Web Mapping Application` items.
///
/// Configurable apps keep their map in `values.webmap` (and sometimes a
/// gallery group in `values.group`); template-based apps use `map.itemId`.
#[derive(Debug, Clone, Default)]
pub struct WebAppHandler;

impl ItemHandler for WebAppHandler {
    fn kind(&self) -> &str {
        kinds::WEB_MAPPING_APPLICATION
    }

    fn extract_dependencies(&self, item: &Item) -> Extraction {
        let mut out = Extraction::new();
        for path in REFERENCE_PATHS {
            match search::lookup_path(&item.body, path) {
                None | Some(Value::Null) => {}
                Some(value) => match id_from_reference(value) {
                    Some(id) => out.push_id(id),
                    None => out.fault(
                        &item.id,
                        path.replace('.', "/"),
                        format!("expected an item reference, found {}", type_name(value)),
                    ),
                },
            }
        }
        out
    }

    fn cost_factor(&self, _item: &Item) -> f64 {
        // Create plus the url fix-up call
        4.0
    }
}

//! Feature service handler.

use serde_json::Value;

use super::{ItemHandler, templatize_references};
use crate::core::{DEFAULT_COST_FACTOR, Item, kinds};
use crate::extract::Extraction;

/// Handler for `Feature Service` items.
///
/// Services are leaves of the dependency graph. Their cost grows with the
/// number of layers and tables that have to be created.
#[derive(Debug, Clone, Default)]
pub struct FeatureServiceHandler;

impl ItemHandler for FeatureServiceHandler {
    fn kind(&self) -> &str {
        kinds::FEATURE_SERVICE
    }

    fn extract_dependencies(&self, _item: &Item) -> Extraction {
        Extraction::new()
    }

    fn cost_factor(&self, item: &Item) -> f64 {
        let count = |key: &str| item.body.get(key).and_then(Value::as_array).map_or(0, Vec::len);
        DEFAULT_COST_FACTOR + (count("layers") + count("tables")) as f64
    }

    /// The source service URL is never valid in the target portal; the
    /// store reports the new one as the `url` fact on creation.
    fn templatize(&self, item: &mut Item) {
        item.url = None;
        templatize_references(item);
    }
}

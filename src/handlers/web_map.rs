//! Web map handler.
//!
//! A web map's body lists operational layers, tables and basemap layers.
//! Entries backed by portal items carry an `itemId`, and usually a service
//! `url` pointing at the same item's service.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use super::{ItemHandler, templatize_references};
use crate::core::{Item, kinds};
use crate::extract::{Extraction, ids_from_entries};
use crate::templating;

/// Dotted paths of the layer arrays a web map may contain.
const LAYER_LISTS: [&str; 3] = ["operationalLayers", "tables", "baseMap.baseMapLayers"];

static SERVICE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<root>.+/(?:FeatureServer|MapServer|ImageServer|VectorTileServer))(?P<rest>/.*)?$")
        .expect("service url pattern is valid")
});

/// Handler for `Web Map` items.
#[derive(Debug, Clone, Default)]
pub struct WebMapHandler;

impl ItemHandler for WebMapHandler {
    fn kind(&self) -> &str {
        kinds::WEB_MAP
    }

    fn extract_dependencies(&self, item: &Item) -> Extraction {
        let mut out = Extraction::new();
        for path in LAYER_LISTS {
            ids_from_entries(item, &item.body, path, "itemId", &mut out);
        }
        // Nested group layers carry their own layer lists
        if let Some(Value::Array(layers)) = item.body.get("operationalLayers") {
            for (i, layer) in layers.iter().enumerate() {
                if layer.get("layers").is_some_and(Value::is_array) {
                    let mut nested = Extraction::new();
                    ids_from_entries(item, layer, "layers", "itemId", &mut nested);
                    for fault in &mut nested.faults {
                        if let crate::core::SolkitError::ExtractionFault {
                            path, ..
                        } = fault
                        {
                            *path = format!("operationalLayers/{i}/{path}");
                        }
                    }
                    out.merge(nested);
                }
            }
        }
        out
    }

    /// Layer service URLs of services inside the solution are rewritten to
    /// `{{itemId.url}}` plus their layer suffix, so they follow the service
    /// into the target portal. Services outside the solution keep their URL.
    fn templatize(&self, item: &mut Item) {
        let deps = templating::detemplatize_all(&item.dependencies);
        for path in LAYER_LISTS {
            if let Some(Value::Array(layers)) = lookup_path_mut(&mut item.body, path) {
                layers.iter_mut().for_each(|layer| templatize_layer_url(layer, &deps));
            }
        }
        templatize_references(item);
    }
}

fn templatize_layer_url(layer: &mut Value, deps: &[String]) {
    let Some(obj) = layer.as_object_mut() else {
        return;
    };
    if let Some(Value::Array(nested)) = obj.get_mut("layers") {
        nested.iter_mut().for_each(|nested| templatize_layer_url(nested, deps));
    }
    let Some(item_id) = obj.get("itemId").and_then(Value::as_str).map(str::to_string) else {
        return;
    };
    if !deps.contains(&item_id) {
        return;
    }
    if let Some(Value::String(url)) = obj.get_mut("url") {
        let rest = SERVICE_URL_RE
            .captures(url)
            .map(|caps| caps.name("rest").map_or(String::new(), |m| m.as_str().to_string()));
        if let Some(rest) = rest {
            *url = format!("{}{}", templating::templatize_with(&item_id, "url"), rest);
        }
    }
}

fn lookup_path_mut<'a>(body: &'a mut Value, dotted: &str) -> Option<&'a mut Value> {
    dotted.split('.').try_fold(body, |current, key| current.get_mut(key))
}

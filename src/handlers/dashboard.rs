//! Dashboard handler.

use serde_json::Value;

use super::ItemHandler;
use crate::core::{Item, kinds};
use crate::extract::{Extraction, type_name};

/// Widget type that embeds a web map.
pub const MAP_WIDGET: &str = "mapWidget";

/// Widget lists found in current and older dashboard layouts.
const WIDGET_LISTS: [&str; 2] = ["widgets", "desktopView.widgets"];

/// Handler for `Dashboard` items.
///
/// Only map widgets reference other items; every other widget type
/// (indicators, charts, lists, ...) reads through a map widget's layers.
#[derive(Debug, Clone, Default)]
pub struct DashboardHandler;

impl ItemHandler for DashboardHandler {
    fn kind(&self) -> &str {
        kinds::DASHBOARD
    }

    fn extract_dependencies(&self, item: &Item) -> Extraction {
        let mut out = Extraction::new();
        for list in WIDGET_LISTS {
            let Some(widgets) = crate::extract::search::lookup_path(&item.body, list) else {
                continue;
            };
            let Some(widgets) = widgets.as_array() else {
                out.fault(&item.id, list, format!("expected an array, found {}", type_name(widgets)));
                continue;
            };
            for (i, widget) in widgets.iter().enumerate() {
                if widget.get("type").and_then(Value::as_str) != Some(MAP_WIDGET) {
                    continue;
                }
                match widget.get("itemId") {
                    Some(Value::String(id)) => out.push_id(id.clone()),
                    other => out.fault(
                        &item.id,
                        format!("{}/{i}/itemId", list.replace('.', "/")),
                        format!(
                            "map widget without an item id ({})",
                            other.map_or("missing", type_name)
                        ),
                    ),
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_map_widgets_contribute() {
        let item = Item::new("dash", kinds::DASHBOARD).with_body(json!({
            "widgets": [
                {"type": "indicatorWidget", "itemId": "not-a-map"},
                {"type": "mapWidget", "itemId": "map1"},
                {"type": "listWidget"}
            ]
        }));
        let extraction = DashboardHandler.extract_dependencies(&item);
        assert_eq!(extraction.ids, vec!["map1"]);
        assert!(extraction.faults.is_empty());
    }

    #[test]
    fn test_desktop_view_layout() {
        let item = Item::new("dash", kinds::DASHBOARD).with_body(json!({
            "desktopView": {"widgets": [{"type": "mapWidget", "itemId": "map2"}]}
        }));
        assert_eq!(DashboardHandler.extract_dependencies(&item).ids, vec!["map2"]);
    }

    #[test]
    fn test_map_widget_without_id_is_fault() {
        let item = Item::new("dash", kinds::DASHBOARD)
            .with_body(json!({"widgets": [{"type": "mapWidget"}]}));
        let extraction = DashboardHandler.extract_dependencies(&item);
        assert!(extraction.ids.is_empty());
        assert!(extraction.faults[0].to_string().contains("widgets/0/itemId"));
    }
}

//! Primitive mutation actions sent to the backend

use serde_json::{json, Map, Value};

use crate::layout::{ChartKind, WidgetKind};

use super::{ColumnRef, PageRef, TableRef, WidgetId};

/// One primitive mutation in a batch
#[derive(Debug, Clone, PartialEq)]
pub enum DocAction {
    /// Create a widget showing `table`. With `page: None` the backend allocates
    /// a new page and returns its reference alongside the widget's.
    CreateWidget {
        table: TableRef,
        page: Option<PageRef>,
        kind: WidgetKind,
    },
    RenamePage {
        page: PageRef,
        name: String,
    },
    ConfigureWidget {
        widget: WidgetId,
        title: Option<String>,
        chart_kind: Option<ChartKind>,
        chart_options: Option<Map<String, Value>>,
    },
    /// Bind chart columns: `x` first, then the `y` series in order
    SetChartFields {
        widget: WidgetId,
        x: Option<ColumnRef>,
        y: Vec<ColumnRef>,
    },
    /// Replace the page's layout with a stored tree
    SetLayout {
        page: PageRef,
        layout: Value,
    },
    RemoveWidget {
        widget: WidgetId,
    },
}

impl DocAction {
    pub fn name(&self) -> &'static str {
        match self {
            DocAction::CreateWidget { .. } => "CreateViewSection",
            DocAction::RenamePage { .. } => "RenameView",
            DocAction::ConfigureWidget { .. } => "UpdateViewSection",
            DocAction::SetChartFields { .. } => "AddChartFields",
            DocAction::SetLayout { .. } => "SetLayoutSpec",
            DocAction::RemoveWidget { .. } => "RemoveViewSection",
        }
    }

    /// User-action array as sent over the wire
    pub fn to_wire(&self) -> Value {
        match self {
            DocAction::CreateWidget { table, page, kind } => json!([
                self.name(),
                table.0,
                page.map(|p| p.0).unwrap_or(0),
                kind.section_type(),
                Value::Null,
                Value::Null,
            ]),
            DocAction::RenamePage { page, name } => {
                json!(["UpdateRecord", "_views", page.0, { "name": name }])
            }
            DocAction::ConfigureWidget {
                widget,
                title,
                chart_kind,
                chart_options,
            } => {
                let mut fields = Map::new();
                if let Some(title) = title {
                    fields.insert("title".to_string(), json!(title));
                }
                if let Some(kind) = chart_kind {
                    fields.insert("chartType".to_string(), json!(kind.as_str()));
                }
                if let Some(options) = chart_options {
                    fields.insert("options".to_string(), Value::String(Value::Object(options.clone()).to_string()));
                }
                json!(["UpdateRecord", "_view_sections", widget.0, fields])
            }
            DocAction::SetChartFields { widget, x, y } => {
                let cols: Vec<u64> = x.iter().chain(y.iter()).map(|c| c.0).collect();
                json!([
                    "BulkAddRecord",
                    "_view_section_fields",
                    vec![Value::Null; cols.len()],
                    { "parentId": vec![widget.0; cols.len()], "colRef": cols },
                ])
            }
            DocAction::SetLayout { page, layout } => {
                json!(["UpdateRecord", "_views", page.0, { "layoutSpec": layout.to_string() }])
            }
            DocAction::RemoveWidget { widget } => json!(["RemoveRecord", "_view_sections", widget.0]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_on_new_page_sends_zero() {
        let action = DocAction::CreateWidget {
            table: TableRef(3),
            page: None,
            kind: WidgetKind::Card,
        };
        assert_eq!(
            action.to_wire(),
            json!(["CreateViewSection", 3, 0, "single", null, null])
        );
    }

    #[test]
    fn test_chart_fields_wire_order() {
        let action = DocAction::SetChartFields {
            widget: WidgetId(8),
            x: Some(ColumnRef(1)),
            y: vec![ColumnRef(4), ColumnRef(2)],
        };
        assert_eq!(
            action.to_wire(),
            json!([
                "BulkAddRecord",
                "_view_section_fields",
                [null, null, null],
                { "parentId": [8, 8, 8], "colRef": [1, 4, 2] },
            ])
        );
    }

    #[test]
    fn test_configure_only_sends_present_fields() {
        let action = DocAction::ConfigureWidget {
            widget: WidgetId(2),
            title: Some("Revenue".to_string()),
            chart_kind: None,
            chart_options: None,
        };
        assert_eq!(
            action.to_wire(),
            json!(["UpdateRecord", "_view_sections", 2, { "title": "Revenue" }])
        );
    }
}

//! In-process document backend
//!
//! Holds tables, pages and widgets in memory and applies action batches with
//! the same contract a remote document has: each batch is all-or-nothing,
//! nothing spans batches. The state round-trips through a JSON snapshot so the
//! CLI can work against a document file.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::layout::{parse_stored_layout, ChartKind, WidgetKind};

use super::{
    BackendError, ColumnRef, DocAction, DocumentCatalog, PageRef, RemoteApply, TableRef, WidgetId,
    WidgetInfo,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub id: ColumnRef,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: TableRef,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: PageRef,
    pub name: String,
    #[serde(default)]
    pub layout: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetRecord {
    pub id: WidgetId,
    pub page: PageRef,
    pub table: TableRef,
    pub kind: WidgetKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chart_kind: Option<ChartKind>,
    #[serde(default)]
    pub chart_options: Option<Map<String, Value>>,
    /// Chart columns, x axis first
    #[serde(default)]
    pub fields: Vec<ColumnRef>,
    #[serde(default)]
    pub link_source: Option<WidgetId>,
}

/// Serializable document contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    #[serde(default)]
    pub tables: Vec<TableRecord>,
    #[serde(default)]
    pub pages: Vec<PageRecord>,
    #[serde(default)]
    pub widgets: Vec<WidgetRecord>,
    #[serde(default)]
    next_id: u64,
}

impl DocumentState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Make sure freshly allocated ids never collide with loaded ones
    fn settle_next_id(&mut self) {
        let max_table = self.tables.iter().map(|t| t.id.0);
        let max_column = self.tables.iter().flat_map(|t| t.columns.iter().map(|c| c.id.0));
        let max_page = self.pages.iter().map(|p| p.id.0);
        let max_widget = self.widgets.iter().map(|w| w.id.0);
        let max = max_table
            .chain(max_column)
            .chain(max_page)
            .chain(max_widget)
            .max()
            .unwrap_or(0);
        self.next_id = self.next_id.max(max);
    }

    fn table(&self, id: TableRef) -> Option<&TableRecord> {
        self.tables.iter().find(|t| t.id == id)
    }

    fn page_mut(&mut self, id: PageRef) -> Result<&mut PageRecord, String> {
        self.pages
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| format!("page {} does not exist", id))
    }

    fn widget_mut(&mut self, id: WidgetId) -> Result<&mut WidgetRecord, String> {
        self.widgets
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| format!("widget {} does not exist", id))
    }

    fn apply_action(&mut self, action: &DocAction) -> Result<Value, String> {
        match action {
            DocAction::CreateWidget { table, page, kind } => {
                let table_name = self
                    .table(*table)
                    .map(|t| t.name.clone())
                    .ok_or_else(|| format!("table {} does not exist", table))?;
                let page = match page {
                    Some(page) => self.page_mut(*page)?.id,
                    None => {
                        let id = PageRef(self.allocate());
                        self.pages.push(PageRecord {
                            id,
                            name: table_name,
                            layout: None,
                        });
                        id
                    }
                };
                let widget = WidgetId(self.allocate());
                self.widgets.push(WidgetRecord {
                    id: widget,
                    page,
                    table: *table,
                    kind: *kind,
                    title: None,
                    chart_kind: None,
                    chart_options: None,
                    fields: Vec::new(),
                    link_source: None,
                });
                Ok(json!({ "pageRef": page.0, "widgetRef": widget.0 }))
            }
            DocAction::RenamePage { page, name } => {
                if name.trim().is_empty() {
                    return Err("page name must not be empty".to_string());
                }
                self.page_mut(*page)?.name = name.clone();
                Ok(Value::Null)
            }
            DocAction::ConfigureWidget {
                widget,
                title,
                chart_kind,
                chart_options,
            } => {
                let record = self.widget_mut(*widget)?;
                if record.kind != WidgetKind::Chart && (chart_kind.is_some() || chart_options.is_some()) {
                    return Err(format!("widget {} is not a chart", widget));
                }
                if title.is_some() {
                    record.title = title.clone();
                }
                if chart_kind.is_some() {
                    record.chart_kind = *chart_kind;
                }
                if chart_options.is_some() {
                    record.chart_options = chart_options.clone();
                }
                Ok(Value::Null)
            }
            DocAction::SetChartFields { widget, x, y } => {
                let (kind, table) = {
                    let record = self.widget_mut(*widget)?;
                    (record.kind, record.table)
                };
                if kind != WidgetKind::Chart {
                    return Err(format!("widget {} is not a chart", widget));
                }
                let columns: Vec<ColumnRef> = x.iter().chain(y.iter()).copied().collect();
                let known = self.table(table).map(|t| &t.columns[..]).unwrap_or(&[]);
                if let Some(col) = columns.iter().find(|c| !known.iter().any(|k| k.id == **c)) {
                    return Err(format!("column {} does not belong to table {}", col, table));
                }
                self.widget_mut(*widget)?.fields = columns;
                Ok(Value::Null)
            }
            DocAction::SetLayout { page, layout } => {
                let tree = parse_stored_layout(layout).map_err(|e| e.to_string())?;
                let mut seen = Vec::new();
                for id in tree.leaves() {
                    let on_page = self.widgets.iter().any(|w| w.id == *id && w.page == *page);
                    if !on_page {
                        return Err(format!("widget {} is not on page {}", id, page));
                    }
                    if seen.contains(id) {
                        return Err(format!("widget {} is placed twice", id));
                    }
                    seen.push(*id);
                }
                self.page_mut(*page)?.layout = Some(layout.clone());
                Ok(Value::Null)
            }
            DocAction::RemoveWidget { widget } => {
                let page = self.widget_mut(*widget)?.page;
                let placed = self
                    .pages
                    .iter()
                    .find(|p| p.id == page)
                    .and_then(|p| p.layout.as_ref())
                    .and_then(|l| parse_stored_layout(l).ok())
                    .map(|tree| tree.leaves().contains(&widget))
                    .unwrap_or(false);
                if placed {
                    return Err(format!("widget {} is still placed in the layout of page {}", widget, page));
                }
                self.widgets.retain(|w| w.id != *widget);
                for other in &mut self.widgets {
                    if other.link_source == Some(*widget) {
                        other.link_source = None;
                    }
                }
                Ok(Value::Null)
            }
        }
    }
}

/// Document held in memory behind a lock
#[derive(Debug, Default)]
pub struct MemoryDocument {
    state: Mutex<DocumentState>,
    batches: Mutex<Vec<Vec<DocAction>>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(mut state: DocumentState) -> Self {
        state.settle_next_id();
        Self {
            state: Mutex::new(state),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Load a document from its JSON snapshot
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_state(serde_json::from_str(source)?))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&*self.state())
    }

    fn state(&self) -> MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> DocumentState {
        self.state().clone()
    }

    pub fn add_table(&self, name: &str, columns: &[&str]) -> TableRef {
        let mut state = self.state();
        let id = TableRef(state.allocate());
        let columns = columns
            .iter()
            .map(|c| ColumnRecord {
                id: ColumnRef(state.allocate()),
                name: c.to_string(),
            })
            .collect();
        state.tables.push(TableRecord {
            id,
            name: name.to_string(),
            columns,
        });
        id
    }

    pub fn add_page(&self, name: &str) -> PageRef {
        let mut state = self.state();
        let id = PageRef(state.allocate());
        state.pages.push(PageRecord {
            id,
            name: name.to_string(),
            layout: None,
        });
        id
    }

    pub fn add_widget(&self, page: PageRef, table: TableRef, kind: WidgetKind, title: Option<&str>) -> WidgetId {
        let mut state = self.state();
        let id = WidgetId(state.allocate());
        state.widgets.push(WidgetRecord {
            id,
            page,
            table,
            kind,
            title: title.map(String::from),
            chart_kind: None,
            chart_options: None,
            fields: Vec::new(),
            link_source: None,
        });
        id
    }

    /// Store a layout directly, bypassing action checks
    pub fn set_page_layout(&self, page: PageRef, layout: Value) {
        if let Some(record) = self.state().pages.iter_mut().find(|p| p.id == page) {
            record.layout = Some(layout);
        }
    }

    pub fn link_widgets(&self, widget: WidgetId, source: WidgetId) {
        if let Some(record) = self.state().widgets.iter_mut().find(|w| w.id == widget) {
            record.link_source = Some(source);
        }
    }

    pub fn widget(&self, id: WidgetId) -> Option<WidgetRecord> {
        self.state().widgets.iter().find(|w| w.id == id).cloned()
    }

    pub fn page(&self, id: PageRef) -> Option<PageRecord> {
        self.state().pages.iter().find(|p| p.id == id).cloned()
    }

    pub fn pages(&self) -> Vec<PageRecord> {
        self.state().pages.clone()
    }

    /// Every batch applied so far, in order
    pub fn applied_batches(&self) -> Vec<Vec<DocAction>> {
        self.batches.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl RemoteApply for MemoryDocument {
    async fn apply(&self, actions: Vec<DocAction>) -> Result<Vec<Value>, BackendError> {
        let mut state = self.state();
        let mut working = state.clone();
        let mut results = Vec::with_capacity(actions.len());
        for (index, action) in actions.iter().enumerate() {
            let value = working
                .apply_action(action)
                .map_err(|message| BackendError::Rejected {
                    index,
                    action: action.name(),
                    message,
                })?;
            results.push(value);
        }
        *state = working;
        drop(state);

        self.batches.lock().unwrap_or_else(|e| e.into_inner()).push(actions);
        Ok(results)
    }
}

#[async_trait]
impl DocumentCatalog for MemoryDocument {
    async fn table_ref(&self, table: &str) -> Result<Option<TableRef>, BackendError> {
        Ok(self.state().tables.iter().find(|t| t.name == table).map(|t| t.id))
    }

    async fn column_ref(&self, table: &str, column: &str) -> Result<Option<ColumnRef>, BackendError> {
        Ok(self
            .state()
            .tables
            .iter()
            .find(|t| t.name == table)
            .and_then(|t| t.columns.iter().find(|c| c.name == column))
            .map(|c| c.id))
    }

    async fn page_by_name(&self, name: &str) -> Result<Option<PageRef>, BackendError> {
        Ok(self.state().pages.iter().find(|p| p.name == name).map(|p| p.id))
    }

    async fn widget_by_title(&self, page: PageRef, title: &str) -> Result<Option<WidgetId>, BackendError> {
        Ok(self
            .state()
            .widgets
            .iter()
            .find(|w| w.page == page && w.title.as_deref() == Some(title))
            .map(|w| w.id))
    }

    async fn page_widgets(&self, page: PageRef) -> Result<Vec<WidgetInfo>, BackendError> {
        let state = self.state();
        if !state.pages.iter().any(|p| p.id == page) {
            return Err(BackendError::UnknownPage(page));
        }
        Ok(state
            .widgets
            .iter()
            .filter(|w| w.page == page)
            .map(|w| WidgetInfo {
                id: w.id,
                table: state.table(w.table).map(|t| t.name.clone()).unwrap_or_default(),
                kind: w.kind,
                title: w.title.clone(),
                link_source: w.link_source,
            })
            .collect())
    }

    async fn page_layout(&self, page: PageRef) -> Result<Option<Value>, BackendError> {
        self.state()
            .pages
            .iter()
            .find(|p| p.id == page)
            .map(|p| p.layout.clone())
            .ok_or(BackendError::UnknownPage(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_on_new_page_allocates_page() {
        let doc = MemoryDocument::new();
        let table = doc.add_table("Sales", &["Month", "Total"]);

        let out = doc
            .apply(vec![DocAction::CreateWidget {
                table,
                page: None,
                kind: WidgetKind::Grid,
            }])
            .await
            .unwrap();

        let page = PageRef(out[0]["pageRef"].as_u64().unwrap());
        let widget = WidgetId(out[0]["widgetRef"].as_u64().unwrap());
        assert_eq!(doc.page(page).unwrap().name, "Sales");
        assert_eq!(doc.widget(widget).unwrap().page, page);
    }

    #[tokio::test]
    async fn test_batch_is_atomic() {
        let doc = MemoryDocument::new();
        let table = doc.add_table("Sales", &[]);
        let page = doc.add_page("Overview");

        let err = doc
            .apply(vec![
                DocAction::CreateWidget {
                    table,
                    page: Some(page),
                    kind: WidgetKind::Grid,
                },
                DocAction::RenamePage {
                    page: PageRef(999),
                    name: "x".to_string(),
                },
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Rejected { index: 1, .. }));
        assert!(doc.page_widgets(page).await.unwrap().is_empty());
        assert!(doc.applied_batches().is_empty());
    }

    #[tokio::test]
    async fn test_set_layout_rejects_foreign_widget() {
        let doc = MemoryDocument::new();
        let table = doc.add_table("Sales", &[]);
        let a = doc.add_page("A");
        let b = doc.add_page("B");
        let on_b = doc.add_widget(b, table, WidgetKind::Grid, None);

        let err = doc
            .apply(vec![DocAction::SetLayout {
                page: a,
                layout: json!({ "leaf": on_b.0 }),
            }])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not on page"));
    }

    #[tokio::test]
    async fn test_remove_placed_widget_rejected() {
        let doc = MemoryDocument::new();
        let table = doc.add_table("Sales", &[]);
        let page = doc.add_page("A");
        let w = doc.add_widget(page, table, WidgetKind::Grid, None);
        doc.set_page_layout(page, json!({ "leaf": w.0 }));

        let err = doc.apply(vec![DocAction::RemoveWidget { widget: w }]).await.unwrap_err();
        assert!(err.to_string().contains("still placed"));
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_keeps_ids_fresh() {
        let doc = MemoryDocument::new();
        let table = doc.add_table("Sales", &["Month"]);
        let page = doc.add_page("A");
        doc.add_widget(page, table, WidgetKind::Card, Some("Detail"));

        let reloaded = MemoryDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(reloaded.snapshot(), doc.snapshot());

        let next = reloaded.add_page("B");
        assert!(next.0 > page.0);
        assert_eq!(
            reloaded.widget_by_title(page, "Detail").await.unwrap(),
            doc.widget_by_title(page, "Detail").await.unwrap()
        );
    }
}

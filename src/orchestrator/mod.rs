//! Widget orchestration: create new widgets one by one and link them up
//!
//! Calls are strictly sequential. On a fresh page the first creation is what
//! allocates the page, and every later creation must target the page
//! reference it returned. Any failure stops the run; widgets created so far
//! stay on the backend and are reported through [`PartialFailure`].

mod registry;

pub use registry::WidgetRegistry;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, ColumnRef, DocAction, DocumentBackend, PageRef, WidgetId};
use crate::layout::{LayoutError, NewWidgetSpec, PlaceholderMap};

/// Where new widgets go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTarget {
    /// Let the first widget creation allocate the page
    NewPage,
    Existing(PageRef),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestrationError {
    #[error("table '{table}' not found")]
    TableNotFound { table: String },

    #[error("column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("backend rejected the request: {0}")]
    RemoteApply(#[from] BackendError),

    #[error("internal invariant violated: {0}")]
    Invariant(#[from] LayoutError),

    #[error("internal invariant violated: no page reference after creating the first widget")]
    MissingPageRef,

    #[error("internal invariant violated: widget created on page {got}, expected page {expected}")]
    PageMismatch { expected: PageRef, got: PageRef },

    #[error("internal invariant violated: unexpected response to {action}: {response}")]
    UnexpectedResponse { action: &'static str, response: String },
}

impl OrchestrationError {
    /// Whether this error points at a bug rather than at input or the backend
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Invariant(_) | Self::MissingPageRef | Self::PageMismatch { .. } | Self::UnexpectedResponse { .. }
        )
    }
}

/// A run that stopped part way. Nothing is rolled back.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error} ({widgets_created} widget(s) created before the failure)")]
pub struct PartialFailure {
    pub widgets_created: usize,
    /// Widgets created before the failure, in creation order
    pub created: Vec<WidgetId>,
    /// Page the widgets went to, if one was known or allocated
    pub page: Option<PageRef>,
    #[source]
    pub error: OrchestrationError,
}

/// Widgets created by a successful run
#[derive(Debug, Clone)]
pub struct CreatedWidgets {
    pub page: PageRef,
    /// Identifiers in creation order
    pub widgets: Vec<WidgetId>,
    pub placeholders: PlaceholderMap,
    pub registry: WidgetRegistry,
}

/// One orchestration run against a backend
pub struct Orchestrator<'a, B: DocumentBackend + ?Sized> {
    backend: &'a B,
    page: Option<PageRef>,
    registry: WidgetRegistry,
    placeholders: PlaceholderMap,
    created: Vec<WidgetId>,
}

impl<'a, B: DocumentBackend + ?Sized> Orchestrator<'a, B> {
    /// Start a run. `kept` seeds the registry with widgets staying on the page.
    pub fn new(
        backend: &'a B,
        target: PageTarget,
        placeholders: PlaceholderMap,
        kept: impl IntoIterator<Item = WidgetId>,
    ) -> Self {
        let page = match target {
            PageTarget::NewPage => None,
            PageTarget::Existing(page) => Some(page),
        };
        Self {
            backend,
            page,
            registry: WidgetRegistry::seeded(kept),
            placeholders,
            created: Vec::new(),
        }
    }

    /// Create and configure every widget in `widgets`, in order.
    ///
    /// `widgets[i]` fills placeholder `i`.
    pub async fn run(mut self, widgets: &[NewWidgetSpec]) -> Result<CreatedWidgets, PartialFailure> {
        for (index, spec) in widgets.iter().enumerate() {
            if let Err(error) = self.create_one(index, spec).await {
                return Err(self.fail(error));
            }
        }

        let Some(page) = self.page else {
            return Err(self.fail(OrchestrationError::MissingPageRef));
        };
        Ok(CreatedWidgets {
            page,
            widgets: self.created,
            placeholders: self.placeholders,
            registry: self.registry,
        })
    }

    fn fail(self, error: OrchestrationError) -> PartialFailure {
        warn!(
            widgets_created = self.created.len(),
            page = ?self.page,
            error = %error,
            "widget orchestration stopped; created widgets are left in place"
        );
        PartialFailure {
            widgets_created: self.created.len(),
            created: self.created,
            page: self.page,
            error,
        }
    }

    async fn create_one(&mut self, index: usize, spec: &NewWidgetSpec) -> Result<(), OrchestrationError> {
        let table = self
            .backend
            .table_ref(&spec.table)
            .await?
            .ok_or_else(|| OrchestrationError::TableNotFound {
                table: spec.table.clone(),
            })?;

        debug!(index, table = %spec.table, kind = %spec.kind, page = ?self.page, "creating widget");
        let action = DocAction::CreateWidget {
            table,
            page: self.page,
            kind: spec.kind,
        };
        let name = action.name();
        let results = self.backend.apply(vec![action]).await?;
        let (page, widget) = parse_created(name, results.first())?;

        match self.page {
            None => {
                info!(page = %page, "page allocated by first widget creation");
                self.page = Some(page);
            }
            Some(expected) if expected != page => {
                return Err(OrchestrationError::PageMismatch { expected, got: page });
            }
            Some(_) => {}
        }

        self.registry.register(widget)?;
        self.placeholders.bind(index, widget)?;
        self.created.push(widget);

        self.configure(widget, spec).await
    }

    async fn configure(&self, widget: WidgetId, spec: &NewWidgetSpec) -> Result<(), OrchestrationError> {
        if !spec.needs_configuration() {
            return Ok(());
        }

        let mut actions = Vec::new();
        if spec.title.is_some() || spec.chart_kind.is_some() || spec.chart_options.is_some() {
            actions.push(DocAction::ConfigureWidget {
                widget,
                title: spec.title.clone(),
                chart_kind: spec.chart_kind,
                chart_options: spec.chart_options.clone(),
            });
        }
        if spec.is_chart() && spec.has_axes() {
            let x = match &spec.x_axis {
                Some(column) => Some(self.column(&spec.table, column).await?),
                None => None,
            };
            let mut y = Vec::with_capacity(spec.y_axis.len());
            for column in &spec.y_axis {
                y.push(self.column(&spec.table, column).await?);
            }
            actions.push(DocAction::SetChartFields { widget, x, y });
        }

        debug!(widget = %widget, actions = actions.len(), "configuring widget");
        self.backend.apply(actions).await?;
        Ok(())
    }

    async fn column(&self, table: &str, column: &str) -> Result<ColumnRef, OrchestrationError> {
        self.backend
            .column_ref(table, column)
            .await?
            .ok_or_else(|| OrchestrationError::ColumnNotFound {
                table: table.to_string(),
                column: column.to_string(),
            })
    }
}

/// Pull `(page, widget)` out of a create-widget return value
fn parse_created(action: &'static str, value: Option<&Value>) -> Result<(PageRef, WidgetId), OrchestrationError> {
    let unexpected = || OrchestrationError::UnexpectedResponse {
        action,
        response: value.map(|v| v.to_string()).unwrap_or_else(|| "nothing".to_string()),
    };
    let value = value.ok_or_else(unexpected)?;
    let widget = value
        .get("widgetRef")
        .and_then(Value::as_u64)
        .ok_or_else(unexpected)?;
    let page = match value.get("pageRef").and_then(Value::as_u64) {
        Some(0) | None => return Err(OrchestrationError::MissingPageRef),
        Some(page) => page,
    };
    Ok((PageRef(page), WidgetId(widget)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_created() {
        let value = json!({ "pageRef": 4, "widgetRef": 9 });
        assert_eq!(
            parse_created("CreateViewSection", Some(&value)).unwrap(),
            (PageRef(4), WidgetId(9))
        );
    }

    #[test]
    fn test_parse_created_without_page() {
        let value = json!({ "widgetRef": 9 });
        assert_eq!(
            parse_created("CreateViewSection", Some(&value)),
            Err(OrchestrationError::MissingPageRef)
        );
        assert!(OrchestrationError::MissingPageRef.is_internal());
    }

    #[test]
    fn test_parse_created_garbage() {
        let err = parse_created("CreateViewSection", Some(&json!(null))).unwrap_err();
        assert!(matches!(err, OrchestrationError::UnexpectedResponse { .. }));
        assert!(!OrchestrationError::TableNotFound { table: "T".into() }.is_internal());
    }
}

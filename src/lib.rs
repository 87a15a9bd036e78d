//! Page Compiler - declarative page layouts for spreadsheet documents
//!
//! Callers describe a page as a recursive tree of splits and widgets, some of
//! which already exist and some of which must be created. This crate validates
//! that description, compiles it to the backend's layout tree with placeholder
//! leaves for widgets that do not exist yet, creates those widgets one call at
//! a time, links the placeholders to the new identifiers, and commits the
//! finished layout in a single final call. The reverse direction reconstructs
//! a readable tree from what the backend stores.
//!
//! # Example
//!
//! ```rust
//! use page_compiler::{compile_and_create_page, backend::MemoryDocument, ServiceConfig};
//! use serde_json::json;
//!
//! let doc = MemoryDocument::new();
//! doc.add_table("Sales", &["Month", "Total"]);
//!
//! let layout = json!({
//!     "split": "horizontal",
//!     "children": [
//!         { "new_widget": { "table": "Sales", "widget_type": "grid" } },
//!         { "new_widget": { "table": "Sales", "widget_type": "chart", "chart_type": "bar" } },
//!     ],
//! });
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let created = runtime
//!     .block_on(compile_and_create_page(&doc, "Sales overview", &layout, &ServiceConfig::default()))
//!     .unwrap();
//! assert_eq!(created.widgets_created, 2);
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod layout;
pub mod orchestrator;

pub use backend::{DocumentBackend, PageRef, WidgetId};
pub use config::{ConfigError, ServiceConfig};
pub use error::{parse_json, InputError};
pub use layout::{
    DecompiledLayout, LayoutError, LayoutLimits, ReconciliationError, ValidationError, WidgetSelector,
};
pub use orchestrator::{OrchestrationError, PartialFailure};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use backend::{BackendError, DocAction};
use layout::{
    compile, decompile, resolve_placeholders, validate_json, CompiledLayoutNode, ReconciliationSets,
    ResolvedLayout, ValidationMode,
};
use orchestrator::{CreatedWidgets, Orchestrator, PageTarget};

/// Errors that can occur in the page operations
#[derive(Debug, Error)]
pub enum PageError {
    /// The layout description is malformed; nothing was sent to the backend
    #[error("invalid layout: {}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),

    /// The new layout does not account for every widget on the page
    #[error("{0}")]
    Reconciliation(#[from] ReconciliationError),

    #[error("page '{0}' not found")]
    PageNotFound(String),

    #[error("widget \"{title}\" not found on page {page}")]
    WidgetNotFound { page: PageRef, title: String },

    /// Compiler bug; nothing was sent to the backend
    #[error("layout compiler error: {0}")]
    Compile(#[from] LayoutError),

    /// Failure after mutations may have started; see `widgets_created`
    #[error(transparent)]
    Orchestration(#[from] PartialFailure),

    #[error("{0}")]
    Decompile(#[from] layout::DecompileError),

    /// Backend failure on a read, before anything was changed
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("invalid layout limits: {0}")]
    InvalidLimits(String),
}

impl From<Vec<ValidationError>> for PageError {
    fn from(errors: Vec<ValidationError>) -> Self {
        PageError::Validation(errors)
    }
}

impl PageError {
    /// Number of widgets created before the failure
    pub fn widgets_created(&self) -> usize {
        match self {
            PageError::Orchestration(partial) => partial.widgets_created,
            _ => 0,
        }
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A page given by identifier or by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSelector {
    Id(PageRef),
    Name(String),
}

/// Accepts `id:<n>`, `name:<text>`, or a bare value (numbers are ids)
impl FromStr for PageSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix("name:") {
            return Ok(PageSelector::Name(name.to_string()));
        }
        if let Some(id) = s.strip_prefix("id:") {
            return id
                .parse::<u64>()
                .map(|id| PageSelector::Id(PageRef(id)))
                .map_err(|_| format!("'{}' is not a page id", id));
        }
        Ok(match s.parse::<u64>() {
            Ok(id) => PageSelector::Id(PageRef(id)),
            Err(_) => PageSelector::Name(s.to_string()),
        })
    }
}

impl fmt::Display for PageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSelector::Id(id) => write!(f, "{}", id),
            PageSelector::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// Result of creating a page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedPage {
    pub page: PageRef,
    /// New widget identifiers in creation order
    pub widget_ids: Vec<WidgetId>,
    pub widgets_created: usize,
}

/// Result of rearranging an existing page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutUpdate {
    pub page: PageRef,
    pub widgets_added: usize,
    pub widgets_removed: usize,
    pub added: Vec<WidgetId>,
    pub removed: Vec<WidgetId>,
}

/// Create a new page holding the widgets described by `layout`.
///
/// The layout must define at least one new widget and cannot reference
/// existing ones. The first widget creation allocates the page; the page is
/// named and its layout committed in one final batch.
pub async fn compile_and_create_page<B>(
    backend: &B,
    page_name: &str,
    layout: &Value,
    config: &ServiceConfig,
) -> Result<CreatedPage, PageError>
where
    B: DocumentBackend + ?Sized,
{
    let limits = &config.limits;
    limits.check().map_err(PageError::InvalidLimits)?;
    let validated = match (
        validate_json(layout, limits, ValidationMode::CreatePage),
        page_name.trim().is_empty(),
    ) {
        (Ok(validated), false) => validated,
        (Ok(_), true) => return Err(vec![ValidationError::EmptyPageName].into()),
        (Err(mut errors), blank) => {
            if blank {
                errors.push(ValidationError::EmptyPageName);
            }
            return Err(errors.into());
        }
    };
    let compiled = compile(&validated, limits)?;
    info!(page_name, new_widgets = validated.new_widgets.len(), "creating page");

    let created = Orchestrator::new(
        backend,
        PageTarget::NewPage,
        compiled.placeholders,
        std::iter::empty::<WidgetId>(),
    )
    .run(&validated.new_widgets)
    .await?;

    let resolved = link(&compiled.root, &created).map_err(|e| partial(&created, e))?;
    let actions = vec![
        DocAction::RenamePage {
            page: created.page,
            name: page_name.to_string(),
        },
        DocAction::SetLayout {
            page: created.page,
            layout: resolved.to_stored(),
        },
    ];
    commit(backend, created.page, actions)
        .await
        .map_err(|e| partial(&created, e))?;

    info!(page = %created.page, widgets = created.widgets.len(), "page created");
    Ok(CreatedPage {
        page: created.page,
        widgets_created: created.widgets.len(),
        widget_ids: created.widgets,
    })
}

/// Replace the layout of an existing page.
///
/// Every widget currently on the page must either appear in `layout` or be
/// listed in `remove`. New widgets are created on the page first; the layout
/// and the removals are then committed in one batch.
pub async fn compile_and_set_layout<B>(
    backend: &B,
    page: &PageSelector,
    layout: &Value,
    remove: &[WidgetSelector],
    config: &ServiceConfig,
) -> Result<LayoutUpdate, PageError>
where
    B: DocumentBackend + ?Sized,
{
    let limits = &config.limits;
    limits.check().map_err(PageError::InvalidLimits)?;
    let validated = validate_json(layout, limits, ValidationMode::ModifyPage)?;
    let page = resolve_page(backend, page).await?;
    let on_page = backend.page_widgets(page).await?;

    let wanted: Vec<String> = validated
        .titles()
        .into_iter()
        .map(String::from)
        .chain(remove.iter().filter_map(|sel| match sel {
            WidgetSelector::Title(title) => Some(title.clone()),
            WidgetSelector::Id(_) => None,
        }))
        .collect();
    let mut titles: HashMap<String, WidgetId> = HashMap::new();
    for title in wanted {
        if titles.contains_key(&title) {
            continue;
        }
        let id = backend
            .widget_by_title(page, &title)
            .await?
            .ok_or_else(|| PageError::WidgetNotFound {
                page,
                title: title.clone(),
            })?;
        titles.insert(title, id);
    }

    let validated = validated
        .bind_titles(&titles)
        .map_err(|e| PageError::Validation(vec![e]))?;
    let to_remove: Vec<WidgetId> = remove
        .iter()
        .filter_map(|sel| match sel {
            WidgetSelector::Id(id) => Some(*id),
            WidgetSelector::Title(title) => titles.get(title).copied(),
        })
        .collect();

    let sets = ReconciliationSets::new(
        on_page.iter().map(|w| w.id),
        validated.existing_ids(),
        to_remove,
    );
    sets.check()?;
    let compiled = compile(&validated, limits)?;
    info!(
        page = %page,
        new_widgets = validated.new_widgets.len(),
        removing = sets.to_remove.len(),
        "updating page layout"
    );

    let created = Orchestrator::new(backend, PageTarget::Existing(page), compiled.placeholders, sets.kept())
        .run(&validated.new_widgets)
        .await?;

    let resolved = link(&compiled.root, &created).map_err(|e| partial(&created, e))?;
    let mut actions = vec![DocAction::SetLayout {
        page,
        layout: resolved.to_stored(),
    }];
    actions.extend(
        sets.to_remove
            .iter()
            .map(|widget| DocAction::RemoveWidget { widget: *widget }),
    );
    commit(backend, page, actions)
        .await
        .map_err(|e| partial(&created, e))?;

    Ok(LayoutUpdate {
        page,
        widgets_added: created.widgets.len(),
        widgets_removed: sets.to_remove.len(),
        added: created.widgets,
        removed: sets.to_remove.into_iter().collect(),
    })
}

/// Read a page's layout back as an annotated declarative tree
pub async fn decompile_layout<B>(backend: &B, page: &PageSelector) -> Result<DecompiledLayout, PageError>
where
    B: DocumentBackend + ?Sized,
{
    let page = resolve_page(backend, page).await?;
    let widgets = backend.page_widgets(page).await?;
    let stored = backend.page_layout(page).await?;
    Ok(decompile(stored.as_ref(), &widgets)?)
}

async fn resolve_page<B>(backend: &B, page: &PageSelector) -> Result<PageRef, PageError>
where
    B: DocumentBackend + ?Sized,
{
    match page {
        PageSelector::Id(id) => Ok(*id),
        PageSelector::Name(name) => backend
            .page_by_name(name)
            .await?
            .ok_or_else(|| PageError::PageNotFound(name.clone())),
    }
}

/// Substitute placeholders and make sure every placed widget is on the page
fn link(root: &CompiledLayoutNode, created: &CreatedWidgets) -> Result<ResolvedLayout, LayoutError> {
    let resolved = resolve_placeholders(root, &created.placeholders)?;
    created.registry.check_placed(resolved.leaves())?;
    Ok(resolved)
}

async fn commit<B>(backend: &B, page: PageRef, actions: Vec<DocAction>) -> Result<(), BackendError>
where
    B: DocumentBackend + ?Sized,
{
    debug!(page = %page, actions = actions.len(), "committing layout");
    backend.apply(actions).await.map(|_| ())
}

/// Failure after all widgets were created but before the layout was committed
fn partial(created: &CreatedWidgets, error: impl Into<OrchestrationError>) -> PageError {
    let error = error.into();
    warn!(
        page = %created.page,
        widgets_created = created.widgets.len(),
        error = %error,
        "layout not committed; created widgets remain unplaced"
    );
    PageError::Orchestration(PartialFailure {
        widgets_created: created.widgets.len(),
        created: created.widgets.clone(),
        page: Some(created.page),
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::MemoryDocument;
    use layout::WidgetKind;
    use serde_json::json;

    fn config() -> ServiceConfig {
        ServiceConfig::default()
    }

    #[test]
    fn test_page_selector_from_str() {
        assert_eq!("12".parse::<PageSelector>().unwrap(), PageSelector::Id(PageRef(12)));
        assert_eq!(
            "Overview".parse::<PageSelector>().unwrap(),
            PageSelector::Name("Overview".to_string())
        );
        assert_eq!(
            "name:2024".parse::<PageSelector>().unwrap(),
            PageSelector::Name("2024".to_string())
        );
        assert_eq!("id:7".parse::<PageSelector>().unwrap(), PageSelector::Id(PageRef(7)));
        assert!("id:seven".parse::<PageSelector>().is_err());
    }

    #[tokio::test]
    async fn test_blank_page_name_makes_no_calls() {
        let doc = MemoryDocument::new();
        doc.add_table("Orders", &[]);
        let layout = json!({
            "split": "horizontal",
            "children": [
                { "new_widget": { "table": "Orders", "widget_type": "grid" } },
                { "new_widget": { "table": "Orders", "widget_type": "card" } }
            ]
        });

        let err = compile_and_create_page(&doc, "  ", &layout, &config())
            .await
            .unwrap_err();
        match err {
            PageError::Validation(errors) => assert_eq!(errors, vec![ValidationError::EmptyPageName]),
            other => panic!("expected validation errors, got {other:?}"),
        }
        assert!(doc.applied_batches().is_empty());
        assert!(doc.pages().is_empty());
    }

    #[tokio::test]
    async fn test_blank_page_name_reported_with_layout_errors() {
        let doc = MemoryDocument::new();
        let err = compile_and_create_page(&doc, "", &json!({ "existing_widget": 3 }), &config())
            .await
            .unwrap_err();
        match err {
            PageError::Validation(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors.last(), Some(&ValidationError::EmptyPageName));
            }
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_limits_rejected_before_any_call() {
        let doc = MemoryDocument::new();
        doc.add_table("Orders", &[]);
        let page = doc.add_page("Existing");
        let config = ServiceConfig {
            limits: LayoutLimits::default().with_default_ratio(f64::NAN),
        };
        let layout = json!({
            "split": "horizontal",
            "children": [
                { "new_widget": { "table": "Orders", "widget_type": "grid" } },
                { "new_widget": { "table": "Orders", "widget_type": "card" } }
            ]
        });

        let err = compile_and_create_page(&doc, "Orders", &layout, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::InvalidLimits(_)));

        let err = compile_and_set_layout(&doc, &PageSelector::Id(page), &layout, &[], &config)
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::InvalidLimits(_)));
        assert!(doc.applied_batches().is_empty());
    }

    #[test]
    fn test_validation_error_message_joins_all() {
        let err = PageError::Validation(vec![
            ValidationError::NoNewWidgets,
            ValidationError::TooManyWidgets { count: 3, max: 2 },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("at least one new widget"));
        assert!(msg.contains("; "));
        assert_eq!(err.widgets_created(), 0);
    }

    #[tokio::test]
    async fn test_create_page_names_page_and_commits_layout() {
        let doc = MemoryDocument::new();
        doc.add_table("Orders", &[]);

        let created = compile_and_create_page(
            &doc,
            "Orders",
            &json!({ "new_widget": { "table": "Orders", "widget_type": "grid", "title": "All orders" } }),
            &config(),
        )
        .await
        .unwrap();

        let page = doc.page(created.page).unwrap();
        assert_eq!(page.name, "Orders");
        assert_eq!(page.layout, Some(json!({ "leaf": created.widget_ids[0].0 })));
        assert_eq!(
            doc.widget(created.widget_ids[0]).unwrap().title.as_deref(),
            Some("All orders")
        );
    }

    #[tokio::test]
    async fn test_set_layout_by_names() {
        let doc = MemoryDocument::new();
        let table = doc.add_table("Orders", &[]);
        let page = doc.add_page("Orders");
        let grid = doc.add_widget(page, table, WidgetKind::Grid, Some("Grid"));
        let card = doc.add_widget(page, table, WidgetKind::Card, Some("Card"));
        doc.set_page_layout(page, json!({ "leaf": grid.0 }));

        let update = compile_and_set_layout(
            &doc,
            &PageSelector::Name("Orders".to_string()),
            &json!({ "existing_widget": "Grid" }),
            &[WidgetSelector::Title("Card".to_string())],
            &config(),
        )
        .await
        .unwrap();

        assert_eq!(update.widgets_removed, 1);
        assert_eq!(update.removed, vec![card]);
        assert!(doc.widget(card).is_none());
    }

    #[tokio::test]
    async fn test_unknown_widget_title() {
        let doc = MemoryDocument::new();
        let page = doc.add_page("Empty");
        let err = compile_and_set_layout(
            &doc,
            &PageSelector::Id(page),
            &json!({ "existing_widget": "Nope" }),
            &[],
            &config(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PageError::WidgetNotFound { .. }));
        assert!(doc.applied_batches().is_empty());
    }
}

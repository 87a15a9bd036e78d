//! Boundary to the document backend
//!
//! The compiler core only talks to the backend through two traits:
//! [`RemoteApply`] sends batches of primitive mutation actions, and
//! [`DocumentCatalog`] answers name lookups and read queries. Transport,
//! retries and authentication live behind implementations of these traits.

pub mod action;
pub mod memory;

pub use action::DocAction;
pub use memory::MemoryDocument;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::layout::WidgetKind;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Backend identifier of a table
    TableRef
);
id_type!(
    /// Backend identifier of a column
    ColumnRef
);
id_type!(
    /// Backend identifier of a page (view), allocated on first widget creation
    PageRef
);
id_type!(
    /// Backend identifier of a widget (view section)
    WidgetId
);

/// Metadata the backend reports for a widget on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetInfo {
    pub id: WidgetId,
    /// Name of the table the widget shows
    pub table: String,
    pub kind: WidgetKind,
    pub title: Option<String>,
    pub link_source: Option<WidgetId>,
}

/// Failures reported by a backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend refused a batch; nothing in the batch was applied
    #[error("action {index} ({action}) rejected: {message}")]
    Rejected {
        index: usize,
        action: &'static str,
        message: String,
    },

    #[error("page {0} does not exist")]
    UnknownPage(PageRef),

    /// Transport-level failure
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Applies ordered batches of mutation actions.
///
/// A batch is atomic on the backend side; nothing spans batches.
#[async_trait]
pub trait RemoteApply: Send + Sync {
    /// Apply `actions` in order, returning one value per action
    async fn apply(&self, actions: Vec<DocAction>) -> Result<Vec<Value>, BackendError>;
}

/// Read-only lookups against the document
#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    async fn table_ref(&self, table: &str) -> Result<Option<TableRef>, BackendError>;

    async fn column_ref(&self, table: &str, column: &str) -> Result<Option<ColumnRef>, BackendError>;

    async fn page_by_name(&self, name: &str) -> Result<Option<PageRef>, BackendError>;

    async fn widget_by_title(&self, page: PageRef, title: &str) -> Result<Option<WidgetId>, BackendError>;

    /// Widgets currently on `page`; fails with `UnknownPage` if it does not exist
    async fn page_widgets(&self, page: PageRef) -> Result<Vec<WidgetInfo>, BackendError>;

    /// Stored layout of `page`, if one was ever committed
    async fn page_layout(&self, page: PageRef) -> Result<Option<Value>, BackendError>;
}

/// Everything the page operations need from a backend
pub trait DocumentBackend: RemoteApply + DocumentCatalog {}

impl<T: RemoteApply + DocumentCatalog + ?Sized> DocumentBackend for T {}

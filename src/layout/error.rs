//! Error types for the layout compiler

use thiserror::Error;

use crate::backend::WidgetId;

use super::types::WidgetKind;

/// Problems found in a declarative layout before anything touches the backend.
///
/// Every variant carries the JSON path of the offending node (`$` is the root).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Node does not have the shape of a leaf or a split
    #[error("{path}: {message}")]
    Malformed { path: String, message: String },

    #[error("{path}: split ratio {ratio} must lie strictly between 0 and 1")]
    RatioOutOfRange { path: String, ratio: f64 },

    #[error("{path}: split has {count} children, expected between 2 and {max}")]
    ChildCount {
        path: String,
        count: usize,
        max: usize,
    },

    #[error("{path}: layout is nested deeper than {max} levels")]
    TooDeep { path: String, max: usize },

    #[error("{path}: chart widgets require a chart_type")]
    MissingChartKind { path: String },

    #[error("{path}: {field} is only valid on chart widgets, not on a {kind} widget")]
    ChartFieldOnNonChart {
        path: String,
        field: String,
        kind: WidgetKind,
    },

    #[error("{path}: widget {widget} is placed more than once")]
    DuplicateWidget { path: String, widget: String },

    #[error("{path}: existing widget {widget} cannot be placed on a new page")]
    ExistingOnNewPage { path: String, widget: String },

    #[error("a new page must contain at least one new widget")]
    NoNewWidgets,

    #[error("layout defines {count} new widgets, the limit is {max}")]
    TooManyWidgets { count: usize, max: usize },

    #[error("page name must not be empty")]
    EmptyPageName,
}

impl ValidationError {
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// JSON path of the offending node, if the error is tied to one
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Malformed { path, .. }
            | Self::RatioOutOfRange { path, .. }
            | Self::ChildCount { path, .. }
            | Self::TooDeep { path, .. }
            | Self::MissingChartKind { path }
            | Self::ChartFieldOnNonChart { path, .. }
            | Self::DuplicateWidget { path, .. }
            | Self::ExistingOnNewPage { path, .. } => Some(path),
            Self::NoNewWidgets | Self::TooManyWidgets { .. } | Self::EmptyPageName => None,
        }
    }
}

/// Broken invariants inside the compiler and linker.
///
/// These never come from bad user input; seeing one means a bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("placeholder {index} was never bound to a widget")]
    UnresolvedPlaceholder { index: usize },

    #[error("placeholder {index} is out of range ({len} new widgets)")]
    PlaceholderOutOfRange { index: usize, len: usize },

    #[error("placeholder {index} is already bound to widget {widget}")]
    PlaceholderRebound { index: usize, widget: WidgetId },

    #[error("widget {widget} is registered twice")]
    DuplicateWidgetId { widget: WidgetId },

    #[error("widget title \"{title}\" was not resolved before compilation")]
    UnboundTitle { title: String },

    #[error("compiled {found} placeholders but the creation order lists {expected} new widgets")]
    CreationOrderMismatch { expected: usize, found: usize },

    #[error("widget {widget} is placed in the layout but was never registered on the page")]
    UnregisteredWidget { widget: WidgetId },
}

//! Reconstruct a readable layout from what the backend stores
//!
//! This is the read path used by inspection tooling. Nothing is validated
//! beyond the structural parse; a malformed stored tree is reported as such.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::backend::{WidgetId, WidgetInfo};

use super::types::{Axis, DeclarativeLayoutNode, LayoutNode, ResolvedLayout, WidgetKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompileError {
    #[error("stored layout is malformed at {path}: {message}")]
    Malformed { path: String, message: String },
}

impl DecompileError {
    fn malformed(path: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Metadata attached to a decompiled leaf
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetDetails {
    pub table: String,
    pub widget_type: WidgetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Widget this one is linked to (selection follows the source)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_from: Option<WidgetId>,
}

/// Declarative tree annotated with widget metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecompiledNode {
    Widget {
        widget: WidgetId,
        /// Absent when the layout names a widget the page does not report
        #[serde(flatten)]
        details: Option<WidgetDetails>,
    },
    Split {
        split: Axis,
        ratio: f64,
        children: Vec<DecompiledNode>,
    },
}

impl DecompiledNode {
    /// Drop the metadata and return the equivalent declarative tree
    pub fn to_declarative(&self) -> DeclarativeLayoutNode {
        match self {
            DecompiledNode::Widget { widget, .. } => DeclarativeLayoutNode::existing(widget.0),
            DecompiledNode::Split {
                split,
                ratio,
                children,
            } => DeclarativeLayoutNode::Split {
                axis: *split,
                ratio: Some(*ratio),
                children: children.iter().map(|c| c.to_declarative()).collect(),
            },
        }
    }
}

/// Flat entry for enumerating a page's widgets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetSummary {
    pub widget: WidgetId,
    pub table: String,
    pub widget_type: WidgetKind,
    pub title: Option<String>,
}

/// Result of decompiling a page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecompiledLayout {
    /// `None` when the page has no committed layout
    pub tree: Option<DecompiledNode>,
    /// Placed widgets in layout order
    pub widgets: Vec<WidgetSummary>,
    /// Widgets on the page that the layout does not place
    pub unplaced: Vec<WidgetId>,
}

/// Parse the stored JSON form of a layout
pub fn parse_stored_layout(value: &Value) -> Result<ResolvedLayout, DecompileError> {
    parse_stored_node(value, "$")
}

fn parse_stored_node(value: &Value, path: &str) -> Result<ResolvedLayout, DecompileError> {
    let obj = value
        .as_object()
        .ok_or_else(|| DecompileError::malformed(path, "expected an object"))?;

    if let Some(leaf) = obj.get("leaf") {
        let id = leaf
            .as_u64()
            .ok_or_else(|| DecompileError::malformed(path, "leaf must be a widget id"))?;
        return Ok(LayoutNode::Leaf(WidgetId(id)));
    }

    let axis = obj
        .get("split")
        .and_then(Value::as_str)
        .and_then(Axis::parse)
        .ok_or_else(|| DecompileError::malformed(path, "expected a 'leaf' or a 'split' axis"))?;
    let ratio = obj
        .get("ratio")
        .and_then(Value::as_f64)
        .ok_or_else(|| DecompileError::malformed(path, "split is missing a numeric ratio"))?;
    let children = obj
        .get("children")
        .and_then(Value::as_array)
        .ok_or_else(|| DecompileError::malformed(path, "split is missing its children"))?
        .iter()
        .enumerate()
        .map(|(i, child)| parse_stored_node(child, &format!("{}.children[{}]", path, i)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LayoutNode::Split {
        axis,
        ratio,
        children,
    })
}

/// Rebuild the annotated tree and widget list for a page
pub fn decompile(stored: Option<&Value>, widgets: &[WidgetInfo]) -> Result<DecompiledLayout, DecompileError> {
    let info: HashMap<WidgetId, &WidgetInfo> = widgets.iter().map(|w| (w.id, w)).collect();

    let Some(stored) = stored else {
        return Ok(DecompiledLayout {
            tree: None,
            widgets: Vec::new(),
            unplaced: widgets.iter().map(|w| w.id).collect(),
        });
    };

    let layout = parse_stored_layout(stored)?;
    let tree = annotate(&layout, &info);

    let placed: Vec<WidgetId> = layout.leaves().into_iter().copied().collect();
    let summaries = placed
        .iter()
        .filter_map(|id| info.get(id))
        .map(|w| WidgetSummary {
            widget: w.id,
            table: w.table.clone(),
            widget_type: w.kind,
            title: w.title.clone(),
        })
        .collect();

    let placed: HashSet<WidgetId> = placed.into_iter().collect();
    let unplaced = widgets
        .iter()
        .map(|w| w.id)
        .filter(|id| !placed.contains(id))
        .collect();

    Ok(DecompiledLayout {
        tree: Some(tree),
        widgets: summaries,
        unplaced,
    })
}

fn annotate(node: &ResolvedLayout, info: &HashMap<WidgetId, &WidgetInfo>) -> DecompiledNode {
    match node {
        LayoutNode::Leaf(id) => DecompiledNode::Widget {
            widget: *id,
            details: info.get(id).map(|w| WidgetDetails {
                table: w.table.clone(),
                widget_type: w.kind,
                title: w.title.clone(),
                linked_from: w.link_source,
            }),
        },
        LayoutNode::Split {
            axis,
            ratio,
            children,
        } => DecompiledNode::Split {
            split: *axis,
            ratio: *ratio,
            children: children.iter().map(|c| annotate(c, info)).collect(),
        },
    }
}

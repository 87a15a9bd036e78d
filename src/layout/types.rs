//! Layout tree types shared by the compiler phases
//!
//! The declarative tree is what callers hand us. The compiled tree is generic
//! over its leaf type: `LayoutNode<LeafRef>` may still carry placeholders for
//! widgets that do not exist yet, while `LayoutNode<WidgetId>` is the fully
//! linked form and the only one that can be written to the backend.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::backend::WidgetId;

/// Direction in which a split arranges its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Horizontal => "horizontal",
            Axis::Vertical => "vertical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "horizontal" => Some(Axis::Horizontal),
            "vertical" => Some(Axis::Vertical),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of data-bound pane a widget shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Grid,
    Card,
    CardList,
    Chart,
    Form,
    Custom,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 6] = [
        WidgetKind::Grid,
        WidgetKind::Card,
        WidgetKind::CardList,
        WidgetKind::Chart,
        WidgetKind::Form,
        WidgetKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetKind::Grid => "grid",
            WidgetKind::Card => "card",
            WidgetKind::CardList => "card_list",
            WidgetKind::Chart => "chart",
            WidgetKind::Form => "form",
            WidgetKind::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Section type name the backend uses for this kind
    pub fn section_type(&self) -> &'static str {
        match self {
            WidgetKind::Grid => "record",
            WidgetKind::Card => "single",
            WidgetKind::CardList => "detail",
            WidgetKind::Chart => "chart",
            WidgetKind::Form => "form",
            WidgetKind::Custom => "custom",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chart flavour for chart widgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Area,
    Scatter,
    Donut,
    KaplanMeier,
}

impl ChartKind {
    pub const ALL: [ChartKind; 7] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Pie,
        ChartKind::Area,
        ChartKind::Scatter,
        ChartKind::Donut,
        ChartKind::KaplanMeier,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Area => "area",
            ChartKind::Scatter => "scatter",
            ChartKind::Donut => "donut",
            ChartKind::KaplanMeier => "kaplan_meier",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a widget that already exists on the page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WidgetSelector {
    Id(WidgetId),
    /// Human-readable widget title, resolved against the target page
    Title(String),
}

impl fmt::Display for WidgetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetSelector::Id(id) => write!(f, "{}", id),
            WidgetSelector::Title(title) => write!(f, "\"{}\"", title),
        }
    }
}

/// Accepts `id:<n>`, `title:<text>`, or a bare value (numbers are ids)
impl std::str::FromStr for WidgetSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(title) = s.strip_prefix("title:") {
            return Ok(WidgetSelector::Title(title.to_string()));
        }
        if let Some(id) = s.strip_prefix("id:") {
            return id
                .parse::<u64>()
                .map(|id| WidgetSelector::Id(WidgetId(id)))
                .map_err(|_| format!("'{}' is not a widget id", id));
        }
        Ok(match s.parse::<u64>() {
            Ok(id) => WidgetSelector::Id(WidgetId(id)),
            Err(_) => WidgetSelector::Title(s.to_string()),
        })
    }
}

/// Definition of a widget to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewWidgetSpec {
    /// Name of the table the widget shows
    pub table: String,
    pub kind: WidgetKind,
    pub title: Option<String>,
    /// Required iff `kind` is `Chart`
    pub chart_kind: Option<ChartKind>,
    pub chart_options: Option<Map<String, Value>>,
    /// Column name bound to the chart's x axis
    pub x_axis: Option<String>,
    /// Column names plotted as series, in order
    pub y_axis: Vec<String>,
}

impl NewWidgetSpec {
    pub fn new(table: impl Into<String>, kind: WidgetKind) -> Self {
        Self {
            table: table.into(),
            kind,
            title: None,
            chart_kind: None,
            chart_options: None,
            x_axis: None,
            y_axis: Vec::new(),
        }
    }

    pub fn chart(table: impl Into<String>, chart_kind: ChartKind) -> Self {
        Self {
            chart_kind: Some(chart_kind),
            ..Self::new(table, WidgetKind::Chart)
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_axes(mut self, x: impl Into<String>, y: &[&str]) -> Self {
        self.x_axis = Some(x.into());
        self.y_axis = y.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn is_chart(&self) -> bool {
        self.kind == WidgetKind::Chart
    }

    /// Whether any configuration call is needed after creation
    pub fn needs_configuration(&self) -> bool {
        self.title.is_some()
            || self.chart_kind.is_some()
            || self.chart_options.is_some()
            || self.has_axes()
    }

    pub fn has_axes(&self) -> bool {
        self.x_axis.is_some() || !self.y_axis.is_empty()
    }
}

/// User-supplied layout description
#[derive(Debug, Clone, PartialEq)]
pub enum DeclarativeLayoutNode {
    Existing(WidgetSelector),
    New(NewWidgetSpec),
    Split {
        axis: Axis,
        ratio: Option<f64>,
        children: Vec<DeclarativeLayoutNode>,
    },
}

impl DeclarativeLayoutNode {
    pub fn existing(id: u64) -> Self {
        DeclarativeLayoutNode::Existing(WidgetSelector::Id(WidgetId(id)))
    }

    pub fn split(axis: Axis, ratio: Option<f64>, children: Vec<DeclarativeLayoutNode>) -> Self {
        DeclarativeLayoutNode::Split {
            axis,
            ratio,
            children,
        }
    }

    /// Number of levels, a lone leaf being depth 1
    pub fn depth(&self) -> usize {
        match self {
            DeclarativeLayoutNode::Split { children, .. } => {
                1 + children.iter().map(|c| c.depth()).max().unwrap_or(0)
            }
            _ => 1,
        }
    }
}

/// Leaf of a compiled tree before linking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafRef {
    Real(WidgetId),
    /// Index into the creation order of new widgets
    Placeholder(usize),
}

/// Backend-shaped layout tree, generic over what sits in its leaves
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutNode<L> {
    Leaf(L),
    Split {
        axis: Axis,
        ratio: f64,
        children: Vec<LayoutNode<L>>,
    },
}

pub type CompiledLayoutNode = LayoutNode<LeafRef>;
pub type ResolvedLayout = LayoutNode<WidgetId>;

impl<L> LayoutNode<L> {
    /// Leaves in depth-first, left-to-right order
    pub fn leaves(&self) -> Vec<&L> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a L>) {
        match self {
            LayoutNode::Leaf(leaf) => out.push(leaf),
            LayoutNode::Split { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Rebuild the tree with every leaf mapped through `f`, stopping at the first error
    pub fn try_map_leaves<M, E>(
        &self,
        f: &mut impl FnMut(&L) -> Result<M, E>,
    ) -> Result<LayoutNode<M>, E> {
        Ok(match self {
            LayoutNode::Leaf(leaf) => LayoutNode::Leaf(f(leaf)?),
            LayoutNode::Split {
                axis,
                ratio,
                children,
            } => LayoutNode::Split {
                axis: *axis,
                ratio: *ratio,
                children: children
                    .iter()
                    .map(|c| c.try_map_leaves(f))
                    .collect::<Result<Vec<_>, E>>()?,
            },
        })
    }
}

impl LayoutNode<LeafRef> {
    /// Placeholder indexes still present, in tree order
    pub fn placeholders(&self) -> Vec<usize> {
        self.leaves()
            .into_iter()
            .filter_map(|leaf| match leaf {
                LeafRef::Placeholder(i) => Some(*i),
                LeafRef::Real(_) => None,
            })
            .collect()
    }

    /// Debug-friendly JSON view; placeholders show up as `{"placeholder": i}`
    pub fn to_json(&self) -> Value {
        match self {
            LayoutNode::Leaf(LeafRef::Real(id)) => json!({ "leaf": id.0 }),
            LayoutNode::Leaf(LeafRef::Placeholder(i)) => json!({ "placeholder": i }),
            LayoutNode::Split {
                axis,
                ratio,
                children,
            } => json!({
                "split": axis.as_str(),
                "ratio": ratio,
                "children": children.iter().map(|c| c.to_json()).collect::<Vec<_>>(),
            }),
        }
    }
}

impl LayoutNode<WidgetId> {
    /// Stored form written by the "set layout" action
    pub fn to_stored(&self) -> Value {
        match self {
            LayoutNode::Leaf(id) => json!({ "leaf": id.0 }),
            LayoutNode::Split {
                axis,
                ratio,
                children,
            } => json!({
                "split": axis.as_str(),
                "ratio": ratio,
                "children": children.iter().map(|c| c.to_stored()).collect::<Vec<_>>(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in WidgetKind::ALL {
            assert_eq!(WidgetKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(WidgetKind::CardList.section_type(), "detail");
        assert_eq!(ChartKind::parse("kaplan_meier"), Some(ChartKind::KaplanMeier));
        assert_eq!(ChartKind::parse("histogram"), None);
    }

    #[test]
    fn test_depth_counts_levels() {
        let leaf = DeclarativeLayoutNode::existing(1);
        assert_eq!(leaf.depth(), 1);

        let nested = DeclarativeLayoutNode::split(
            Axis::Vertical,
            None,
            vec![
                DeclarativeLayoutNode::existing(1),
                DeclarativeLayoutNode::split(
                    Axis::Horizontal,
                    None,
                    vec![
                        DeclarativeLayoutNode::existing(2),
                        DeclarativeLayoutNode::existing(3),
                    ],
                ),
            ],
        );
        assert_eq!(nested.depth(), 3);
    }

    #[test]
    fn test_selector_from_str() {
        assert_eq!(
            "42".parse::<WidgetSelector>().unwrap(),
            WidgetSelector::Id(WidgetId(42))
        );
        assert_eq!(
            "Sales chart".parse::<WidgetSelector>().unwrap(),
            WidgetSelector::Title("Sales chart".to_string())
        );
        assert_eq!(
            "title:2024".parse::<WidgetSelector>().unwrap(),
            WidgetSelector::Title("2024".to_string())
        );
        assert_eq!(
            "id:42".parse::<WidgetSelector>().unwrap(),
            WidgetSelector::Id(WidgetId(42))
        );
        assert!("id:".parse::<WidgetSelector>().is_err());
    }

    #[test]
    fn test_stored_form() {
        let tree: ResolvedLayout = LayoutNode::Split {
            axis: Axis::Horizontal,
            ratio: 0.25,
            children: vec![LayoutNode::Leaf(WidgetId(4)), LayoutNode::Leaf(WidgetId(9))],
        };
        assert_eq!(
            tree.to_stored(),
            json!({
                "split": "horizontal",
                "ratio": 0.25,
                "children": [{ "leaf": 4 }, { "leaf": 9 }],
            })
        );
    }
}

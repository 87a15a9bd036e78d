//! Parsing and structural validation of declarative layouts
//!
//! Input arrives as loosely typed JSON from the tool layer. [`parse_layout`]
//! turns it into a [`DeclarativeLayoutNode`] and [`validate`] checks the
//! structural rules, producing the creation order of new widgets and the
//! existing widgets the tree references. Both passes collect every problem
//! they find rather than stopping at the first one.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::backend::WidgetId;

use super::config::LayoutLimits;
use super::error::ValidationError;
use super::types::{Axis, ChartKind, DeclarativeLayoutNode, NewWidgetSpec, WidgetKind, WidgetSelector};

const SPLIT_KEYS: &[&str] = &["split", "ratio", "children"];
const EXISTING_KEYS: &[&str] = &["existing_widget"];
const NEW_KEYS: &[&str] = &["new_widget"];
const WIDGET_KEYS: &[&str] = &[
    "table",
    "widget_type",
    "title",
    "chart_type",
    "chart_options",
    "x_axis",
    "y_axis",
];

/// Which operation the layout is validated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Layout for a page that does not exist yet
    CreatePage,
    /// Rearrangement of an existing page
    ModifyPage,
}

/// A layout that passed validation, with its derived collections
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLayout {
    pub tree: DeclarativeLayoutNode,
    /// New widgets in creation order (depth-first, left to right)
    pub new_widgets: Vec<NewWidgetSpec>,
    /// Existing widgets referenced by the tree, in order of appearance
    pub existing: Vec<WidgetSelector>,
}

impl ValidatedLayout {
    /// Identifiers of referenced existing widgets that are already numeric
    pub fn existing_ids(&self) -> Vec<WidgetId> {
        self.existing
            .iter()
            .filter_map(|sel| match sel {
                WidgetSelector::Id(id) => Some(*id),
                WidgetSelector::Title(_) => None,
            })
            .collect()
    }

    /// Widget titles that still need resolving to identifiers
    pub fn titles(&self) -> Vec<&str> {
        self.existing
            .iter()
            .filter_map(|sel| match sel {
                WidgetSelector::Title(t) => Some(t.as_str()),
                WidgetSelector::Id(_) => None,
            })
            .collect()
    }

    /// Replace title references with the identifiers they resolved to.
    ///
    /// Titles missing from `resolved` are left in place. Fails if two
    /// references end up naming the same widget.
    pub fn bind_titles(self, resolved: &HashMap<String, WidgetId>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        let mut existing = Vec::new();
        let tree = bind_node(self.tree, "$", resolved, &mut seen, &mut existing)?;
        Ok(Self {
            tree,
            new_widgets: self.new_widgets,
            existing,
        })
    }
}

fn bind_node(
    node: DeclarativeLayoutNode,
    path: &str,
    resolved: &HashMap<String, WidgetId>,
    seen: &mut HashSet<WidgetSelector>,
    existing: &mut Vec<WidgetSelector>,
) -> Result<DeclarativeLayoutNode, ValidationError> {
    match node {
        DeclarativeLayoutNode::Existing(sel) => {
            let sel = match sel {
                WidgetSelector::Title(title) => match resolved.get(&title) {
                    Some(id) => WidgetSelector::Id(*id),
                    None => WidgetSelector::Title(title),
                },
                other => other,
            };
            if !seen.insert(sel.clone()) {
                return Err(ValidationError::DuplicateWidget {
                    path: path.to_string(),
                    widget: sel.to_string(),
                });
            }
            existing.push(sel.clone());
            Ok(DeclarativeLayoutNode::Existing(sel))
        }
        DeclarativeLayoutNode::New(spec) => Ok(DeclarativeLayoutNode::New(spec)),
        DeclarativeLayoutNode::Split {
            axis,
            ratio,
            children,
        } => {
            let children = children
                .into_iter()
                .enumerate()
                .map(|(i, child)| {
                    bind_node(child, &format!("{}.children[{}]", path, i), resolved, seen, existing)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DeclarativeLayoutNode::Split {
                axis,
                ratio,
                children,
            })
        }
    }
}

/// Parse and validate a JSON layout in one go
pub fn validate_json(
    value: &Value,
    limits: &LayoutLimits,
    mode: ValidationMode,
) -> Result<ValidatedLayout, Vec<ValidationError>> {
    let tree = parse_layout(value)?;
    validate(tree, limits, mode)
}

/// Turn loosely typed JSON into a declarative tree.
///
/// Only shape is checked here; semantic rules live in [`validate`].
pub fn parse_layout(value: &Value) -> Result<DeclarativeLayoutNode, Vec<ValidationError>> {
    let mut parser = JsonParser { errors: Vec::new() };
    match parser.node(value, "$") {
        Some(node) if parser.errors.is_empty() => Ok(node),
        _ => Err(parser.errors),
    }
}

struct JsonParser {
    errors: Vec<ValidationError>,
}

impl JsonParser {
    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(ValidationError::malformed(path, message));
    }

    fn check_keys(&mut self, obj: &Map<String, Value>, allowed: &[&str], path: &str) {
        for key in obj.keys() {
            if !allowed.contains(&key.as_str()) {
                self.error(
                    path,
                    format!("unknown field '{}' (expected one of: {})", key, allowed.join(", ")),
                );
            }
        }
    }

    fn node(&mut self, value: &Value, path: &str) -> Option<DeclarativeLayoutNode> {
        let Some(obj) = value.as_object() else {
            self.error(path, "expected a layout node object");
            return None;
        };

        let is_split = obj.contains_key("split");
        let is_existing = obj.contains_key("existing_widget");
        let is_new = obj.contains_key("new_widget");

        match (is_split, is_existing, is_new) {
            (true, false, false) => self.split(obj, path),
            (false, true, false) => {
                self.check_keys(obj, EXISTING_KEYS, path);
                self.selector(&obj["existing_widget"], &format!("{}.existing_widget", path))
                    .map(DeclarativeLayoutNode::Existing)
            }
            (false, false, true) => {
                self.check_keys(obj, NEW_KEYS, path);
                self.widget(&obj["new_widget"], &format!("{}.new_widget", path))
                    .map(DeclarativeLayoutNode::New)
            }
            _ => {
                self.error(
                    path,
                    "a node must have exactly one of 'split', 'existing_widget' or 'new_widget'",
                );
                None
            }
        }
    }

    fn split(&mut self, obj: &Map<String, Value>, path: &str) -> Option<DeclarativeLayoutNode> {
        self.check_keys(obj, SPLIT_KEYS, path);

        let axis = match obj["split"].as_str().and_then(Axis::parse) {
            Some(axis) => Some(axis),
            None => {
                self.error(
                    &format!("{}.split", path),
                    "split must be \"horizontal\" or \"vertical\"",
                );
                None
            }
        };

        let ratio = match obj.get("ratio") {
            None | Some(Value::Null) => Some(None),
            Some(v) => match v.as_f64() {
                Some(r) => Some(Some(r)),
                None => {
                    self.error(&format!("{}.ratio", path), "ratio must be a number");
                    None
                }
            },
        };

        let children = match obj.get("children").and_then(Value::as_array) {
            Some(items) => {
                let parsed: Vec<_> = items
                    .iter()
                    .enumerate()
                    .map(|(i, child)| self.node(child, &format!("{}.children[{}]", path, i)))
                    .collect();
                parsed.into_iter().collect::<Option<Vec<_>>>()
            }
            None => {
                self.error(path, "split requires a 'children' array");
                None
            }
        };

        Some(DeclarativeLayoutNode::Split {
            axis: axis?,
            ratio: ratio?,
            children: children?,
        })
    }

    fn selector(&mut self, value: &Value, path: &str) -> Option<WidgetSelector> {
        match value {
            Value::Number(n) => match n.as_u64() {
                Some(id) if id > 0 => Some(WidgetSelector::Id(WidgetId(id))),
                _ => {
                    self.error(path, "widget id must be a positive integer");
                    None
                }
            },
            Value::String(title) if !title.trim().is_empty() => {
                Some(WidgetSelector::Title(title.clone()))
            }
            _ => {
                self.error(path, "expected a widget id or a non-empty widget title");
                None
            }
        }
    }

    fn widget(&mut self, value: &Value, path: &str) -> Option<NewWidgetSpec> {
        let Some(obj) = value.as_object() else {
            self.error(path, "expected a widget definition object");
            return None;
        };
        self.check_keys(obj, WIDGET_KEYS, path);
        let before = self.errors.len();

        let table = self.required_str(obj, "table", path);
        let kind = match self.required_str(obj, "widget_type", path) {
            Some(name) => match WidgetKind::parse(&name) {
                Some(kind) => Some(kind),
                None => {
                    let names: Vec<_> = WidgetKind::ALL.iter().map(|k| k.as_str()).collect();
                    self.error(
                        &format!("{}.widget_type", path),
                        format!("unknown widget_type '{}' (expected one of: {})", name, names.join(", ")),
                    );
                    None
                }
            },
            None => None,
        };
        let title = self.optional_str(obj, "title", path);
        let chart_kind = match self.optional_str(obj, "chart_type", path) {
            Some(name) => match ChartKind::parse(&name) {
                Some(kind) => Some(kind),
                None => {
                    let names: Vec<_> = ChartKind::ALL.iter().map(|k| k.as_str()).collect();
                    self.error(
                        &format!("{}.chart_type", path),
                        format!("unknown chart_type '{}' (expected one of: {})", name, names.join(", ")),
                    );
                    None
                }
            },
            None => None,
        };
        let chart_options = match obj.get("chart_options") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map.clone()),
            Some(_) => {
                self.error(&format!("{}.chart_options", path), "chart_options must be an object");
                None
            }
        };
        let x_axis = self.optional_str(obj, "x_axis", path);
        let y_axis = match obj.get("y_axis") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let names: Vec<_> = items.iter().filter_map(Value::as_str).map(String::from).collect();
                if names.len() != items.len() {
                    self.error(&format!("{}.y_axis", path), "y_axis must be a list of column names");
                }
                names
            }
            Some(_) => {
                self.error(&format!("{}.y_axis", path), "y_axis must be a list of column names");
                Vec::new()
            }
        };

        if self.errors.len() > before {
            return None;
        }
        Some(NewWidgetSpec {
            table: table?,
            kind: kind?,
            title,
            chart_kind,
            chart_options,
            x_axis,
            y_axis,
        })
    }

    fn required_str(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<String> {
        match obj.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.error(&format!("{}.{}", path, key), format!("{} must be a string", key));
                None
            }
            None => {
                self.error(path, format!("missing required field '{}'", key));
                None
            }
        }
    }

    fn optional_str(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<String> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.error(&format!("{}.{}", path, key), format!("{} must be a string", key));
                None
            }
        }
    }
}

/// Check structural rules and derive the creation order.
///
/// Pure: the same tree always yields the same result.
pub fn validate(
    tree: DeclarativeLayoutNode,
    limits: &LayoutLimits,
    mode: ValidationMode,
) -> Result<ValidatedLayout, Vec<ValidationError>> {
    let mut checker = Checker {
        limits,
        mode,
        errors: Vec::new(),
        new_widgets: Vec::new(),
        existing: Vec::new(),
        seen: HashSet::new(),
    };
    checker.visit(&tree, "$", 1);

    if mode == ValidationMode::CreatePage && checker.new_widgets.is_empty() && checker.errors.is_empty() {
        checker.errors.push(ValidationError::NoNewWidgets);
    }
    if checker.new_widgets.len() > limits.max_new_widgets {
        checker.errors.push(ValidationError::TooManyWidgets {
            count: checker.new_widgets.len(),
            max: limits.max_new_widgets,
        });
    }

    if !checker.errors.is_empty() {
        return Err(checker.errors);
    }
    Ok(ValidatedLayout {
        tree,
        new_widgets: checker.new_widgets,
        existing: checker.existing,
    })
}

struct Checker<'a> {
    limits: &'a LayoutLimits,
    mode: ValidationMode,
    errors: Vec<ValidationError>,
    new_widgets: Vec<NewWidgetSpec>,
    existing: Vec<WidgetSelector>,
    seen: HashSet<WidgetSelector>,
}

impl Checker<'_> {
    fn visit(&mut self, node: &DeclarativeLayoutNode, path: &str, depth: usize) {
        if depth > self.limits.max_depth {
            self.errors.push(ValidationError::TooDeep {
                path: path.to_string(),
                max: self.limits.max_depth,
            });
            return;
        }

        match node {
            DeclarativeLayoutNode::Existing(sel) => {
                if self.mode == ValidationMode::CreatePage {
                    self.errors.push(ValidationError::ExistingOnNewPage {
                        path: path.to_string(),
                        widget: sel.to_string(),
                    });
                }
                if !self.seen.insert(sel.clone()) {
                    self.errors.push(ValidationError::DuplicateWidget {
                        path: path.to_string(),
                        widget: sel.to_string(),
                    });
                }
                self.existing.push(sel.clone());
            }
            DeclarativeLayoutNode::New(spec) => {
                self.check_widget(spec, &format!("{}.new_widget", path));
                self.new_widgets.push(spec.clone());
            }
            DeclarativeLayoutNode::Split {
                ratio, children, ..
            } => {
                if let Some(r) = ratio {
                    if !(*r > 0.0 && *r < 1.0) {
                        self.errors.push(ValidationError::RatioOutOfRange {
                            path: path.to_string(),
                            ratio: *r,
                        });
                    }
                }
                if children.len() < 2 || children.len() > self.limits.max_children {
                    self.errors.push(ValidationError::ChildCount {
                        path: path.to_string(),
                        count: children.len(),
                        max: self.limits.max_children,
                    });
                }
                for (i, child) in children.iter().enumerate() {
                    self.visit(child, &format!("{}.children[{}]", path, i), depth + 1);
                }
            }
        }
    }

    fn check_widget(&mut self, spec: &NewWidgetSpec, path: &str) {
        if spec.table.trim().is_empty() {
            self.errors
                .push(ValidationError::malformed(format!("{}.table", path), "table name must not be empty"));
        }

        if spec.is_chart() {
            if spec.chart_kind.is_none() {
                self.errors.push(ValidationError::MissingChartKind {
                    path: path.to_string(),
                });
            }
            return;
        }

        let chart_fields = [
            ("chart_type", spec.chart_kind.is_some()),
            ("chart_options", spec.chart_options.is_some()),
            ("x_axis", spec.x_axis.is_some()),
            ("y_axis", !spec.y_axis.is_empty()),
        ];
        for (field, present) in chart_fields {
            if present {
                self.errors.push(ValidationError::ChartFieldOnNonChart {
                    path: path.to_string(),
                    field: field.to_string(),
                    kind: spec.kind,
                });
            }
        }
    }
}

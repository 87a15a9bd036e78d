//! Compile a validated declarative layout into the backend's tree shape
//!
//! New widgets become placeholder leaves indexed by creation order; existing
//! widgets become real leaves. No I/O happens here.

use super::config::LayoutLimits;
use super::error::LayoutError;
use super::placeholder::PlaceholderMap;
use super::types::{CompiledLayoutNode, DeclarativeLayoutNode, LayoutNode, LeafRef, WidgetSelector};
use super::validator::ValidatedLayout;

/// Output of the compiler: the tree plus an empty slot per new widget
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledLayout {
    pub root: CompiledLayoutNode,
    pub placeholders: PlaceholderMap,
}

/// Compile a validated layout.
///
/// Title selectors must have been bound to identifiers beforehand.
pub fn compile(layout: &ValidatedLayout, limits: &LayoutLimits) -> Result<CompiledLayout, LayoutError> {
    let mut next_placeholder = 0;
    let root = compile_node(&layout.tree, limits, &mut next_placeholder)?;

    if next_placeholder != layout.new_widgets.len() {
        return Err(LayoutError::CreationOrderMismatch {
            expected: layout.new_widgets.len(),
            found: next_placeholder,
        });
    }

    Ok(CompiledLayout {
        root,
        placeholders: PlaceholderMap::new(next_placeholder),
    })
}

fn compile_node(
    node: &DeclarativeLayoutNode,
    limits: &LayoutLimits,
    next_placeholder: &mut usize,
) -> Result<CompiledLayoutNode, LayoutError> {
    match node {
        DeclarativeLayoutNode::Existing(WidgetSelector::Id(id)) => Ok(LayoutNode::Leaf(LeafRef::Real(*id))),
        DeclarativeLayoutNode::Existing(WidgetSelector::Title(title)) => {
            Err(LayoutError::UnboundTitle { title: title.clone() })
        }
        DeclarativeLayoutNode::New(_) => {
            // Same depth-first order the validator used for the creation list
            let index = *next_placeholder;
            *next_placeholder += 1;
            Ok(LayoutNode::Leaf(LeafRef::Placeholder(index)))
        }
        DeclarativeLayoutNode::Split {
            axis,
            ratio,
            children,
        } => Ok(LayoutNode::Split {
            axis: *axis,
            ratio: ratio.unwrap_or(limits.default_ratio),
            children: children
                .iter()
                .map(|c| compile_node(c, limits, next_placeholder))
                .collect::<Result<Vec<_>, _>>()?,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::WidgetId;
    use crate::layout::types::{Axis, NewWidgetSpec, WidgetKind};
    use crate::layout::validator::{validate, ValidationMode};

    fn validated(tree: DeclarativeLayoutNode) -> ValidatedLayout {
        validate(tree, &LayoutLimits::default(), ValidationMode::ModifyPage).expect("Should validate")
    }

    fn mixed_tree() -> DeclarativeLayoutNode {
        DeclarativeLayoutNode::split(
            Axis::Vertical,
            None,
            vec![
                DeclarativeLayoutNode::New(NewWidgetSpec::new("Orders", WidgetKind::Grid)),
                DeclarativeLayoutNode::split(
                    Axis::Horizontal,
                    Some(0.7),
                    vec![
                        DeclarativeLayoutNode::existing(12),
                        DeclarativeLayoutNode::New(NewWidgetSpec::new("Orders", WidgetKind::Card)),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn test_compile_assigns_placeholders_in_creation_order() {
        let compiled = compile(&validated(mixed_tree()), &LayoutLimits::default()).unwrap();

        assert_eq!(
            compiled.root,
            LayoutNode::Split {
                axis: Axis::Vertical,
                ratio: 0.5,
                children: vec![
                    LayoutNode::Leaf(LeafRef::Placeholder(0)),
                    LayoutNode::Split {
                        axis: Axis::Horizontal,
                        ratio: 0.7,
                        children: vec![
                            LayoutNode::Leaf(LeafRef::Real(WidgetId(12))),
                            LayoutNode::Leaf(LeafRef::Placeholder(1)),
                        ],
                    },
                ],
            }
        );
        assert_eq!(compiled.placeholders.len(), 2);
        assert!(!compiled.placeholders.is_complete());
    }

    #[test]
    fn test_compile_is_pure() {
        let layout = validated(mixed_tree());
        let first = compile(&layout, &LayoutLimits::default()).unwrap();
        let second = compile(&layout, &LayoutLimits::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_default_ratio_comes_from_limits() {
        let tree = DeclarativeLayoutNode::split(
            Axis::Horizontal,
            None,
            vec![DeclarativeLayoutNode::existing(1), DeclarativeLayoutNode::existing(2)],
        );
        let limits = LayoutLimits::default().with_default_ratio(0.4);
        let compiled = compile(&validated(tree), &limits).unwrap();
        assert!(matches!(compiled.root, LayoutNode::Split { ratio, .. } if ratio == 0.4));
    }

    #[test]
    fn test_unbound_title_is_an_error() {
        let tree = DeclarativeLayoutNode::Existing(WidgetSelector::Title("Totals".to_string()));
        let err = compile(&validated(tree), &LayoutLimits::default()).unwrap_err();
        assert_eq!(
            err,
            LayoutError::UnboundTitle {
                title: "Totals".to_string()
            }
        );
    }

    #[test]
    fn test_mismatched_creation_list_detected() {
        let mut layout = validated(mixed_tree());
        layout.new_widgets.pop();
        let err = compile(&layout, &LayoutLimits::default()).unwrap_err();
        assert_eq!(err, LayoutError::CreationOrderMismatch { expected: 1, found: 2 });
    }
}

//! Placeholder bookkeeping and the linking pass

use std::collections::HashSet;

use crate::backend::WidgetId;

use super::error::LayoutError;
use super::types::{CompiledLayoutNode, LeafRef, ResolvedLayout};

/// Maps placeholder indexes to the widgets created for them.
///
/// Starts with one empty slot per new widget and is filled as the widgets are
/// created. Each widget may fill at most one slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderMap {
    slots: Vec<Option<WidgetId>>,
}

impl PlaceholderMap {
    /// Create a map with `len` unbound slots
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bind slot `index` to a freshly created widget
    pub fn bind(&mut self, index: usize, widget: WidgetId) -> Result<(), LayoutError> {
        let len = self.slots.len();
        if self.slots.iter().flatten().any(|w| *w == widget) {
            return Err(LayoutError::DuplicateWidgetId { widget });
        }
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(LayoutError::PlaceholderOutOfRange { index, len })?;
        if let Some(existing) = slot {
            return Err(LayoutError::PlaceholderRebound {
                index,
                widget: *existing,
            });
        }
        *slot = Some(widget);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<WidgetId> {
        self.slots.get(index).copied().flatten()
    }

    pub fn bound_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Bound widgets in placeholder order
    pub fn widgets(&self) -> Vec<WidgetId> {
        self.slots.iter().flatten().copied().collect()
    }
}

/// Replace every placeholder in `tree` with the widget bound to it.
///
/// The result type has no placeholder variant, so a successful return is the
/// proof that none remain.
pub fn resolve_placeholders(
    tree: &CompiledLayoutNode,
    map: &PlaceholderMap,
) -> Result<ResolvedLayout, LayoutError> {
    let mut placed = HashSet::new();
    tree.try_map_leaves(&mut |leaf| {
        let widget = match leaf {
            LeafRef::Real(id) => *id,
            LeafRef::Placeholder(index) => {
                if *index >= map.len() {
                    return Err(LayoutError::PlaceholderOutOfRange {
                        index: *index,
                        len: map.len(),
                    });
                }
                map.get(*index)
                    .ok_or(LayoutError::UnresolvedPlaceholder { index: *index })?
            }
        };
        if !placed.insert(widget) {
            return Err(LayoutError::DuplicateWidgetId { widget });
        }
        Ok(widget)
    })
}

//! Widgets considered present on the page during one orchestration run

use std::collections::HashSet;

use crate::backend::WidgetId;
use crate::layout::LayoutError;

/// Running set of page widgets for one run.
///
/// Seeded with the widgets that stay on the page and grown by one entry per
/// created widget. Keeps insertion order for reporting.
#[derive(Debug, Clone, Default)]
pub struct WidgetRegistry {
    order: Vec<WidgetId>,
    members: HashSet<WidgetId>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with widgets already on the page
    pub fn seeded(widgets: impl IntoIterator<Item = WidgetId>) -> Self {
        let mut registry = Self::new();
        for widget in widgets {
            if registry.members.insert(widget) {
                registry.order.push(widget);
            }
        }
        registry
    }

    /// Record a newly created widget
    pub fn register(&mut self, widget: WidgetId) -> Result<(), LayoutError> {
        if !self.members.insert(widget) {
            return Err(LayoutError::DuplicateWidgetId { widget });
        }
        self.order.push(widget);
        Ok(())
    }

    pub fn contains(&self, widget: WidgetId) -> bool {
        self.members.contains(&widget)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Widgets in registration order
    pub fn ids(&self) -> &[WidgetId] {
        &self.order
    }

    /// Fail on the first widget in `placed` that is not registered
    pub fn check_placed<'a>(&self, placed: impl IntoIterator<Item = &'a WidgetId>) -> Result<(), LayoutError> {
        match placed.into_iter().find(|w| !self.contains(**w)) {
            Some(widget) => Err(LayoutError::UnregisteredWidget { widget: *widget }),
            None => Ok(()),
        }
    }
}

//! Reconciliation of page widgets for the modify-page flow
//!
//! The widgets currently on a page must be exactly partitioned into those the
//! new layout places and those the caller asked to remove. Anything else is
//! reported back instead of being dropped silently.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::backend::WidgetId;

/// The three widget sets involved in modifying a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationSets {
    /// Widgets currently on the page
    pub existing: BTreeSet<WidgetId>,
    /// Widgets placed by the new layout
    pub referenced: BTreeSet<WidgetId>,
    /// Widgets the caller asked to remove
    pub to_remove: BTreeSet<WidgetId>,
}

/// The partition check failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", self.describe())]
pub struct ReconciliationError {
    /// On the page, but neither placed nor removed
    pub orphaned: Vec<WidgetId>,
    /// Placed or removed, but not on the page
    pub unknown: Vec<WidgetId>,
    /// Both placed and removed
    pub conflicting: Vec<WidgetId>,
}

impl ReconciliationError {
    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.orphaned.is_empty() {
            parts.push(format!(
                "widgets {} are on the page but neither placed in the layout nor listed for removal",
                IdList(&self.orphaned)
            ));
        }
        if !self.unknown.is_empty() {
            parts.push(format!("widgets {} are not on this page", IdList(&self.unknown)));
        }
        if !self.conflicting.is_empty() {
            parts.push(format!(
                "widgets {} are both placed in the layout and listed for removal",
                IdList(&self.conflicting)
            ));
        }
        parts.join("; ")
    }

    /// Elements of the symmetric difference between the page and the union of
    /// placed and removed widgets
    pub fn symmetric_difference(&self) -> Vec<WidgetId> {
        let mut all: Vec<_> = self.orphaned.iter().chain(&self.unknown).copied().collect();
        all.sort();
        all
    }
}

struct IdList<'a>(&'a [WidgetId]);

impl fmt::Display for IdList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<_> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "[{}]", ids.join(", "))
    }
}

impl ReconciliationSets {
    pub fn new(
        existing: impl IntoIterator<Item = WidgetId>,
        referenced: impl IntoIterator<Item = WidgetId>,
        to_remove: impl IntoIterator<Item = WidgetId>,
    ) -> Self {
        Self {
            existing: existing.into_iter().collect(),
            referenced: referenced.into_iter().collect(),
            to_remove: to_remove.into_iter().collect(),
        }
    }

    /// Accept iff `existing` is the disjoint union of `referenced` and `to_remove`
    pub fn check(&self) -> Result<(), ReconciliationError> {
        let orphaned: Vec<_> = self
            .existing
            .iter()
            .filter(|id| !self.referenced.contains(*id) && !self.to_remove.contains(*id))
            .copied()
            .collect();
        let unknown: Vec<_> = self
            .referenced
            .union(&self.to_remove)
            .filter(|id| !self.existing.contains(*id))
            .copied()
            .collect();
        let conflicting: Vec<_> = self.referenced.intersection(&self.to_remove).copied().collect();

        if orphaned.is_empty() && unknown.is_empty() && conflicting.is_empty() {
            Ok(())
        } else {
            Err(ReconciliationError {
                orphaned,
                unknown,
                conflicting,
            })
        }
    }

    /// Widgets that stay on the page after the change
    pub fn kept(&self) -> impl Iterator<Item = WidgetId> + '_ {
        self.existing
            .iter()
            .filter(|id| !self.to_remove.contains(*id))
            .copied()
    }
}

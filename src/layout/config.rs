//! Limits applied while validating and compiling layouts

use serde::Deserialize;

/// Bounds that keep layouts renderable and requests bounded
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutLimits {
    /// Maximum nesting depth, a lone leaf being depth 1
    pub max_depth: usize,

    /// Maximum number of children in one split
    pub max_children: usize,

    /// Maximum number of widgets one call may create
    pub max_new_widgets: usize,

    /// Ratio given to splits that do not specify one
    pub default_ratio: f64,
}

impl Default for LayoutLimits {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_children: 10,
            max_new_widgets: 50,
            default_ratio: 0.5,
        }
    }
}

impl LayoutLimits {
    /// Create limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum nesting depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the maximum number of children per split
    pub fn with_max_children(mut self, children: usize) -> Self {
        self.max_children = children;
        self
    }

    /// Set the maximum number of widgets created per call
    pub fn with_max_new_widgets(mut self, widgets: usize) -> Self {
        self.max_new_widgets = widgets;
        self
    }

    /// Set the ratio used when a split omits one
    pub fn with_default_ratio(mut self, ratio: f64) -> Self {
        self.default_ratio = ratio;
        self
    }

    /// Check the limits themselves make sense
    pub fn check(&self) -> Result<(), String> {
        if self.max_depth == 0 {
            return Err("max_depth must be at least 1".to_string());
        }
        if self.max_children < 2 {
            return Err("max_children must be at least 2".to_string());
        }
        if !(self.default_ratio > 0.0 && self.default_ratio < 1.0) {
            return Err(format!(
                "default_ratio {} must lie strictly between 0 and 1",
                self.default_ratio
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = LayoutLimits::default();
        assert_eq!(limits.max_depth, 8);
        assert_eq!(limits.max_children, 10);
        assert_eq!(limits.max_new_widgets, 50);
        assert_eq!(limits.default_ratio, 0.5);
        assert!(limits.check().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let limits = LayoutLimits::new().with_max_depth(3).with_max_children(4);
        assert_eq!(limits.max_depth, 3);
        assert_eq!(limits.max_children, 4);
    }

    #[test]
    fn test_check_rejects_bad_ratio() {
        assert!(LayoutLimits::new().with_default_ratio(1.0).check().is_err());
        assert!(LayoutLimits::new().with_max_children(1).check().is_err());
        assert!(LayoutLimits::new().with_default_ratio(f64::NAN).check().is_err());
    }
}

//! Layout compiler: declarative trees in, backend layout trees out
//!
//! The phases run in order: [`validator`] checks the input and fixes the
//! creation order of new widgets, [`compiler`] emits a tree with placeholder
//! leaves, and [`placeholder`] links those to real widgets once they exist.
//! [`reconcile`] guards the modify-page flow and [`decompiler`] is the
//! independent read path.

pub mod compiler;
pub mod config;
pub mod decompiler;
pub mod error;
pub mod placeholder;
pub mod reconcile;
pub mod types;
pub mod validator;

pub use compiler::{compile, CompiledLayout};
pub use config::LayoutLimits;
pub use decompiler::{decompile, parse_stored_layout, DecompileError, DecompiledLayout, DecompiledNode, WidgetSummary};
pub use error::{LayoutError, ValidationError};
pub use placeholder::{resolve_placeholders, PlaceholderMap};
pub use reconcile::{ReconciliationError, ReconciliationSets};
pub use types::*;
pub use validator::{parse_layout, validate, validate_json, ValidatedLayout, ValidationMode};

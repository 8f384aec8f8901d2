//! Scope and result types for field destruction.
//!
//! This module defines [`DestroyScope`] and [`DestroyResult`], which are used
//! when removing fields from a [`Forest`](super::forest::Forest) or a
//! [`Document`](super::document::Document).
//!
//! ## Scope
//!
//! - `children: true`: the field's whole subtree is destroyed with it.
//!   With `false`, the children are promoted into the field's position,
//!   keeping their order.
//! - `siblings_after: true`: every following sibling is destroyed too,
//!   each under the same `children` rule.
//!
//! ## Examples
//!
//! ```rust
//! use bolnotes_core::{Document, DestroyScope, FieldValue};
//!
//! let mut doc = Document::untitled();
//! let first = doc.create_field(FieldValue::text("First"));
//! let second = doc.create_field(FieldValue::text("Second"));
//! doc.append_topic(first).unwrap();
//! doc.append_topic(second).unwrap();
//!
//! let result = doc.destroy_topic(first, DestroyScope::subtree()).unwrap();
//! assert_eq!(result.destroyed_count, 1);
//! assert_eq!(doc.first_topic(), Some(second));
//! ```

use serde::{Deserialize, Serialize};

use crate::core::forest::FieldId;

/// Determines what is destroyed along with a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyScope {
    /// Destroy the field's descendants instead of promoting them.
    pub children: bool,

    /// Also destroy every sibling that follows the field.
    pub siblings_after: bool,
}

impl DestroyScope {
    /// The field and all of its descendants.
    pub fn subtree() -> Self {
        Self {
            children: true,
            siblings_after: false,
        }
    }

    /// The field only; its children take its place.
    pub fn promote_children() -> Self {
        Self::default()
    }
}

/// The outcome of a destroy operation.
///
/// Contains a count of released fields and the IDs of every field whose
/// position changed, either because it was released or because it was
/// promoted into a released parent's position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyResult {
    /// The total number of fields that were released.
    pub destroyed_count: usize,

    /// IDs of all fields that were released or structurally affected.
    pub affected_ids: Vec<FieldId>,
}

impl DestroyResult {
    pub(crate) fn record_destroyed(&mut self, id: FieldId) {
        self.destroyed_count += 1;
        self.affected_ids.push(id);
    }
}

//! Core library for Bolnotes, an outline note editor that stores documents
//! in the compact `BLT` binary format (`.bol` files).
//!
//! The primary entry point is [`Document`], which holds the title metadata
//! and a [`Forest`] of topics. Structural edits go through `Document` or the
//! validated mutators on `Forest`; [`Document::read`] and [`Document::write`]
//! delegate to the [`codec`](core::codec).
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    codec::{read_header, Header, Section, MAGIC, VERSION},
    delete::{DestroyResult, DestroyScope},
    document::{AddPosition, Document},
    error::{BolnotesError, Result},
    error_chain::{ChainLink, ErrorChain},
    export::{export_plain_text, DocumentSnapshot, ExportOptions, TopicSnapshot},
    field::{FieldKind, FieldValue, Icon, Timestamp},
    forest::{Field, FieldId, FieldMismatch, Forest, Placement, Relation, Siblings, Walk},
};

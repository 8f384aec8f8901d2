//! Internal domain modules for the Bolnotes core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod codec;
pub mod delete;
pub mod document;
pub mod error;
pub mod error_chain;
pub mod export;
pub mod field;
pub mod forest;

#[doc(inline)]
pub use codec::{Header, Section};
#[doc(inline)]
pub use delete::{DestroyResult, DestroyScope};
#[doc(inline)]
pub use document::{AddPosition, Document};
#[doc(inline)]
pub use error::{BolnotesError, Result};
#[doc(inline)]
pub use error_chain::{ChainLink, ErrorChain};
#[doc(inline)]
pub use export::{export_plain_text, DocumentSnapshot, ExportOptions, TopicSnapshot};
#[doc(inline)]
pub use field::{FieldKind, FieldValue, Icon, Timestamp};
#[doc(inline)]
pub use forest::{Field, FieldId, FieldMismatch, Forest, Placement, Relation, Siblings, Walk};

//! Error types for the Bolnotes core library.

use thiserror::Error;

use crate::core::codec::Section;
use crate::core::forest::FieldId;

/// All errors that can occur within the Bolnotes core library.
#[derive(Debug, Error)]
pub enum BolnotesError {
    /// The stream does not start with the `BLT` magic, or a record is
    /// structurally broken (short record, bad UTF-8, wrong metadata types).
    #[error("Invalid document format: {0}")]
    InvalidFormat(String),

    /// The header names a format version newer than this library understands.
    #[error("Unsupported document version {found} (newest supported is {supported})")]
    InvalidVersion { found: u8, supported: u8 },

    /// A field record carries a type byte outside the known set.
    #[error("Unknown field type 0x{type_byte:02x} at offset {offset} in the {section} section")]
    UnknownFieldType {
        type_byte: u8,
        offset: u64,
        section: Section,
    },

    /// A topic record jumps more than one level deeper than its predecessor,
    /// or the first topic is not at the top level.
    #[error("Malformed depth {depth} at offset {offset}")]
    MalformedDepth {
        depth: u8,
        previous: Option<u8>,
        offset: u64,
    },

    /// An icon record names an index outside the icon table.
    #[error("Invalid icon index {index} at offset {offset}")]
    InvalidIcon { index: u8, offset: u64 },

    /// A field cannot be represented in a 16-bit record.
    #[error("Field too large to encode: {0}")]
    FieldTooLarge(String),

    /// A read or write on the underlying stream failed part way through.
    #[error("I/O error at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// Opening, creating or flushing a file failed.
    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    /// A structural mutation would break the forest invariants.
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// A field value was rejected by a mutator.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A structural request that cannot be carried out in the current shape.
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    /// A handle that no longer (or never did) name a live field.
    #[error("Field not found: {0}")]
    FieldNotFound(FieldId),

    /// A snapshot could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A higher-level description wrapped around the failure that caused it.
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: Box<BolnotesError>,
    },
}

/// Convenience alias that pins the error type to [`BolnotesError`].
pub type Result<T> = std::result::Result<T, BolnotesError>;

impl BolnotesError {
    /// Wraps `self` in a [`BolnotesError::Context`] carrying `message`.
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// Returns `true` for malformed or unsupported input.
    pub fn is_format_error(&self) -> bool {
        match self {
            Self::InvalidFormat(_)
            | Self::InvalidVersion { .. }
            | Self::UnknownFieldType { .. }
            | Self::MalformedDepth { .. }
            | Self::InvalidIcon { .. } => true,
            Self::Context { source, .. } => source.is_format_error(),
            _ => false,
        }
    }

    /// Returns the innermost error, skipping any context wrappers.
    pub fn root_cause(&self) -> &BolnotesError {
        match self {
            Self::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidFormat(_) => "This is not a valid outline document".to_string(),
            Self::InvalidVersion { found, .. } => {
                format!("This document was written by a newer version (format {found})")
            }
            Self::UnknownFieldType { .. }
            | Self::MalformedDepth { .. }
            | Self::InvalidIcon { .. } => "The document is damaged and cannot be opened".to_string(),
            Self::FieldTooLarge(msg) => msg.clone(),
            Self::Io { offset, source } => format!("File error at byte {offset}: {source}"),
            Self::File(e) => format!("File error: {e}"),
            Self::Consistency(msg) => format!("Outline structure error: {msg}"),
            Self::ValidationFailed(msg) => msg.clone(),
            Self::InvalidMove(msg) => msg.clone(),
            Self::FieldNotFound(_) => "Topic no longer exists".to_string(),
            Self::Json(e) => format!("Data format error: {e}"),
            Self::Context { message, .. } => message.clone(),
        }
    }
}

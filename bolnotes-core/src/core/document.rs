//! High-level outline operations over one Bolnotes document.

use log::{info, warn};
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::core::codec;
use crate::core::forest::{Field, FieldId, FieldMismatch, Forest, Placement};
use crate::{BolnotesError, DestroyResult, DestroyScope, FieldKind, FieldValue, Icon, Result, Timestamp};

/// Controls where a new topic is inserted relative to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPosition {
    /// Insert as the last child of the reference topic.
    AsChild,
    /// Insert immediately after the reference topic within the same parent.
    AsSibling,
}

/// An open outline document.
///
/// `Document` owns three metadata fields (title, subtitle, date), the topic
/// [`Forest`], and the raw bytes of the reserved attachments section. All
/// structural edits go through its methods or the validated mutators on
/// [`Forest`], so the link invariants are enforced in one place.
#[derive(Debug, Clone)]
pub struct Document {
    title: FieldValue,
    subtitle: FieldValue,
    date: FieldValue,
    topics: Forest,
    attachments: Vec<u8>,
}

impl Document {
    /// Creates an empty document with the given metadata.
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>, date: Timestamp) -> Self {
        Self {
            title: FieldValue::text(title),
            subtitle: FieldValue::text(subtitle),
            date: FieldValue::date(date),
            topics: Forest::new(),
            attachments: Vec::new(),
        }
    }

    /// Creates an empty document with blank title and subtitle, dated now.
    pub fn untitled() -> Self {
        Self::new("", "", Timestamp::now())
    }

    pub(crate) fn from_parts(
        title: FieldValue,
        subtitle: FieldValue,
        date: FieldValue,
        topics: Forest,
        attachments: Vec<u8>,
    ) -> Self {
        Self {
            title,
            subtitle,
            date,
            topics,
            attachments,
        }
    }

    // ── metadata ────────────────────────────────────────────────────

    pub fn title(&self) -> &str {
        self.title.text_content().unwrap_or_default()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = FieldValue::text(title);
    }

    pub fn subtitle(&self) -> &str {
        self.subtitle.text_content().unwrap_or_default()
    }

    pub fn set_subtitle(&mut self, subtitle: impl Into<String>) {
        self.subtitle = FieldValue::text(subtitle);
    }

    /// The document's date stamp.
    pub fn date(&self) -> Timestamp {
        self.date.timestamp().unwrap_or_default()
    }

    /// Replaces the date stamp, keeping any text stored alongside it.
    pub fn set_date(&mut self, timestamp: Timestamp) {
        let text = self.date.text_content().unwrap_or_default().to_string();
        self.date = FieldValue::Date { text, timestamp };
    }

    pub fn title_field(&self) -> &FieldValue {
        &self.title
    }

    pub fn subtitle_field(&self) -> &FieldValue {
        &self.subtitle
    }

    pub fn date_field(&self) -> &FieldValue {
        &self.date
    }

    /// Raw bytes of the reserved attachments section, kept as read.
    pub fn attachments(&self) -> &[u8] {
        &self.attachments
    }

    // ── field access ────────────────────────────────────────────────

    pub fn topics(&self) -> &Forest {
        &self.topics
    }

    pub fn topics_mut(&mut self) -> &mut Forest {
        &mut self.topics
    }

    /// Allocates a new, unattached field. Attach it with
    /// [`append_topic`](Self::append_topic) or one of its siblings.
    pub fn create_field(&mut self, value: FieldValue) -> FieldId {
        self.topics.create(value)
    }

    /// The field with its links, for read-only navigation.
    pub fn field(&self, id: FieldId) -> Result<&Field> {
        self.topics.field(id)
    }

    pub fn value(&self, id: FieldId) -> Result<&FieldValue> {
        self.topics.value(id)
    }

    /// The text of a field, or `None` for a blank separator.
    pub fn text(&self, id: FieldId) -> Result<Option<&str>> {
        Ok(self.topics.value(id)?.text_content())
    }

    /// # Errors
    ///
    /// Returns [`BolnotesError::ValidationFailed`] for a blank separator.
    pub fn set_text(&mut self, id: FieldId, text: impl Into<String>) -> Result<()> {
        if self.topics.value_mut(id)?.set_text(text) {
            Ok(())
        } else {
            Err(BolnotesError::ValidationFailed(
                "blank separators carry no text".to_string(),
            ))
        }
    }

    /// # Errors
    ///
    /// Returns [`BolnotesError::ValidationFailed`] unless `id` is a date field.
    pub fn set_timestamp(&mut self, id: FieldId, new_timestamp: Timestamp) -> Result<()> {
        match self.topics.value_mut(id)? {
            FieldValue::Date { timestamp, .. } => {
                *timestamp = new_timestamp;
                Ok(())
            }
            other => Err(BolnotesError::ValidationFailed(format!(
                "cannot set a timestamp on a {} field",
                other.kind()
            ))),
        }
    }

    /// # Errors
    ///
    /// Returns [`BolnotesError::ValidationFailed`] unless `id` is an icon field.
    pub fn set_icon(&mut self, id: FieldId, new_icon: Icon) -> Result<()> {
        match self.topics.value_mut(id)? {
            FieldValue::Icon { icon, .. } => {
                *icon = new_icon;
                Ok(())
            }
            other => Err(BolnotesError::ValidationFailed(format!(
                "cannot set an icon on a {} field",
                other.kind()
            ))),
        }
    }

    /// Changes a topic's kind in place, keeping its position and children.
    pub fn convert_topic(&mut self, id: FieldId, kind: FieldKind) -> Result<()> {
        self.topics.convert(id, kind, Timestamp::now())
    }

    // ── topic management ────────────────────────────────────────────

    /// Returns the first top-level topic, or `None` for an empty document.
    pub fn first_topic(&self) -> Option<FieldId> {
        self.topics.head()
    }

    fn ensure_unattached(&self, id: FieldId) -> Result<()> {
        if self.topics.is_linked(id)? {
            return Err(BolnotesError::InvalidMove(format!(
                "{id} is already part of the outline"
            )));
        }
        Ok(())
    }

    /// Appends an unattached field after the last top-level topic.
    ///
    /// # Errors
    ///
    /// Returns [`BolnotesError::InvalidMove`] if `id` already has a position.
    pub fn append_topic(&mut self, id: FieldId) -> Result<()> {
        self.ensure_unattached(id)?;
        self.topics.place(id, Placement::LastRoot)
    }

    /// Inserts an unattached field immediately after `after`.
    pub fn append_topic_after(&mut self, after: FieldId, id: FieldId) -> Result<()> {
        self.ensure_unattached(id)?;
        self.topics.place(id, Placement::After(after))
    }

    /// Inserts an unattached field immediately before `before`.
    ///
    /// Prepending before the first topic makes `id` the new first topic;
    /// prepending before a first child makes `id` the parent's first child.
    pub fn prepend_topic(&mut self, before: FieldId, id: FieldId) -> Result<()> {
        self.ensure_unattached(id)?;
        self.topics.place(id, Placement::Before(before))
    }

    /// Inserts an unattached field relative to `reference`.
    pub fn add_topic(&mut self, reference: FieldId, id: FieldId, position: AddPosition) -> Result<()> {
        self.ensure_unattached(id)?;
        match position {
            AddPosition::AsChild => self.topics.place(id, Placement::LastChildOf(reference)),
            AddPosition::AsSibling => self.topics.place(id, Placement::After(reference)),
        }
    }

    /// Makes `id` the last child of its previous sibling.
    ///
    /// # Errors
    ///
    /// Returns [`BolnotesError::InvalidMove`] if `id` has no previous
    /// sibling, and [`BolnotesError::Consistency`] if the move would make
    /// `id` its own ancestor. The outline is unchanged on error.
    pub fn indent(&mut self, id: FieldId) -> Result<()> {
        let previous = self.topics.field(id)?.previous().ok_or_else(|| {
            BolnotesError::InvalidMove("the first topic at a level cannot be indented".to_string())
        })?;
        if self.topics.is_within(previous, id)? {
            warn!("indent of {id} rejected: {previous} lies inside its subtree");
            return Err(BolnotesError::Consistency(format!(
                "indenting {id} under {previous} would make it its own ancestor"
            )));
        }
        self.topics.place(id, Placement::LastChildOf(previous))
    }

    /// Makes `id` the next sibling of its parent.
    ///
    /// # Errors
    ///
    /// Returns [`BolnotesError::InvalidMove`] for a top-level topic.
    pub fn deindent(&mut self, id: FieldId) -> Result<()> {
        let parent = self.topics.field(id)?.parent().ok_or_else(|| {
            BolnotesError::InvalidMove("a top-level topic cannot be deindented".to_string())
        })?;
        self.topics.place(id, Placement::After(parent))
    }

    /// Moves `id` (with its subtree) to just before `target`.
    pub fn move_topic_above(&mut self, id: FieldId, target: FieldId) -> Result<()> {
        self.topics.place(id, Placement::Before(target))
    }

    /// Moves `id` (with its subtree) to just after `target`.
    pub fn move_topic_below(&mut self, id: FieldId, target: FieldId) -> Result<()> {
        self.topics.place(id, Placement::After(target))
    }

    /// Moves `id` (with its subtree) to the very top of the document.
    pub fn move_topic_to_top(&mut self, id: FieldId) -> Result<()> {
        if self.first_topic() == Some(id) {
            return Ok(());
        }
        self.topics.place(id, Placement::FirstRoot)
    }

    /// Moves `id` one step up: above its previous sibling, or above its
    /// parent when it is a first child.
    ///
    /// # Errors
    ///
    /// Returns [`BolnotesError::InvalidMove`] for the first topic of the document.
    pub fn move_up(&mut self, id: FieldId) -> Result<()> {
        let field = self.topics.field(id)?;
        let target = match (field.previous(), field.parent()) {
            (Some(previous), _) => previous,
            (None, Some(parent)) => parent,
            _ => {
                return Err(BolnotesError::InvalidMove(
                    "already at the top of the document".to_string(),
                ))
            }
        };
        self.topics.place(id, Placement::Before(target))
    }

    /// Moves `id` one step down: below its next sibling, or below its
    /// parent when it is a last child.
    ///
    /// # Errors
    ///
    /// Returns [`BolnotesError::InvalidMove`] when nothing follows `id` in
    /// the document.
    pub fn move_down(&mut self, id: FieldId) -> Result<()> {
        if self.topics.is_last_in_document(id)? {
            return Err(BolnotesError::InvalidMove(
                "already at the bottom of the document".to_string(),
            ));
        }
        let field = self.topics.field(id)?;
        let target = match (field.next(), field.parent()) {
            (Some(next), _) => next,
            (None, Some(parent)) => parent,
            (None, None) => {
                return Err(BolnotesError::InvalidMove(
                    "already at the bottom of the document".to_string(),
                ))
            }
        };
        self.topics.place(id, Placement::After(target))
    }

    /// Destroys a topic according to `scope`.
    pub fn destroy_topic(&mut self, id: FieldId, scope: DestroyScope) -> Result<DestroyResult> {
        self.topics.destroy(id, scope)
    }

    /// Compares a topic's links against an externally observed copy.
    ///
    /// Returns the first mismatching relation, or `None` when the observed
    /// links agree with the document.
    pub fn check_field_consistency(
        &self,
        reference: FieldId,
        observed_parent: Option<FieldId>,
        observed_child: Option<FieldId>,
        observed_previous: Option<FieldId>,
        observed_next: Option<FieldId>,
    ) -> Result<Option<FieldMismatch>> {
        self.topics.check_field_consistency(
            reference,
            observed_parent,
            observed_child,
            observed_previous,
            observed_next,
        )
    }

    // ── persistence ─────────────────────────────────────────────────

    /// Decodes a document from any byte stream.
    pub fn decode<R: Read>(reader: R) -> Result<Self> {
        codec::decode(reader)
    }

    /// Encodes the document to any byte sink, returning the bytes written.
    pub fn encode<W: Write>(&self, writer: W) -> Result<u64> {
        codec::encode(self, writer)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        codec::encode(self, &mut buf)?;
        Ok(buf)
    }

    /// Opens and decodes a `.bol` file.
    ///
    /// # Errors
    ///
    /// Any failure is wrapped in a [`BolnotesError::Context`] naming the
    /// file, with the original error as its source.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let context = || format!("failed to open document {}", path.display());
        let file = File::open(path).map_err(|e| BolnotesError::from(e).context(context()))?;
        let doc = codec::decode(BufReader::new(file)).map_err(|e| e.context(context()))?;
        info!("opened {}", path.display());
        Ok(doc)
    }

    /// Encodes the document into a `.bol` file, replacing any existing file.
    ///
    /// The whole document is encoded in memory and written to a sibling
    /// temporary file, which is then renamed over `path`. On any failure the
    /// previous file is left as it was.
    ///
    /// # Errors
    ///
    /// Any failure is wrapped in a [`BolnotesError::Context`] naming the file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let context = || format!("failed to save document {}", path.display());
        let bytes = self.to_bytes().map_err(|e| e.context(context()))?;

        let staging = staging_path(path);
        if let Err(e) = fs::write(&staging, &bytes).and_then(|()| fs::rename(&staging, path)) {
            if staging.exists() {
                if let Err(cleanup) = fs::remove_file(&staging) {
                    warn!("could not remove {}: {cleanup}", staging.display());
                }
            }
            return Err(BolnotesError::from(e).context(context()));
        }
        info!("saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// `dir/.name.tmp` next to `path`, so the final rename stays on one filesystem.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

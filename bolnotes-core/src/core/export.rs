//! Plain-text export and serializable structural snapshots.

use serde::Serialize;

use crate::core::document::Document;
use crate::core::forest::{FieldId, Forest};
use crate::{FieldValue, Result, Timestamp};

/// Formatting options for [`export_plain_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Spaces per nesting level.
    pub indent_width: usize,
    /// chrono format string for date fields and the document date.
    pub date_format: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            indent_width: 2,
            date_format: "%Y-%m-%d %H:%M".to_string(),
        }
    }
}

/// Renders the document as an indented plain-text outline.
///
/// The title comes first, then the subtitle (if any) and the date, a blank
/// line, and one `- ` bullet per topic. Blank separators become empty lines.
pub fn export_plain_text(doc: &Document, options: &ExportOptions) -> Result<String> {
    let mut out = String::new();
    out.push_str(doc.title());
    out.push('\n');
    if !doc.subtitle().is_empty() {
        out.push_str(doc.subtitle());
        out.push('\n');
    }
    out.push_str(&doc.date_field().display_text(&options.date_format));
    out.push_str("\n\n");

    let topics = doc.topics();
    for (id, depth) in topics.walk() {
        let value = topics.value(id)?;
        if let FieldValue::Blank = value {
            out.push('\n');
            continue;
        }
        out.push_str(&" ".repeat(depth * options.indent_width));
        out.push_str("- ");
        out.push_str(&value.display_text(&options.date_format));
        out.push('\n');
    }
    Ok(out)
}

/// One topic and its children, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSnapshot {
    pub id: FieldId,
    pub value: FieldValue,
    pub children: Vec<TopicSnapshot>,
}

/// A detached, comparable copy of a document's content and shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub title: String,
    pub subtitle: String,
    pub date: Timestamp,
    pub topics: Vec<TopicSnapshot>,
}

impl DocumentSnapshot {
    pub fn capture(doc: &Document) -> Result<Self> {
        let forest = doc.topics();
        let topics = forest
            .roots()
            .map(|id| capture_topic(forest, id))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            title: doc.title().to_string(),
            subtitle: doc.subtitle().to_string(),
            date: doc.date(),
            topics,
        })
    }

    /// Total number of topics in the snapshot.
    pub fn topic_count(&self) -> usize {
        fn count(topics: &[TopicSnapshot]) -> usize {
            topics.iter().map(|t| 1 + count(&t.children)).sum()
        }
        count(&self.topics)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn capture_topic(forest: &Forest, id: FieldId) -> Result<TopicSnapshot> {
    let children = forest
        .children(id)
        .map(|child| capture_topic(forest, child))
        .collect::<Result<Vec<_>>>()?;
    Ok(TopicSnapshot {
        id,
        value: forest.value(id)?.clone(),
        children,
    })
}

//! Reader and writer for the `BLT` document format (`.bol` files).
//!
//! # Layout
//!
//! All integers are little-endian; all lengths are in bytes.
//!
//! ```text
//! offset 0   magic         [u8; 3] = "BLT"
//! offset 3   version       u8      = 1
//! offset 4   props_length  u32
//! offset 8   topics_length u32
//! offset 12  attach_length u32
//! offset 16  title record, subtitle record, date record   (props_length bytes)
//!            topic records in pre-order                   (topics_length bytes)
//!            attachment records                           (attach_length bytes)
//! ```
//!
//! Each field record:
//!
//! ```text
//! type     u8    'T' text, 'd' date, 'I' icon, 0 blank
//! depth    u8    nesting level, 0 = top level
//! length   u16   whole record, header included
//! text_len u16
//! text     [u8; text_len]  UTF-8, no terminator
//! trailer  date: 7-byte timestamp + 1 reserved zero byte
//!          icon: 1-byte icon index
//! ```
//!
//! Topics are written parent first, then its children, then its next
//! sibling. Reading rebuilds the tree from the depth tags by remembering,
//! for each depth, the last field seen there (the *frontier*).

use log::debug;
use std::fmt;
use std::io::{Read, Write};

use crate::core::document::Document;
use crate::core::field::{FieldKind, FieldValue, Icon, Timestamp};
use crate::core::forest::{FieldId, Forest};
use crate::{BolnotesError, Result};

/// File signature.
pub const MAGIC: [u8; 3] = *b"BLT";

/// Newest format version this library reads and the one it writes.
pub const VERSION: u8 = 1;

/// Size of the fixed file header.
pub const HEADER_LEN: usize = 16;

/// Size of the fixed part of a field record.
pub const RECORD_HEADER_LEN: usize = 6;

/// The three sections following the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Properties,
    Topics,
    Attachments,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Properties => "properties",
            Self::Topics => "topics",
            Self::Attachments => "attachments",
        };
        f.write_str(name)
    }
}

/// The fixed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub props_length: u32,
    pub topics_length: u32,
    pub attach_length: u32,
}

struct CountingReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner
            .read_exact(buf)
            .map_err(|source| BolnotesError::Io {
                offset: self.offset,
                source,
            })?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

struct CountingWriter<W> {
    inner: W,
    offset: u64,
}

impl<W: Write> CountingWriter<W> {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.inner
            .write_all(buf)
            .map_err(|source| BolnotesError::Io {
                offset: self.offset,
                source,
            })?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(|source| BolnotesError::Io {
            offset: self.offset,
            source,
        })
    }
}

/// A decoded record before it is linked into a forest.
struct Record {
    value: FieldValue,
    depth: u8,
    offset: u64,
    length: u64,
}

// ── decoding ────────────────────────────────────────────────────────

fn read_header_from<R: Read>(reader: &mut CountingReader<R>) -> Result<Header> {
    let mut magic = [0u8; 3];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(BolnotesError::InvalidFormat(format!(
            "expected magic \"BLT\", found {magic:02x?}"
        )));
    }
    let version = reader.read_u8()?;
    if version > VERSION {
        return Err(BolnotesError::InvalidVersion {
            found: version,
            supported: VERSION,
        });
    }
    Ok(Header {
        version,
        props_length: reader.read_u32()?,
        topics_length: reader.read_u32()?,
        attach_length: reader.read_u32()?,
    })
}

/// Reads and validates only the 16-byte header.
pub fn read_header<R: Read>(reader: R) -> Result<Header> {
    read_header_from(&mut CountingReader::new(reader))
}

fn read_record<R: Read>(reader: &mut CountingReader<R>, section: Section) -> Result<Record> {
    let offset = reader.offset;
    let type_byte = reader.read_u8()?;
    let kind = FieldKind::from_type_byte(type_byte).ok_or(BolnotesError::UnknownFieldType {
        type_byte,
        offset,
        section,
    })?;
    let depth = reader.read_u8()?;
    let length = usize::from(reader.read_u16()?);
    let text_len = usize::from(reader.read_u16()?);

    if kind == FieldKind::Blank && text_len > 0 {
        return Err(BolnotesError::InvalidFormat(format!(
            "blank record at offset {offset} carries {text_len} bytes of text"
        )));
    }

    let needed = RECORD_HEADER_LEN + text_len + kind.trailer_len();
    if length < needed {
        return Err(BolnotesError::InvalidFormat(format!(
            "{kind} record at offset {offset} declares {length} bytes but needs {needed}"
        )));
    }

    let text_offset = reader.offset;
    let text = String::from_utf8(reader.read_vec(text_len)?).map_err(|_| {
        BolnotesError::InvalidFormat(format!("text at offset {text_offset} is not valid UTF-8"))
    })?;

    let value = match kind {
        FieldKind::Text => FieldValue::Text(text),
        FieldKind::Date => {
            let mut packed = [0u8; Timestamp::ENCODED_LEN];
            reader.read_exact(&mut packed)?;
            let _reserved = reader.read_u8()?;
            FieldValue::Date {
                text,
                timestamp: Timestamp::from_bytes(packed),
            }
        }
        FieldKind::Icon => {
            let icon_offset = reader.offset;
            let index = reader.read_u8()?;
            let icon = Icon::from_index(index).ok_or(BolnotesError::InvalidIcon {
                index,
                offset: icon_offset,
            })?;
            FieldValue::Icon { text, icon }
        }
        FieldKind::Blank => FieldValue::Blank,
    };

    // Newer writers may append bytes we do not know about.
    if length > needed {
        reader.read_vec(length - needed)?;
    }

    Ok(Record {
        value,
        depth,
        offset,
        length: length as u64,
    })
}

/// Reads records until exactly `section_len` bytes are consumed.
fn read_section<R: Read>(
    reader: &mut CountingReader<R>,
    section: Section,
    section_len: u32,
) -> Result<Vec<Record>> {
    let end = reader.offset + u64::from(section_len);
    let mut records = Vec::new();
    while reader.offset < end {
        let record = read_record(reader, section)?;
        if reader.offset > end {
            return Err(BolnotesError::InvalidFormat(format!(
                "record at offset {} ({} bytes) overruns the {section} section ending at {end}",
                record.offset, record.length
            )));
        }
        records.push(record);
    }
    Ok(records)
}

/// Links topic records into a forest using their depth tags.
fn build_forest(records: Vec<Record>) -> Result<Forest> {
    let mut forest = Forest::new();
    let mut frontier: Vec<FieldId> = Vec::new();
    let mut previous_depth: Option<u8> = None;

    for record in records {
        let depth = usize::from(record.depth);
        let malformed = || BolnotesError::MalformedDepth {
            depth: record.depth,
            previous: previous_depth,
            offset: record.offset,
        };

        match previous_depth {
            None if depth == 0 => {
                let id = forest.create(record.value);
                forest.set_head_passive(Some(id));
                frontier.push(id);
            }
            Some(previous) if depth <= usize::from(previous) => {
                let sibling = frontier[depth];
                let parent = forest.field(sibling)?.parent();
                let id = forest.create(record.value);
                forest.set_next_passive(sibling, Some(id))?;
                forest.set_previous_passive(id, Some(sibling))?;
                forest.set_parent_passive(id, parent)?;
                frontier.truncate(depth);
                frontier.push(id);
            }
            Some(previous) if depth == usize::from(previous) + 1 => {
                let parent = frontier[depth - 1];
                let id = forest.create(record.value);
                forest.set_child_passive(parent, Some(id))?;
                forest.set_parent_passive(id, Some(parent))?;
                frontier.push(id);
            }
            _ => return Err(malformed()),
        }
        previous_depth = Some(record.depth);
    }

    forest.verify()?;
    Ok(forest)
}

fn text_of(value: FieldValue, what: &str) -> Result<FieldValue> {
    match value {
        FieldValue::Text(_) => Ok(value),
        other => Err(BolnotesError::InvalidFormat(format!(
            "{what} must be a text field, found {}",
            other.kind()
        ))),
    }
}

/// Decodes a whole document from `reader`.
///
/// Nothing is returned unless every section decodes cleanly.
///
/// # Errors
///
/// - [`BolnotesError::InvalidFormat`] for a wrong magic or a broken record.
/// - [`BolnotesError::InvalidVersion`] for a version newer than [`VERSION`].
/// - [`BolnotesError::UnknownFieldType`] for an unknown record tag.
/// - [`BolnotesError::MalformedDepth`] when depth tags cannot form a tree.
/// - [`BolnotesError::InvalidIcon`] for an icon index outside the table.
/// - [`BolnotesError::Io`] when the stream ends early or fails.
pub fn decode<R: Read>(reader: R) -> Result<Document> {
    let mut reader = CountingReader::new(reader);
    let header = read_header_from(&mut reader)?;

    let props = read_section(&mut reader, Section::Properties, header.props_length)?;
    if props.len() != 3 {
        return Err(BolnotesError::InvalidFormat(format!(
            "expected 3 property fields, found {}",
            props.len()
        )));
    }
    let mut props = props.into_iter().map(|record| record.value);
    let (Some(title), Some(subtitle), Some(date)) = (props.next(), props.next(), props.next())
    else {
        return Err(BolnotesError::InvalidFormat(
            "missing property fields".to_string(),
        ));
    };
    let title = text_of(title, "title")?;
    let subtitle = text_of(subtitle, "subtitle")?;
    if date.kind() != FieldKind::Date {
        return Err(BolnotesError::InvalidFormat(format!(
            "document date must be a date field, found {}",
            date.kind()
        )));
    }

    let topic_records = read_section(&mut reader, Section::Topics, header.topics_length)?;
    let topic_count = topic_records.len();
    let topics = build_forest(topic_records)?;

    let attachments = reader.read_vec(header.attach_length as usize)?;

    debug!(
        "decoded document: {topic_count} topic(s), {} attachment byte(s), {} bytes total",
        attachments.len(),
        reader.offset
    );
    Ok(Document::from_parts(title, subtitle, date, topics, attachments))
}

// ── encoding ────────────────────────────────────────────────────────

/// Appends one field record to `buf`.
fn encode_record(buf: &mut Vec<u8>, value: &FieldValue, depth: usize) -> Result<()> {
    let depth = u8::try_from(depth).map_err(|_| {
        BolnotesError::FieldTooLarge(format!("nesting depth {depth} exceeds 255"))
    })?;
    let kind = value.kind();
    let text = value.text_content().unwrap_or_default().as_bytes();
    let length = RECORD_HEADER_LEN + text.len() + kind.trailer_len();
    let length = u16::try_from(length).map_err(|_| {
        BolnotesError::FieldTooLarge(format!(
            "{kind} field with {} bytes of text does not fit in a record",
            text.len()
        ))
    })?;

    buf.push(kind.type_byte());
    buf.push(depth);
    buf.extend_from_slice(&length.to_le_bytes());
    // text.len() < length, so it fits as well.
    buf.extend_from_slice(&(text.len() as u16).to_le_bytes());
    buf.extend_from_slice(text);
    match value {
        FieldValue::Date { timestamp, .. } => {
            buf.extend_from_slice(&timestamp.to_bytes());
            buf.push(0);
        }
        FieldValue::Icon { icon, .. } => buf.push(icon.index()),
        FieldValue::Text(_) | FieldValue::Blank => {}
    }
    Ok(())
}

fn section_len(buf: &[u8], section: Section) -> Result<u32> {
    u32::try_from(buf.len()).map_err(|_| {
        BolnotesError::FieldTooLarge(format!("{section} section exceeds 4 GiB"))
    })
}

/// Encodes `doc` to `writer`, returning the number of bytes written.
///
/// # Errors
///
/// - [`BolnotesError::FieldTooLarge`] if a field or section does not fit.
/// - [`BolnotesError::Io`] with the offset of the failed write.
pub fn encode<W: Write>(doc: &Document, writer: W) -> Result<u64> {
    let mut props = Vec::new();
    encode_record(&mut props, doc.title_field(), 0)?;
    encode_record(&mut props, doc.subtitle_field(), 0)?;
    encode_record(&mut props, doc.date_field(), 0)?;

    let forest = doc.topics();
    let mut topics = Vec::new();
    let mut topic_count = 0usize;
    for (id, depth) in forest.walk() {
        encode_record(&mut topics, forest.value(id)?, depth)?;
        topic_count += 1;
    }

    let attachments = doc.attachments();

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(&MAGIC);
    header.push(VERSION);
    header.extend_from_slice(&section_len(&props, Section::Properties)?.to_le_bytes());
    header.extend_from_slice(&section_len(&topics, Section::Topics)?.to_le_bytes());
    header.extend_from_slice(&section_len(attachments, Section::Attachments)?.to_le_bytes());

    let mut writer = CountingWriter {
        inner: writer,
        offset: 0,
    };
    writer.write_all(&header)?;
    writer.write_all(&props)?;
    writer.write_all(&topics)?;
    writer.write_all(attachments)?;
    writer.flush()?;

    debug!(
        "encoded document: {topic_count} topic(s), {} bytes total",
        writer.offset
    );
    Ok(writer.offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forest::Placement;
    use chrono::{TimeZone, Utc};

    fn new_year() -> Timestamp {
        Timestamp::from(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    fn demo() -> Document {
        let mut doc = Document::new("Demo", "", new_year());
        let first = doc.create_field(FieldValue::text("First"));
        let second = doc.create_field(FieldValue::text("Second"));
        let sub = doc.create_field(FieldValue::text("Sub"));
        doc.append_topic(first).unwrap();
        doc.append_topic(second).unwrap();
        doc.topics_mut().place(sub, Placement::FirstChildOf(second)).unwrap();
        doc
    }

    fn to_bytes(doc: &Document) -> Vec<u8> {
        let mut buf = Vec::new();
        encode(doc, &mut buf).unwrap();
        buf
    }

    /// Header + empty-text title/subtitle/date with no topics.
    fn header_bytes(topics_length: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"BLT");
        buf.push(1);
        buf.extend_from_slice(&(6u32 + 6 + 14).to_le_bytes());
        buf.extend_from_slice(&topics_length.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&[b'T', 0, 6, 0, 0, 0]);
        buf.extend_from_slice(&[b'T', 0, 6, 0, 0, 0]);
        buf.extend_from_slice(&[b'd', 0, 14, 0, 0, 0, 0xE8, 0x07, 1, 1, 0, 0, 0, 0]);
        buf
    }

    #[test]
    fn test_end_to_end_example() {
        let bytes = to_bytes(&demo());
        let doc = decode(bytes.as_slice()).unwrap();

        assert_eq!(doc.title(), "Demo");
        assert_eq!(doc.subtitle(), "");
        assert_eq!(doc.date(), new_year());

        let topics = doc.topics();
        let first = doc.first_topic().unwrap();
        assert_eq!(doc.text(first).unwrap(), Some("First"));
        let second = topics.field(first).unwrap().next().unwrap();
        assert_eq!(doc.text(second).unwrap(), Some("Second"));
        let sub = topics.field(second).unwrap().child().unwrap();
        assert_eq!(doc.text(sub).unwrap(), Some("Sub"));
        assert_eq!(topics.depth(sub).unwrap(), 1);
    }

    #[test]
    fn test_exact_bytes_for_demo() {
        let bytes = to_bytes(&demo());
        let mut expected = Vec::new();
        expected.extend_from_slice(b"BLT\x01");
        expected.extend_from_slice(&(10u32 + 6 + 14).to_le_bytes());
        expected.extend_from_slice(&(11u32 + 12 + 9).to_le_bytes());
        expected.extend_from_slice(&0u32.to_le_bytes());
        expected.extend_from_slice(&[b'T', 0, 10, 0, 4, 0]);
        expected.extend_from_slice(b"Demo");
        expected.extend_from_slice(&[b'T', 0, 6, 0, 0, 0]);
        expected.extend_from_slice(&[b'd', 0, 14, 0, 0, 0, 0xE8, 0x07, 1, 1, 0, 0, 0, 0]);
        expected.extend_from_slice(&[b'T', 0, 11, 0, 5, 0]);
        expected.extend_from_slice(b"First");
        expected.extend_from_slice(&[b'T', 0, 12, 0, 6, 0]);
        expected.extend_from_slice(b"Second");
        expected.extend_from_slice(&[b'T', 1, 9, 0, 3, 0]);
        expected.extend_from_slice(b"Sub");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_empty_document_round_trips() {
        let doc = Document::new("", "", new_year());
        let bytes = to_bytes(&doc);
        assert_eq!(bytes, header_bytes(0));
        let decoded = decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.first_topic(), None);
        assert!(decoded.topics().is_empty());
    }

    #[test]
    fn test_all_kinds_and_depths_round_trip() {
        let mut doc = Document::new("Kinds", "every field type", new_year());
        let a = doc.create_field(FieldValue::icon(Icon::Star, "starred"));
        let b = doc.create_field(FieldValue::Date {
            text: "launch".to_string(),
            timestamp: Timestamp {
                year: 2100,
                month: 12,
                day: 31,
                hour: 23,
                minute: 59,
                second: 59,
            },
        });
        let c = doc.create_field(FieldValue::Blank);
        let d = doc.create_field(FieldValue::text("deep ünïcødé"));
        let e = doc.create_field(FieldValue::text("back to top"));
        doc.append_topic(a).unwrap();
        doc.topics_mut().place(b, Placement::LastChildOf(a)).unwrap();
        doc.topics_mut().place(c, Placement::LastChildOf(b)).unwrap();
        doc.topics_mut().place(d, Placement::LastChildOf(c)).unwrap();
        doc.append_topic(e).unwrap();

        let decoded = decode(to_bytes(&doc).as_slice()).unwrap();
        let original: Vec<(FieldValue, usize)> = doc
            .topics()
            .walk()
            .map(|(id, depth)| (doc.topics().value(id).unwrap().clone(), depth))
            .collect();
        let restored: Vec<(FieldValue, usize)> = decoded
            .topics()
            .walk()
            .map(|(id, depth)| (decoded.topics().value(id).unwrap().clone(), depth))
            .collect();
        assert_eq!(original, restored);
        assert_eq!(restored.iter().map(|(_, d)| *d).collect::<Vec<_>>(), [0, 1, 2, 3, 0]);
        decoded.topics().verify().unwrap();
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = to_bytes(&demo());
        bytes[0] = b'X';
        let err = decode(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, BolnotesError::InvalidFormat(_)), "got {err:?}");
    }

    #[test]
    fn test_rejects_newer_version() {
        let mut bytes = to_bytes(&demo());
        bytes[3] = 2;
        let err = decode(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            BolnotesError::InvalidVersion {
                found: 2,
                supported: 1
            }
        ));
    }

    #[test]
    fn test_unknown_type_reports_record_offset() {
        let mut bytes = header_bytes(12);
        let first_topic = bytes.len() as u64;
        bytes.extend_from_slice(&[b'T', 0, 6, 0, 0, 0]);
        let second_topic = bytes.len() as u64;
        bytes.extend_from_slice(&[0x05, 0, 6, 0, 0, 0]);
        assert_eq!(first_topic, 42);

        let err = decode(bytes.as_slice()).unwrap_err();
        match err {
            BolnotesError::UnknownFieldType {
                type_byte,
                offset,
                section,
            } => {
                assert_eq!(type_byte, 0x05);
                assert_eq!(offset, second_topic);
                assert_eq!(section, Section::Topics);
            }
            other => panic!("expected UnknownFieldType, got {other:?}"),
        }
    }

    #[test]
    fn test_depth_jump_is_malformed() {
        let mut bytes = header_bytes(12);
        bytes.extend_from_slice(&[b'T', 0, 6, 0, 0, 0]);
        bytes.extend_from_slice(&[b'T', 2, 6, 0, 0, 0]);
        let err = decode(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            BolnotesError::MalformedDepth {
                depth: 2,
                previous: Some(0),
                offset: 48
            }
        ));
    }

    #[test]
    fn test_first_topic_must_be_top_level() {
        let mut bytes = header_bytes(6);
        bytes.extend_from_slice(&[b'T', 1, 6, 0, 0, 0]);
        let err = decode(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            BolnotesError::MalformedDepth {
                depth: 1,
                previous: None,
                ..
            }
        ));
    }

    #[test]
    fn test_shallower_record_closes_levels() {
        // a, b(c(d)), e; e follows d at depth 0.
        let mut bytes = header_bytes(30);
        for depth in [0u8, 0, 1, 2, 0] {
            bytes.extend_from_slice(&[b'T', depth, 6, 0, 0, 0]);
        }
        let doc = decode(bytes.as_slice()).unwrap();
        let depths: Vec<usize> = doc.topics().walk().map(|(_, d)| d).collect();
        assert_eq!(depths, [0, 0, 1, 2, 0]);
        assert_eq!(doc.topics().roots().count(), 3);
    }

    #[test]
    fn test_truncated_stream_reports_offset() {
        let bytes = to_bytes(&demo());
        let truncated = &bytes[..bytes.len() - 2];
        let err = decode(truncated).unwrap_err();
        match err {
            BolnotesError::Io { offset, source } => {
                assert_eq!(source.kind(), std::io::ErrorKind::UnexpectedEof);
                // The last record's text starts three bytes before the end.
                assert_eq!(offset, bytes.len() as u64 - 3);
            }
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn test_short_record_length_rejected() {
        let mut bytes = header_bytes(9);
        bytes.extend_from_slice(&[b'T', 0, 6, 0, 3, 0]);
        bytes.extend_from_slice(b"abc");
        let err = decode(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, BolnotesError::InvalidFormat(_)));
    }

    #[test]
    fn test_surplus_record_bytes_skipped() {
        let mut bytes = header_bytes(10);
        bytes.extend_from_slice(&[b'T', 0, 10, 0, 2, 0]);
        bytes.extend_from_slice(b"hi\xff\xff");
        let doc = decode(bytes.as_slice()).unwrap();
        let first = doc.first_topic().unwrap();
        assert_eq!(doc.text(first).unwrap(), Some("hi"));
    }

    #[test]
    fn test_blank_record_with_text_rejected() {
        let mut bytes = header_bytes(8);
        bytes.extend_from_slice(&[0, 0, 8, 0, 2, 0]);
        bytes.extend_from_slice(b"hi");
        let err = decode(bytes.as_slice()).unwrap_err();
        match err {
            BolnotesError::InvalidFormat(msg) => assert!(msg.contains("offset 42")),
            other => panic!("expected InvalidFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_record_round_trips_exactly() {
        let mut bytes = header_bytes(6);
        bytes.extend_from_slice(&[0, 0, 6, 0, 0, 0]);
        let doc = decode(bytes.as_slice()).unwrap();
        assert_eq!(doc.value(doc.first_topic().unwrap()).unwrap(), &FieldValue::Blank);
        assert_eq!(to_bytes(&doc), bytes);
    }

    #[test]
    fn test_invalid_icon_rejected() {
        let mut bytes = header_bytes(7);
        bytes.extend_from_slice(&[b'I', 0, 7, 0, 0, 0, 31]);
        let err = decode(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            BolnotesError::InvalidIcon {
                index: 31,
                offset: 48
            }
        ));
    }

    #[test]
    fn test_properties_must_be_text_text_date() {
        let mut bytes = header_bytes(0);
        // Turn the subtitle into a blank record.
        bytes[22] = 0;
        let err = decode(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, BolnotesError::InvalidFormat(_)));
    }

    #[test]
    fn test_attachments_preserved() {
        let mut bytes = header_bytes(0);
        bytes[12..16].copy_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        let doc = decode(bytes.as_slice()).unwrap();
        assert_eq!(doc.attachments(), &[1, 2, 3, 4]);
        assert_eq!(to_bytes(&doc), bytes);
    }

    #[test]
    fn test_oversized_text_rejected() {
        let mut doc = Document::new("big", "", new_year());
        let huge = doc.create_field(FieldValue::text("x".repeat(70_000)));
        doc.append_topic(huge).unwrap();
        let err = encode(&doc, Vec::new()).unwrap_err();
        assert!(matches!(err, BolnotesError::FieldTooLarge(_)));
    }

    #[test]
    fn test_read_header_only() {
        let bytes = to_bytes(&demo());
        let header = read_header(bytes.as_slice()).unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.props_length, 30);
        assert_eq!(header.topics_length, 32);
        assert_eq!(header.attach_length, 0);
    }
}

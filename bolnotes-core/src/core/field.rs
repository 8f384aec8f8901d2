//! Field values: the typed payload carried by every outline entry.
//!
//! A field is one of four kinds. Each kind has a one-byte tag in the
//! document format and may carry a fixed-size trailer after its text:
//!
//! | Kind  | Tag   | Text | Trailer                          |
//! |-------|-------|------|----------------------------------|
//! | Text  | `'T'` | yes  | none                             |
//! | Date  | `'d'` | yes  | 7-byte timestamp + 1 reserved    |
//! | Icon  | `'I'` | yes  | 1-byte icon index                |
//! | Blank | `0`   | no   | none                             |

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// The four kinds of field an outline can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Date,
    Icon,
    Blank,
}

impl FieldKind {
    /// Returns the tag byte written at the start of a field record.
    pub fn type_byte(self) -> u8 {
        match self {
            Self::Text => b'T',
            Self::Date => b'd',
            Self::Icon => b'I',
            Self::Blank => 0,
        }
    }

    /// Maps a record tag byte back to its kind.
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            b'T' => Some(Self::Text),
            b'd' => Some(Self::Date),
            b'I' => Some(Self::Icon),
            0 => Some(Self::Blank),
            _ => None,
        }
    }

    /// Number of type-specific bytes that follow the text of a record.
    pub fn trailer_len(self) -> usize {
        match self {
            Self::Date => Timestamp::ENCODED_LEN + 1,
            Self::Icon => 1,
            Self::Text | Self::Blank => 0,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Date => "date",
            Self::Icon => "icon",
            Self::Blank => "blank",
        };
        f.write_str(name)
    }
}

/// A calendar instant in UTC with a 16-bit year.
///
/// Stored field by field rather than as a Unix offset, so values read from
/// a file are kept verbatim even when they do not name a real instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// Size of the packed timestamp inside a date record.
    pub const ENCODED_LEN: usize = 7;

    /// Returns the current UTC time, truncated to whole seconds.
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    /// Converts a chrono instant. Years outside `0..=65535` are clamped.
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self {
            year: dt.year().clamp(0, i32::from(u16::MAX)) as u16,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
        }
    }

    /// Converts to a chrono instant, or `None` if the fields do not name one.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))?
            .and_hms_opt(
                u32::from(self.hour),
                u32::from(self.minute),
                u32::from(self.second),
            )
            .map(|naive| naive.and_utc())
    }

    /// Formats with a chrono format string, falling back to the fixed
    /// `YYYY-MM-DD HH:MM:SS` layout when the fields are not a valid instant
    /// or `pattern` contains an unknown specifier.
    pub fn format(&self, pattern: &str) -> String {
        let Some(dt) = self.to_datetime() else {
            return self.to_string();
        };
        let mut out = String::new();
        match write!(out, "{}", dt.format(pattern)) {
            Ok(()) => out,
            Err(_) => self.to_string(),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let year = self.year.to_le_bytes();
        [
            year[0],
            year[1],
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        ]
    }

    pub fn from_bytes(bytes: [u8; Self::ENCODED_LEN]) -> Self {
        Self {
            year: u16::from_le_bytes([bytes[0], bytes[1]]),
            month: bytes[2],
            day: bytes[3],
            hour: bytes[4],
            minute: bytes[5],
            second: bytes[6],
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(&dt)
    }
}

/// The closed set of icons an icon field can show. The discriminant is the
/// index stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Icon {
    Application = 0,
    Book,
    Bug,
    Calendar,
    Chart,
    Clipboard,
    Clock,
    Cloud,
    Computer,
    Database,
    Document,
    Envelope,
    Error,
    Flag,
    Folder,
    Gear,
    Globe,
    Heart,
    Home,
    Information,
    Key,
    Lightbulb,
    Link,
    Lock,
    Music,
    Pencil,
    Person,
    Phone,
    Question,
    Star,
    Warning,
}

impl Icon {
    /// Every icon in index order.
    pub const ALL: [Icon; 31] = [
        Icon::Application,
        Icon::Book,
        Icon::Bug,
        Icon::Calendar,
        Icon::Chart,
        Icon::Clipboard,
        Icon::Clock,
        Icon::Cloud,
        Icon::Computer,
        Icon::Database,
        Icon::Document,
        Icon::Envelope,
        Icon::Error,
        Icon::Flag,
        Icon::Folder,
        Icon::Gear,
        Icon::Globe,
        Icon::Heart,
        Icon::Home,
        Icon::Information,
        Icon::Key,
        Icon::Lightbulb,
        Icon::Link,
        Icon::Lock,
        Icon::Music,
        Icon::Pencil,
        Icon::Person,
        Icon::Phone,
        Icon::Question,
        Icon::Star,
        Icon::Warning,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// Lower-case name used in plain-text output and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Book => "book",
            Self::Bug => "bug",
            Self::Calendar => "calendar",
            Self::Chart => "chart",
            Self::Clipboard => "clipboard",
            Self::Clock => "clock",
            Self::Cloud => "cloud",
            Self::Computer => "computer",
            Self::Database => "database",
            Self::Document => "document",
            Self::Envelope => "envelope",
            Self::Error => "error",
            Self::Flag => "flag",
            Self::Folder => "folder",
            Self::Gear => "gear",
            Self::Globe => "globe",
            Self::Heart => "heart",
            Self::Home => "home",
            Self::Information => "information",
            Self::Key => "key",
            Self::Lightbulb => "lightbulb",
            Self::Link => "link",
            Self::Lock => "lock",
            Self::Music => "music",
            Self::Pencil => "pencil",
            Self::Person => "person",
            Self::Phone => "phone",
            Self::Question => "question",
            Self::Star => "star",
            Self::Warning => "warning",
        }
    }
}

impl fmt::Display for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Icon {
    type Err = String;

    /// Accepts an icon name (case-insensitive) or its numeric index.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(index) = trimmed.parse::<u8>() {
            return Self::from_index(index)
                .ok_or_else(|| format!("icon index {index} is out of range (0-30)"));
        }
        let lower = trimmed.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|icon| icon.name() == lower)
            .ok_or_else(|| format!("unknown icon: {trimmed}"))
    }
}

/// The payload of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Date { text: String, timestamp: Timestamp },
    Icon { text: String, icon: Icon },
    Blank,
}

impl FieldValue {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn date(timestamp: Timestamp) -> Self {
        Self::Date {
            text: String::new(),
            timestamp,
        }
    }

    pub fn icon(icon: Icon, text: impl Into<String>) -> Self {
        Self::Icon {
            text: text.into(),
            icon,
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::Date { .. } => FieldKind::Date,
            Self::Icon { .. } => FieldKind::Icon,
            Self::Blank => FieldKind::Blank,
        }
    }

    /// The text payload, or `None` for a blank separator.
    pub fn text_content(&self) -> Option<&str> {
        match self {
            Self::Text(text) | Self::Date { text, .. } | Self::Icon { text, .. } => Some(text),
            Self::Blank => None,
        }
    }

    /// Replaces the text payload.
    ///
    /// Returns `false` (and leaves the value untouched) for a blank separator.
    pub fn set_text(&mut self, new_text: impl Into<String>) -> bool {
        match self {
            Self::Text(text) | Self::Date { text, .. } | Self::Icon { text, .. } => {
                *text = new_text.into();
                true
            }
            Self::Blank => false,
        }
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Date { timestamp, .. } => Some(*timestamp),
            _ => None,
        }
    }

    pub fn icon_index(&self) -> Option<Icon> {
        match self {
            Self::Icon { icon, .. } => Some(*icon),
            _ => None,
        }
    }

    /// Converts to another kind, keeping the text where the target has one.
    ///
    /// A field converted to a date is stamped with `timestamp`; one converted
    /// to an icon gets [`Icon::Document`].
    pub fn into_kind(self, kind: FieldKind, timestamp: Timestamp) -> Self {
        if self.kind() == kind {
            return self;
        }
        let text = self.text_content().unwrap_or_default().to_string();
        match kind {
            FieldKind::Text => Self::Text(text),
            FieldKind::Date => Self::Date { text, timestamp },
            FieldKind::Icon => Self::Icon {
                text,
                icon: Icon::Document,
            },
            FieldKind::Blank => Self::Blank,
        }
    }

    /// The line shown for this field in an outline view.
    ///
    /// `date_format` is a chrono format string applied to date fields.
    pub fn display_text(&self, date_format: &str) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Date { text, timestamp } => {
                let date = timestamp.format(date_format);
                if text.is_empty() {
                    date
                } else {
                    format!("{date} {text}")
                }
            }
            Self::Icon { text, icon } => format!("[{icon}] {text}"),
            Self::Blank => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_type_bytes_are_stable() {
        assert_eq!(FieldKind::Text.type_byte(), b'T');
        assert_eq!(FieldKind::Date.type_byte(), b'd');
        assert_eq!(FieldKind::Icon.type_byte(), b'I');
        assert_eq!(FieldKind::Blank.type_byte(), 0);
        assert_eq!(FieldKind::from_type_byte(0x05), None);
        assert_eq!(FieldKind::from_type_byte(b'd'), Some(FieldKind::Date));
    }

    #[test]
    fn test_timestamp_packs_year_little_endian() {
        let ts = Timestamp {
            year: 2024,
            month: 1,
            day: 2,
            hour: 3,
            minute: 4,
            second: 5,
        };
        let bytes = ts.to_bytes();
        assert_eq!(bytes, [0xE8, 0x07, 1, 2, 3, 4, 5]);
        assert_eq!(Timestamp::from_bytes(bytes), ts);
    }

    #[test]
    fn test_timestamp_beyond_2038() {
        let dt = Utc.with_ymd_and_hms(2101, 6, 30, 23, 59, 58).unwrap();
        let ts = Timestamp::from(dt);
        assert_eq!(ts.year, 2101);
        assert_eq!(ts.to_datetime(), Some(dt));
    }

    #[test]
    fn test_invalid_timestamp_still_displays() {
        let ts = Timestamp {
            year: 2024,
            month: 13,
            day: 40,
            hour: 0,
            minute: 0,
            second: 0,
        };
        assert!(ts.to_datetime().is_none());
        assert_eq!(ts.format("%d/%m/%Y"), "2024-13-40 00:00:00");
    }

    #[test]
    fn test_unknown_format_specifier_falls_back() {
        let ts = Timestamp::from(Utc.with_ymd_and_hms(2024, 3, 5, 8, 9, 10).unwrap());
        assert_eq!(ts.format("%Q"), "2024-03-05 08:09:10");
        assert_eq!(FieldValue::date(ts).display_text("%Y %Q"), "2024-03-05 08:09:10");
        assert_eq!(ts.format("%d.%m."), "05.03.");
    }

    #[test]
    fn test_icon_table_has_31_entries() {
        assert_eq!(Icon::ALL.len(), 31);
        for (i, icon) in Icon::ALL.iter().enumerate() {
            assert_eq!(icon.index() as usize, i);
        }
        assert_eq!(Icon::from_index(30), Some(Icon::Warning));
        assert_eq!(Icon::from_index(31), None);
    }

    #[test]
    fn test_icon_from_str() {
        assert_eq!("Star".parse::<Icon>(), Ok(Icon::Star));
        assert_eq!("3".parse::<Icon>(), Ok(Icon::Calendar));
        assert!("99".parse::<Icon>().is_err());
        assert!("unicorn".parse::<Icon>().is_err());
    }

    #[test]
    fn test_blank_rejects_text() {
        let mut blank = FieldValue::Blank;
        assert!(!blank.set_text("hello"));
        assert_eq!(blank.text_content(), None);

        let mut text = FieldValue::text("a");
        assert!(text.set_text("b"));
        assert_eq!(text.text_content(), Some("b"));
    }

    #[test]
    fn test_into_kind_keeps_text() {
        let ts = Timestamp::default();
        let converted = FieldValue::text("Meeting").into_kind(FieldKind::Icon, ts);
        assert_eq!(converted, FieldValue::icon(Icon::Document, "Meeting"));

        let dated = converted.into_kind(FieldKind::Date, ts);
        assert_eq!(dated.text_content(), Some("Meeting"));
        assert_eq!(dated.timestamp(), Some(ts));

        assert_eq!(dated.into_kind(FieldKind::Blank, ts), FieldValue::Blank);
    }

    #[test]
    fn test_display_text() {
        let ts = Timestamp {
            year: 2024,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        };
        assert_eq!(FieldValue::date(ts).display_text("%Y-%m-%d"), "2024-01-01");
        let labelled = FieldValue::Date {
            text: "kickoff".to_string(),
            timestamp: ts,
        };
        assert_eq!(labelled.display_text("%Y-%m-%d"), "2024-01-01 kickoff");
        assert_eq!(
            FieldValue::icon(Icon::Star, "Important").display_text("%Y"),
            "[star] Important"
        );
        assert_eq!(FieldValue::Blank.display_text("%Y"), "");
    }
}

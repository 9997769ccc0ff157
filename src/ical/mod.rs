//! This module handles conversion between KTimeTracker storage files and internal representations
//!
//! It is a wrapper around different Rust third-party libraries, since I haven't found any library that is able to parse _and_ generate iCal files
//! while keeping the exact letter case of extension field names. \
//! Reading unfolds lines with the `ical` crate and then splits content lines here, without ever changing the case of a name.
//! Writing is done with the `ics` crate, which writes property names exactly as they are given.

mod parser;
pub use parser::{parse, ParsedCalendar};
mod builder;
pub use builder::build_from;

use std::borrow::Cow;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::settings::{ORG_NAME, PRODUCT_NAME};

/// Prefix of non-standard iCal fields
pub const EXTENSION_PREFIX: &str = "X-";

pub fn default_prod_id() -> String {
    format!("-//{}//{}//EN", ORG_NAME.lock().map(|s| s.clone()).unwrap_or_default(),
                             PRODUCT_NAME.lock().map(|s| s.clone()).unwrap_or_default())
}

/// Whether a field name is an extension name.
///
/// This is the exemption list of the writer: extension names are never upper-cased, because KTimeTracker reads them case-sensitively
/// (`X-KDE-ktimetracker-totalTaskTime` and `X-KDE-KTIMETRACKER-TOTALTASKTIME` are different fields for it).
pub fn is_extension_name(name: &str) -> bool {
    name.get(..EXTENSION_PREFIX.len())
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case(EXTENSION_PREFIX))
}

/// The name a field is written with: standard names are upper-cased, extension names are kept as-is
pub fn output_name(name: &str) -> Cow<'_, str> {
    if is_extension_name(name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(name.to_ascii_uppercase())
    }
}


/// The set of extension field names a storage file uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldDialect {
    /// KTimeTracker (KDE 4 and later)
    KTimeTracker,
    /// KArm, the ancestor of KTimeTracker
    KArm,
}

impl Default for FieldDialect {
    fn default() -> Self {
        FieldDialect::KTimeTracker
    }
}

impl FieldDialect {
    pub const ALL: [FieldDialect; 2] = [FieldDialect::KTimeTracker, FieldDialect::KArm];

    pub fn session_time_field(&self) -> &'static str {
        match self {
            FieldDialect::KTimeTracker => "X-KDE-ktimetracker-totalSessionTime",
            FieldDialect::KArm => "X-KDE-karm-totalSessionTime",
        }
    }

    pub fn total_time_field(&self) -> &'static str {
        match self {
            FieldDialect::KTimeTracker => "X-KDE-ktimetracker-totalTaskTime",
            FieldDialect::KArm => "X-KDE-karm-totalTaskTime",
        }
    }

    pub fn kind_field(&self) -> &'static str {
        match self {
            FieldDialect::KTimeTracker => "X-KDE-ktimetracker-bctype",
            FieldDialect::KArm => "X-BASECAMP-type",
        }
    }
}


/// A task property that is interpreted, and written back from its typed value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TodoField {
    Created,
    LastModified,
    Summary,
    RelatedTo,
    Completed,
    PercentComplete,
    SessionTime,
    TotalTime,
    Kind,
}

impl TodoField {
    /// Where fields go when a task has no recorded layout (e.g. for brand new tasks)
    pub const DEFAULT_ORDER: [TodoField; 9] = [
        TodoField::Created,
        TodoField::LastModified,
        TodoField::Summary,
        TodoField::RelatedTo,
        TodoField::Completed,
        TodoField::PercentComplete,
        TodoField::SessionTime,
        TodoField::TotalTime,
        TodoField::Kind,
    ];
}


/// A property that this crate does not interpret, kept so that it can be written back
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtraProperty {
    /// The name, with its original case
    pub name: String,
    pub params: Vec<(String, String)>,
    /// The raw (still escaped) value
    pub value: String,
}

impl ExtraProperty {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self { name: name.into(), params: Vec::new(), value: value.into() }
    }
}


/// Undo the backslash escaping of an iCal TEXT value
///
/// `\n` and `\N` become line breaks, and a backslash in front of any other non-alphanumeric character is dropped.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(next) if !next.is_alphanumeric() && next != '_' => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            },
            None => out.push('\\'),
        }
    }
    out
}

/// Escape a string so that it can be used as an iCal TEXT value
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {},
            other => out.push(other),
        }
    }
    out
}

const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const FLOATING_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Parse an iCal DATE-TIME. Floating times are considered UTC.
pub fn parse_date_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, UTC_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, FLOATING_FORMAT))
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn format_date_time(dt: &DateTime<Utc>) -> String {
    dt.format(UTC_FORMAT).to_string()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_names_keep_their_case() {
        assert_eq!(output_name("X-KDE-ktimetracker-totalSessionTime"), "X-KDE-ktimetracker-totalSessionTime");
        assert_eq!(output_name("x-kde-karm-totalTaskTime"), "x-kde-karm-totalTaskTime");
        assert_eq!(output_name("percent-complete"), "PERCENT-COMPLETE");
        assert!(!is_extension_name("X"));
        assert!(!is_extension_name("€X"));
        assert_eq!(output_name("€x-field"), "€X-FIELD");
    }

    #[test]
    fn text_escaping() {
        assert_eq!(unescape_text(r"Fix bugs\, then ship\; maybe"), "Fix bugs, then ship; maybe");
        assert_eq!(unescape_text(r"path C:\\temp\nnext line"), "path C:\\temp\nnext line");
        assert_eq!(unescape_text(r"a \(b\) \d"), r"a (b) \d");

        let original = "Review: a, b; c\\d\nsecond line";
        assert_eq!(unescape_text(&escape_text(original)), original);
    }

    #[test]
    fn date_times() {
        let dt = parse_date_time("20081206T203902Z").unwrap();
        assert_eq!(format_date_time(&dt), "20081206T203902Z");
        assert_eq!(parse_date_time("20081206T203902"), Some(dt));
        assert_eq!(parse_date_time("2008-12-06"), None);
    }
}

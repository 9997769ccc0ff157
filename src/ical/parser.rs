//! A module to parse KTimeTracker storage files

use ical::LineReader;

use crate::error::{KarmError, Result};
use crate::ical::{parse_date_time, unescape_text, ExtraProperty, FieldDialect, TodoField};
use crate::task::{TaskFields, TaskId, TaskKind};
use crate::tree::TaskRecord;

/// The content of a storage file, as flat records
#[derive(Debug, Default)]
pub struct ParsedCalendar {
    /// The `PRODID` of the calendar, if any
    pub prod_id: Option<String>,
    /// The dialect of the first extension field that was met (or the default dialect)
    pub dialect: FieldDialect,
    /// Calendar-level properties other than `VERSION` and `PRODID`
    pub calendar_properties: Vec<ExtraProperty>,
    /// Every `VTODO`, in file order
    pub records: Vec<TaskRecord>,
    /// How many components have been ignored (events, journals, alarms...)
    pub skipped_components: usize,
}

/// A content line, split but with nothing (case, escaping) altered
struct ContentLine<'a> {
    name: &'a str,
    params: Vec<(String, String)>,
    value: &'a str,
}

impl<'a> ContentLine<'a> {
    /// Split `NAME;PARAM=VALUE:value`. Colons and semicolons inside double-quoted parameter values are not separators.
    fn split(line: &'a str) -> Option<Self> {
        let mut in_quotes = false;
        let mut separators = Vec::new();
        let mut colon = None;
        for (pos, c) in line.char_indices() {
            match c {
                '"' => in_quotes = !in_quotes,
                ';' if !in_quotes => separators.push(pos),
                ':' if !in_quotes => {
                    colon = Some(pos);
                    break;
                },
                _ => {},
            }
        }
        let colon = colon?;
        let value = &line[colon + 1..];

        let name_end = separators.first().copied().unwrap_or(colon);
        let name = &line[..name_end];
        if name.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        let mut bounds = separators.clone();
        bounds.push(colon);
        for window in bounds.windows(2) {
            let raw = &line[window[0] + 1..window[1]];
            match raw.split_once('=') {
                Some((k, v)) => params.push((k.to_string(), v.to_string())),
                None => params.push((raw.to_string(), String::new())),
            }
        }

        Some(Self { name, params, value })
    }

    fn is(&self, standard_name: &str) -> bool {
        self.name.eq_ignore_ascii_case(standard_name)
    }

    fn to_extra(&self) -> ExtraProperty {
        ExtraProperty {
            name: self.name.to_string(),
            params: self.params.clone(),
            value: self.value.to_string(),
        }
    }
}


/// Parse the content of a storage file into flat [`TaskRecord`]s
pub fn parse(content: &str) -> Result<ParsedCalendar> {
    let mut parsed = ParsedCalendar::default();
    let mut dialect = None;

    let mut components: Vec<String> = Vec::new();
    let mut current: Option<TaskRecord> = None;

    for line in LineReader::new(content.as_bytes()) {
        let number = line.number();
        let text: &str = line.as_str();
        let text = text.trim_end_matches('\r');
        if text.trim().is_empty() {
            continue;
        }

        let content_line = ContentLine::split(text)
            .ok_or_else(|| KarmError::malformed(number, format!("not a valid content line: {:?}", text)))?;

        if content_line.is("BEGIN") {
            let component = content_line.value.trim().to_ascii_uppercase();
            match (components.as_slice(), component.as_str()) {
                ([], "VCALENDAR") => {},
                ([], other) => return Err(KarmError::malformed(number, format!("expected a VCALENDAR, found a {}", other))),
                ([cal], "VTODO") if cal == "VCALENDAR" => {
                    current = Some(TaskRecord::at_line(number));
                },
                (stack, other) => {
                    if stack.len() <= 2 {
                        log::warn!("Ignoring a {} component (line {}): only tasks are supported", other, number);
                        parsed.skipped_components += 1;
                    }
                },
            }
            components.push(component);
            continue;
        }

        if content_line.is("END") {
            let component = content_line.value.trim().to_ascii_uppercase();
            match components.pop() {
                Some(open) if open == component => {},
                Some(open) => log::warn!("Line {}: END:{} closes a {}", number, component, open),
                None => return Err(KarmError::malformed(number, format!("END:{} without BEGIN", component))),
            }
            if component == "VTODO" && components.len() == 1 {
                if let Some(record) = current.take() {
                    parsed.records.push(record);
                }
            }
            continue;
        }

        match components.len() {
            1 => read_calendar_property(&content_line, &mut parsed),
            2 => {
                if let Some(record) = current.as_mut() {
                    read_task_property(&content_line, record, &mut dialect, number);
                }
            },
            _ => {
                // property of a component we are skipping
            },
        }
    }

    if !components.is_empty() {
        log::warn!("Storage data ends with unclosed components: {:?}", components);
    }

    parsed.dialect = dialect.unwrap_or_default();
    Ok(parsed)
}

fn read_calendar_property(line: &ContentLine, parsed: &mut ParsedCalendar) {
    if line.is("PRODID") {
        parsed.prod_id = Some(line.value.to_string());
    } else if line.is("VERSION") {
        // always written as 2.0
    } else {
        parsed.calendar_properties.push(line.to_extra());
    }
}

fn read_task_property(line: &ContentLine, record: &mut TaskRecord, dialect: &mut Option<FieldDialect>, number: usize) {
    let fields: &mut TaskFields = &mut record.fields;

    if line.is("UID") {
        record.id = Some(TaskId::from(unescape_text(line.value)));
        return;
    }
    if line.is("SUMMARY") {
        record.title = Some(unescape_text(line.value));
        note_position(fields, TodoField::Summary);
        return;
    }
    if line.is("RELATED-TO") && !has_non_parent_reltype(line) {
        record.parent = Some(TaskId::from(unescape_text(line.value)));
        note_position(fields, TodoField::RelatedTo);
        return;
    }

    let date_slot = if line.is("DTSTAMP") {
        Some((&mut fields.dtstamp, None))
    } else if line.is("CREATED") {
        Some((&mut fields.created, Some(TodoField::Created)))
    } else if line.is("LAST-MODIFIED") {
        Some((&mut fields.last_modified, Some(TodoField::LastModified)))
    } else if line.is("COMPLETED") {
        Some((&mut fields.completed, Some(TodoField::Completed)))
    } else {
        None
    };
    if let Some((slot, field)) = date_slot {
        match parse_date_time(line.value) {
            Some(dt) => {
                *slot = Some(dt);
                // DTSTAMP always comes right after UID
                if let Some(field) = field {
                    note_position(fields, field);
                }
            },
            None => {
                log::warn!("Line {}: unsupported date-time {:?} for {}, keeping it as-is", number, line.value, line.name);
                fields.extra_properties.push(line.to_extra());
            },
        }
        return;
    }

    if line.is("PERCENT-COMPLETE") {
        match line.value.trim().parse::<u8>() {
            Ok(percent) if percent <= 100 => {
                fields.percent_complete = Some(percent);
                note_position(fields, TodoField::PercentComplete);
            },
            _ => {
                log::warn!("Line {}: invalid percentage {:?}, keeping it as-is", number, line.value);
                fields.extra_properties.push(line.to_extra());
            },
        }
        return;
    }

    for candidate in FieldDialect::ALL.iter() {
        let minutes_slot = if line.is(candidate.session_time_field()) {
            Some((&mut fields.session_minutes, TodoField::SessionTime))
        } else if line.is(candidate.total_time_field()) {
            Some((&mut fields.total_minutes, TodoField::TotalTime))
        } else {
            None
        };

        if let Some((slot, field)) = minutes_slot {
            dialect.get_or_insert(*candidate);
            match line.value.trim().parse::<i64>() {
                Ok(minutes) => {
                    *slot = Some(minutes);
                    note_position(fields, field);
                },
                Err(_) => {
                    log::warn!("Line {}: {} is not a number of minutes ({:?}), keeping it as-is", number, line.name, line.value);
                    fields.extra_properties.push(line.to_extra());
                },
            }
            return;
        }

        if line.is(candidate.kind_field()) {
            dialect.get_or_insert(*candidate);
            match line.value.parse::<TaskKind>() {
                Ok(kind) => {
                    fields.kind = kind;
                    note_position(fields, TodoField::Kind);
                },
                Err(err) => {
                    log::warn!("Line {}: {}, keeping it as-is", number, err);
                    fields.extra_properties.push(line.to_extra());
                },
            }
            return;
        }
    }

    fields.extra_properties.push(line.to_extra());
}

/// Remember where a field has been met first, relatively to the properties that are kept verbatim
fn note_position(fields: &mut TaskFields, field: TodoField) {
    if !fields.layout.iter().any(|(known, _)| *known == field) {
        let position = fields.extra_properties.len();
        fields.layout.push((field, position));
    }
}

/// `RELATED-TO` defaults to a parent relationship, but may describe a child or a sibling
fn has_non_parent_reltype(line: &ContentLine) -> bool {
    line.params.iter().any(|(k, v)| {
        k.eq_ignore_ascii_case("RELTYPE") && !v.trim_matches('"').eq_ignore_ascii_case("PARENT")
    })
}


#[cfg(test)]
mod test {
    const EXAMPLE_STORAGE: &str = "BEGIN:VCALENDAR\r
PRODID:-//K Desktop Environment//NONSGML KTimeTracker 4.2.1//EN\r
VERSION:2.0\r
X-KDE-ktimetracker-storageVersion:1\r
BEGIN:VTODO\r
DTSTAMP:20081206T203902Z\r
X-KDE-ktimetracker-bctype:project\r
X-KDE-ktimetracker-totalSessionTime:15\r
X-KDE-ktimetracker-totalTaskTime:95\r
CREATED:20081127T210402Z\r
UID:1018268\r
LAST-MODIFIED:20081206T203902Z\r
SUMMARY:Website relaunch\\, phase 2\r
DESCRIPTION;LANGUAGE=en:Some\r
  folded description\r
END:VTODO\r
BEGIN:VTODO\r
DTSTAMP:20081206T203902Z\r
X-KDE-ktimetracker-bctype:todoitem\r
UID:6494365\r
SUMMARY:example todo\r
RELATED-TO:1018268\r
COMPLETED:20081203T232709Z\r
PERCENT-COMPLETE:100\r
BEGIN:VALARM\r
ACTION:DISPLAY\r
END:VALARM\r
END:VTODO\r
BEGIN:VEVENT\r
UID:event-1\r
SUMMARY:worked\r
END:VEVENT\r
END:VCALENDAR\r
";

    use super::*;

    #[test]
    fn test_storage_parsing() {
        let parsed = parse(EXAMPLE_STORAGE).unwrap();

        assert_eq!(parsed.prod_id.as_deref(), Some("-//K Desktop Environment//NONSGML KTimeTracker 4.2.1//EN"));
        assert_eq!(parsed.dialect, FieldDialect::KTimeTracker);
        assert_eq!(parsed.calendar_properties, vec![ExtraProperty::new("X-KDE-ktimetracker-storageVersion", "1")]);
        assert_eq!(parsed.skipped_components, 2);
        assert_eq!(parsed.records.len(), 2);

        let project = &parsed.records[0];
        assert_eq!(project.id, Some(TaskId::from("1018268")));
        assert_eq!(project.title.as_deref(), Some("Website relaunch, phase 2"));
        assert_eq!(project.parent, None);
        assert_eq!(project.fields.kind, TaskKind::Project);
        assert_eq!(project.fields.session_minutes, Some(15));
        assert_eq!(project.fields.total_minutes, Some(95));
        assert_eq!(project.fields.extra_properties.len(), 1);
        let description = &project.fields.extra_properties[0];
        assert_eq!(description.name, "DESCRIPTION");
        assert_eq!(description.params, vec![("LANGUAGE".to_string(), "en".to_string())]);
        assert_eq!(description.value, "Some folded description");

        assert_eq!(project.fields.layout, vec![
            (TodoField::Kind, 0),
            (TodoField::SessionTime, 0),
            (TodoField::TotalTime, 0),
            (TodoField::Created, 0),
            (TodoField::LastModified, 0),
            (TodoField::Summary, 0),
        ]);

        let item = &parsed.records[1];
        assert_eq!(item.parent, Some(TaskId::from("1018268")));
        assert_eq!(item.fields.kind, TaskKind::TaskItem);
        assert_eq!(item.fields.percent_complete, Some(100));
        assert!(item.fields.completed.is_some());
        assert!(item.fields.extra_properties.is_empty());
    }

    #[test]
    fn test_legacy_dialect_is_detected() {
        let content = "BEGIN:VCALENDAR\n\
            BEGIN:VTODO\n\
            UID:1\n\
            SUMMARY:legacy\n\
            X-BASECAMP-type:todolist\n\
            X-KDE-karm-totalTaskTime:12\n\
            END:VTODO\n\
            END:VCALENDAR\n";

        let parsed = parse(content).unwrap();
        assert_eq!(parsed.dialect, FieldDialect::KArm);
        assert_eq!(parsed.records[0].fields.kind, TaskKind::TaskList);
        assert_eq!(parsed.records[0].fields.total_minutes, Some(12));
    }

    #[test]
    fn test_odd_values_are_kept_verbatim() {
        let content = "BEGIN:VCALENDAR\n\
            BEGIN:VTODO\n\
            UID:1\n\
            SUMMARY:odd\n\
            PERCENT-COMPLETE:140\n\
            X-KDE-ktimetracker-bctype:milestone\n\
            RELATED-TO;RELTYPE=CHILD:2\n\
            X-Custom;X-PARAM=\"a:b;c\":value\n\
            END:VTODO\n\
            END:VCALENDAR\n";

        let parsed = parse(content).unwrap();
        let record = &parsed.records[0];
        assert_eq!(record.parent, None);
        assert_eq!(record.fields.kind, TaskKind::Unclassified);
        assert_eq!(record.fields.percent_complete, None);

        let names: Vec<&str> = record.fields.extra_properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["PERCENT-COMPLETE", "X-KDE-ktimetracker-bctype", "RELATED-TO", "X-Custom"]);
        let custom = &record.fields.extra_properties[3];
        assert_eq!(custom.params, vec![("X-PARAM".to_string(), "\"a:b;c\"".to_string())]);
        assert_eq!(custom.value, "value");
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(parse("BEGIN:VCALENDAR\nthis is not ical\n"), Err(KarmError::MalformedRecord { .. })));
        assert!(matches!(parse("BEGIN:VTODO\nEND:VTODO\n"), Err(KarmError::MalformedRecord { .. })));
    }
}

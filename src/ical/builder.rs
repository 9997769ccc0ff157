//! A module to build KTimeTracker storage files

use chrono::{SubsecRound, Utc};
use ics::components::{Parameter, Property};
use ics::properties::{Completed, Created, LastModified, PercentComplete, RelatedTo, Summary};
use ics::{ICalendar, ToDo};

use crate::ical::{escape_text, format_date_time, output_name, ExtraProperty, FieldDialect, TodoField};
use crate::tree::TaskRecord;

/// Create the content of a storage file from flat records.
///
/// Records are written in the given order, which is expected to list parents before their children.
pub fn build_from(
    records: &[TaskRecord],
    prod_id: &str,
    calendar_properties: &[ExtraProperty],
    dialect: FieldDialect,
) -> String {
    let mut calendar = ICalendar::new("2.0", prod_id.to_string());
    for property in calendar_properties {
        calendar.push(extra_property(property));
    }

    for record in records {
        calendar.add_todo(build_todo(record, dialect));
    }

    calendar.to_string()
}

fn build_todo(record: &TaskRecord, dialect: FieldDialect) -> ToDo<'static> {
    let fields = &record.fields;
    let uid = record.id.as_ref().map(|id| escape_text(id.as_str())).unwrap_or_default();
    // DTSTAMP is mandatory in a VTODO
    let dtstamp = fields.dtstamp
        .or(fields.last_modified)
        .unwrap_or_else(|| Utc::now().trunc_subsecs(0));

    let mut todo = ToDo::new(uid, format_date_time(&dtstamp));
    let mut placed = placement(&fields.layout).into_iter().peekable();
    for (index, property) in fields.extra_properties.iter().enumerate() {
        while let Some((field, _)) = placed.next_if(|(_, position)| *position <= index) {
            if let Some(built) = todo_field(record, field, dialect) {
                todo.push(built);
            }
        }
        todo.push(extra_property(property));
    }
    for (field, _) in placed {
        if let Some(built) = todo_field(record, field, dialect) {
            todo.push(built);
        }
    }

    todo
}

/// Every interpreted field, at the position it has been read from.
/// Fields that have not been read go in the default order, before the extra properties.
fn placement(layout: &[(TodoField, usize)]) -> Vec<(TodoField, usize)> {
    let mut placed = layout.to_vec();
    for field in TodoField::DEFAULT_ORDER.iter() {
        if !layout.iter().any(|(known, _)| known == field) {
            placed.push((*field, 0));
        }
    }
    // stable, so that fields met at the same position keep their relative order
    placed.sort_by_key(|(_, position)| *position);
    placed
}

fn todo_field(record: &TaskRecord, field: TodoField, dialect: FieldDialect) -> Option<Property<'static>> {
    let fields = &record.fields;
    match field {
        TodoField::Created => fields.created.as_ref().map(|dt| Property::from(Created::new(format_date_time(dt)))),
        TodoField::LastModified => fields.last_modified.as_ref().map(|dt| Property::from(LastModified::new(format_date_time(dt)))),
        TodoField::Summary => record.title.as_ref().map(|title| Property::from(Summary::new(escape_text(title)))),
        TodoField::RelatedTo => record.parent.as_ref().map(|parent| Property::from(RelatedTo::new(escape_text(parent.as_str())))),
        TodoField::Completed => fields.completed.as_ref().map(|dt| Property::from(Completed::new(format_date_time(dt)))),
        TodoField::PercentComplete => fields.percent_complete.map(|percent| Property::from(PercentComplete::new(percent.to_string()))),
        TodoField::SessionTime => fields.session_minutes.map(|minutes| Property::new(dialect.session_time_field(), minutes.to_string())),
        TodoField::TotalTime => fields.total_minutes.map(|minutes| Property::new(dialect.total_time_field(), minutes.to_string())),
        TodoField::Kind => fields.kind.as_field_value().map(|kind| Property::new(dialect.kind_field(), kind)),
    }
}

fn extra_property(property: &ExtraProperty) -> Property<'static> {
    let mut built = Property::new(output_name(&property.name).into_owned(), property.value.clone());
    for (key, value) in &property.params {
        built.add(Parameter::new(key.to_ascii_uppercase(), value.clone()));
    }
    built
}

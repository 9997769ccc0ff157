//! Conversions between flat task records (as stored) and trees of [`Task`]s
//!
//! Storage files list tasks one after the other, each task pointing to its parent with a `RELATED-TO` field.

use std::collections::{HashMap, HashSet};

use crate::error::{KarmError, Result};
use crate::task::{Task, TaskFields, TaskId};

/// One task as it is stored: its own data and a reference to its parent
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskRecord {
    /// Where the record starts in its source (0 when unknown)
    pub line: usize,
    pub id: Option<TaskId>,
    pub title: Option<String>,
    pub parent: Option<TaskId>,
    pub fields: TaskFields,
}

impl TaskRecord {
    pub fn at_line(line: usize) -> Self {
        Self { line, ..Self::default() }
    }
}


/// The outcome of [`build_forest`]
#[derive(Debug, Default)]
pub struct BuiltForest {
    pub roots: Vec<Task>,
    /// Tasks whose parent does not exist.
    /// They are also part of `roots`, and still remember their (dangling) parent id.
    pub orphans: Vec<TaskId>,
}

struct ValidRecord {
    line: usize,
    id: TaskId,
    title: String,
    parent: Option<TaskId>,
    fields: TaskFields,
}

/// Build trees from flat records.
///
/// * A record without id or title, or that is its own parent, is malformed.
/// * Two records with the same id are an error.
/// * A record whose parent cannot be found is an orphan: it becomes a root, and is listed in [`BuiltForest::orphans`].
/// * Records that still cannot be reached from a root (i.e. parent cycles) are malformed.
pub fn build_forest(records: Vec<TaskRecord>) -> Result<BuiltForest> {
    let mut valid = Vec::with_capacity(records.len());
    let mut known_ids = HashSet::new();
    for record in records {
        let record = validate(record)?;
        if !known_ids.insert(record.id.clone()) {
            return Err(KarmError::duplicate(&record.id, record.parent.as_ref()));
        }
        valid.push(record);
    }
    let n_records = valid.len();

    // Group records by parent. Orphans go into the root bucket, as if they had no parent
    let mut orphans = Vec::new();
    let mut by_parent: HashMap<Option<TaskId>, Vec<ValidRecord>> = HashMap::new();
    for record in valid {
        let bucket = match &record.parent {
            Some(parent) if !known_ids.contains(parent) => {
                log::warn!("Task {} (line {}) refers to a missing parent {}. Keeping it as a root task", record.id, record.line, parent);
                orphans.push(record.id.clone());
                None
            },
            other => other.clone(),
        };
        by_parent.entry(bucket).or_default().push(record);
    }

    let mut roots = Vec::new();
    for record in by_parent.remove(&None).unwrap_or_default() {
        roots.push(attach_children(record, &mut by_parent)?);
    }

    let n_attached: usize = roots.iter().map(|root| root.subtree_len()).sum();
    if n_attached != n_records {
        let mut unreachable: Vec<&ValidRecord> = by_parent.values().flatten().collect();
        unreachable.sort_by_key(|r| r.line);
        let line = unreachable.first().map(|r| r.line).unwrap_or(0);
        let ids: Vec<String> = unreachable.iter().map(|r| r.id.to_string()).collect();
        return Err(KarmError::malformed(line, format!("tasks {} have cyclic parent references", ids.join(", "))));
    }

    Ok(BuiltForest { roots, orphans })
}

fn validate(record: TaskRecord) -> Result<ValidRecord> {
    let id = match record.id {
        Some(id) if !id.as_str().trim().is_empty() => id,
        _ => return Err(KarmError::malformed(record.line, "task has no UID")),
    };
    let title = match record.title {
        Some(title) => title,
        None => return Err(KarmError::malformed(record.line, format!("task {} has no SUMMARY", id))),
    };
    if record.parent.as_ref() == Some(&id) {
        return Err(KarmError::malformed(record.line, format!("task {} is its own parent", id)));
    }

    Ok(ValidRecord {
        line: record.line,
        id,
        title,
        parent: record.parent,
        fields: record.fields,
    })
}

fn attach_children(record: ValidRecord, by_parent: &mut HashMap<Option<TaskId>, Vec<ValidRecord>>) -> Result<Task> {
    let mut task = Task::new_with_fields(record.id, record.title, record.fields);
    // Keep a dangling parent reference, so that the link can heal if the parent shows up again
    task.set_parent_id(record.parent);

    let children = by_parent.remove(&Some(task.id().clone())).unwrap_or_default();
    for child in children {
        let child = attach_children(child, by_parent)?;
        task.add(child)?;
    }
    Ok(task)
}


/// Flatten trees into records, every parent being listed before its children.
///
/// Parent references are taken from the position in the tree. Only root tasks keep their own (possibly dangling) parent reference.
pub fn flatten<'a, I: IntoIterator<Item = &'a Task>>(roots: I) -> Vec<TaskRecord> {
    let mut records = Vec::new();
    for root in roots {
        flatten_into(root, root.parent_id().cloned(), &mut records);
    }
    records
}

fn flatten_into(task: &Task, parent: Option<TaskId>, records: &mut Vec<TaskRecord>) {
    records.push(TaskRecord {
        line: 0,
        id: Some(task.id().clone()),
        title: Some(task.title().to_string()),
        parent,
        fields: task.fields().clone(),
    });
    for child in task.children() {
        flatten_into(child, Some(task.id().clone()), records);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    fn record(id: &str, parent: Option<&str>) -> TaskRecord {
        TaskRecord {
            line: 1,
            id: Some(TaskId::from(id)),
            title: Some(format!("task {}", id)),
            parent: parent.map(TaskId::from),
            fields: TaskFields::default(),
        }
    }

    #[test]
    fn children_are_attached_at_every_depth() {
        // Children listed before their parents on purpose
        let records = vec![
            record("entry", Some("item")),
            record("item", Some("list")),
            record("list", Some("project")),
            record("project", None),
            record("other-project", None),
        ];

        let forest = build_forest(records).unwrap();
        assert!(forest.orphans.is_empty());
        assert_eq!(forest.roots.len(), 2);

        let project = forest.roots.iter().find(|t| t.id().as_str() == "project").unwrap();
        assert_eq!(project.subtree_len(), 4);
        let entry = project.find(&"entry".into()).unwrap();
        assert_eq!(entry.parent_id(), Some(&TaskId::from("item")));
    }

    #[test]
    fn orphans_become_roots() {
        let forest = build_forest(vec![
            record("project", None),
            record("lost", Some("deleted-parent")),
            record("lost-child", Some("lost")),
        ]).unwrap();

        assert_eq!(forest.orphans, vec![TaskId::from("lost")]);
        assert_eq!(forest.roots.len(), 2);
        let lost = forest.roots.iter().find(|t| t.id().as_str() == "lost").unwrap();
        assert_eq!(lost.parent_id(), Some(&TaskId::from("deleted-parent")));
        assert!(lost.child(&"lost-child".into()).is_some());
        let project = forest.roots.iter().find(|t| t.id().as_str() == "project").unwrap();
        assert!(!project.contains(&"lost".into()));
    }

    #[test]
    fn malformed_records_are_rejected() {
        let mut no_title = record("a", None);
        no_title.title = None;
        assert!(matches!(build_forest(vec![no_title]), Err(KarmError::MalformedRecord { .. })));

        let mut no_id = record("a", None);
        no_id.id = None;
        assert!(matches!(build_forest(vec![no_id]), Err(KarmError::MalformedRecord { .. })));

        assert!(matches!(build_forest(vec![record("a", Some("a"))]), Err(KarmError::MalformedRecord { .. })));

        let cycle = vec![record("root", None), record("a", Some("b")), record("b", Some("a"))];
        assert!(matches!(build_forest(cycle), Err(KarmError::MalformedRecord { .. })));
    }

    #[test]
    fn duplicated_ids_are_rejected() {
        let records = vec![record("p", None), record("x", Some("p")), record("x", None)];
        assert!(matches!(build_forest(records), Err(KarmError::DuplicateId { .. })));
    }

    #[test]
    fn flatten_lists_parents_first() {
        let mut project = Task::new("p", "Project", TaskKind::Project);
        let list = project.add(Task::new("l", "List", TaskKind::TaskList)).unwrap();
        list.add(Task::new("i", "Item", TaskKind::TaskItem)).unwrap();

        let records = flatten(std::iter::once(&project));
        let ids: Vec<_> = records.iter().map(|r| r.id.clone().unwrap().to_string()).collect();
        assert_eq!(ids, vec!["p", "l", "i"]);
        assert_eq!(records[0].parent, None);
        assert_eq!(records[2].parent, Some(TaskId::from("l")));
    }
}

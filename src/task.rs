//! To-do tasks (iCal `VTODO` item) arranged as a tree

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KarmError, Result};
use crate::ical::{ExtraProperty, TodoField};


/// Identifier of a task. Remote ids are used verbatim, so that a task keeps its id across sync cycles.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}
impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}


/// The role a task plays on the remote side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    Project,
    TaskList,
    TaskItem,
    /// No known remote counterpart, e.g. an item created in KTimeTracker
    Unclassified,
}

impl TaskKind {
    /// The value stored in the kind extension field, if any
    pub fn as_field_value(&self) -> Option<&'static str> {
        match self {
            TaskKind::Project => Some("project"),
            TaskKind::TaskList => Some("todolist"),
            TaskKind::TaskItem => Some("todoitem"),
            TaskKind::Unclassified => None,
        }
    }

    /// Whether this kind mirrors something that exists on the remote side
    pub fn is_remote(&self) -> bool {
        *self != TaskKind::Unclassified
    }
}

impl Default for TaskKind {
    fn default() -> Self {
        TaskKind::Unclassified
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "project" => Ok(TaskKind::Project),
            "todolist" => Ok(TaskKind::TaskList),
            "todoitem" => Ok(TaskKind::TaskItem),
            other => Err(format!("unknown task kind {:?}", other)),
        }
    }
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Project => write!(f, "project"),
            TaskKind::TaskList => write!(f, "task list"),
            TaskKind::TaskItem => write!(f, "task item"),
            TaskKind::Unclassified => write!(f, "unclassified"),
        }
    }
}


/// Everything a task carries apart from its identity and its position in the tree.
///
/// This is shared between a [`Task`] and its flat [`TaskRecord`](crate::tree::TaskRecord) form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFields {
    pub kind: TaskKind,
    /// Minutes logged since the last checkin
    pub session_minutes: Option<i64>,
    /// Minutes logged in total, as known by the remote service (plus the current session)
    pub total_minutes: Option<i64>,

    pub dtstamp: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub percent_complete: Option<u8>,

    /// Properties that are not understood by this crate.
    /// They are written back untouched, in the same order.
    #[serde(skip)]
    pub extra_properties: Vec<ExtraProperty>,
    /// Where the interpreted fields were read: each one comes with the number of extra properties that preceded it.
    /// Fields are written back at the same place, so that a file keeps its field order.
    #[serde(skip)]
    pub layout: Vec<(TodoField, usize)>,
}


/// A project, a task list, a task item or a logged time entry, together with the tasks it contains
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: String,
    /// `None` for root tasks
    parent_id: Option<TaskId>,

    #[serde(flatten)]
    fields: TaskFields,

    children: BTreeMap<TaskId, Task>,
}

impl Task {
    /// Create a brand new task, stamped with the current time
    pub fn new<T: Into<TaskId>, S: Into<String>>(id: T, title: S, kind: TaskKind) -> Self {
        let now = Utc::now().trunc_subsecs(0);
        let fields = TaskFields {
            kind,
            dtstamp: Some(now),
            created: Some(now),
            ..TaskFields::default()
        };
        Self::new_with_fields(id.into(), title.into(), fields)
    }

    /// Create a task from already known fields, e.g. coming from a storage file
    pub fn new_with_fields(id: TaskId, title: String, fields: TaskFields) -> Self {
        Self {
            id,
            title,
            parent_id: None,
            fields,
            children: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &TaskId                 { &self.id }
    pub fn title(&self) -> &str                 { &self.title }
    pub fn parent_id(&self) -> Option<&TaskId>  { self.parent_id.as_ref() }
    pub fn kind(&self) -> TaskKind              { self.fields.kind }
    pub fn fields(&self) -> &TaskFields         { &self.fields }
    pub fn total_minutes(&self) -> Option<i64>  { self.fields.total_minutes }
    pub fn completed(&self) -> Option<&DateTime<Utc>> { self.fields.completed.as_ref() }
    pub fn percent_complete(&self) -> Option<u8>      { self.fields.percent_complete }
    pub fn extra_properties(&self) -> &[ExtraProperty] { &self.fields.extra_properties }

    /// Minutes logged since the last checkin (an absent value counts as zero)
    pub fn session_minutes(&self) -> i64 {
        self.fields.session_minutes.unwrap_or(0)
    }

    /// Minutes that are waiting to be checked in, if any
    pub fn pending_session_minutes(&self) -> Option<i64> {
        match self.fields.session_minutes {
            Some(minutes) if minutes > 0 => Some(minutes),
            _ => None,
        }
    }

    pub fn set_title<S: Into<String>>(&mut self, title: S) {
        self.title = title.into();
        self.touch();
    }

    pub fn set_kind(&mut self, kind: TaskKind) {
        self.fields.kind = kind;
    }

    pub fn set_session_minutes(&mut self, minutes: i64) {
        self.fields.session_minutes = Some(minutes);
    }

    pub fn set_total_minutes(&mut self, minutes: i64) {
        self.fields.total_minutes = Some(minutes);
    }

    fn touch(&mut self) {
        self.fields.last_modified = Some(Utc::now().trunc_subsecs(0));
    }

    /// A task is complete when it has a completion date and is 100% done
    pub fn is_completed(&self) -> bool {
        self.fields.completed.is_some() && self.fields.percent_complete == Some(100)
    }

    pub fn mark_as_complete(&mut self) {
        self.fields.completed = Some(Utc::now().trunc_subsecs(0));
        self.fields.percent_complete = Some(100);
    }

    pub fn mark_as_incomplete(&mut self) {
        self.fields.completed = None;
        self.fields.percent_complete = Some(0);
    }

    /// Give this task a new id. Its direct children are re-pointed to it.
    ///
    /// This does not check the new id is unique, see [`Registry::reidentify`](crate::registry::Registry::reidentify)
    pub fn set_id(&mut self, new_id: TaskId) {
        for child in self.children.values_mut() {
            child.parent_id = Some(new_id.clone());
        }
        self.id = new_id;
    }

    pub(crate) fn set_parent_id(&mut self, parent_id: Option<TaskId>) {
        self.parent_id = parent_id;
    }


    pub fn children(&self) -> impl Iterator<Item = &Task> {
        self.children.values()
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.children.values_mut()
    }

    /// The ids of the direct children. Handy to walk children while mutating them.
    pub fn child_ids(&self) -> Vec<TaskId> {
        self.children.keys().cloned().collect()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child(&self, id: &TaskId) -> Option<&Task> {
        self.children.get(id)
    }

    pub fn child_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.children.get_mut(id)
    }

    /// Add a direct child.
    /// Only siblings are checked for duplicates: global uniqueness is the job of the [`Registry`](crate::registry::Registry)
    pub fn add(&mut self, mut child: Task) -> Result<&mut Task> {
        if self.children.contains_key(&child.id) {
            return Err(KarmError::duplicate(&child.id, Some(&self.id)));
        }
        child.parent_id = Some(self.id.clone());
        let id = child.id.clone();
        Ok(self.children.entry(id).or_insert(child))
    }

    /// Remove a direct child, and return it
    pub fn delete(&mut self, id: &TaskId) -> Result<Task> {
        self.children
            .remove(id)
            .ok_or_else(|| KarmError::not_found(id, Some(&self.id)))
    }

    /// Look for a task with this id in this subtree (including this task itself)
    pub fn find(&self, id: &TaskId) -> Option<&Task> {
        if &self.id == id {
            return Some(self);
        }
        self.children.values().find_map(|child| child.find(id))
    }

    /// Look for a task with this id in this subtree (including this task itself)
    pub fn find_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        if &self.id == id {
            return Some(self);
        }
        self.children.values_mut().find_map(|child| child.find_mut(id))
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.find(id).is_some()
    }

    /// Number of tasks in this subtree, this one included
    pub fn subtree_len(&self) -> usize {
        1 + self.children.values().map(|c| c.subtree_len()).sum::<usize>()
    }

    pub(crate) fn fields_mut(&mut self) -> &mut TaskFields {
        &mut self.fields
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_siblings_with_the_same_id() {
        let mut list = Task::new("10", "Backlog", TaskKind::TaskList);
        list.add(Task::new("11", "Write docs", TaskKind::TaskItem)).unwrap();

        let err = list.add(Task::new("11", "Something else", TaskKind::TaskItem)).unwrap_err();
        assert!(matches!(err, KarmError::DuplicateId { .. }));
        assert_eq!(list.child(&"11".into()).unwrap().title(), "Write docs");
        assert_eq!(list.child(&"11".into()).unwrap().parent_id(), Some(&TaskId::from("10")));
    }

    #[test]
    fn delete_returns_the_removed_subtree() {
        let mut list = Task::new("10", "Backlog", TaskKind::TaskList);
        let item = list.add(Task::new("11", "Write docs", TaskKind::TaskItem)).unwrap();
        item.add(Task::new("12", "first draft", TaskKind::Unclassified)).unwrap();

        let removed = list.delete(&"11".into()).unwrap();
        assert_eq!(removed.subtree_len(), 2);
        assert!(!list.has_children());
        assert!(matches!(list.delete(&"11".into()), Err(KarmError::NotFound { .. })));
    }

    #[test]
    fn completion_needs_both_date_and_percentage() {
        let mut task = Task::new("1", "Some task", TaskKind::TaskItem);
        assert!(!task.is_completed());

        task.fields_mut().percent_complete = Some(100);
        assert!(!task.is_completed());

        task.mark_as_complete();
        assert!(task.is_completed());

        task.fields_mut().percent_complete = Some(90);
        assert!(!task.is_completed());

        task.mark_as_incomplete();
        assert!(!task.is_completed());
        assert_eq!(task.percent_complete(), Some(0));
    }

    #[test]
    fn set_id_repoints_children() {
        let mut item = Task::new("local-1", "New idea", TaskKind::Unclassified);
        item.add(Task::new("local-2", "spent an hour on it", TaskKind::Unclassified)).unwrap();

        item.set_id(TaskId::from("900"));
        let child = item.child(&"local-2".into()).unwrap();
        assert_eq!(child.parent_id(), Some(&TaskId::from("900")));
        assert!(item.contains(&"local-2".into()));
        assert!(item.find(&"900".into()).is_some());
    }

    #[test]
    fn kinds_parse_from_field_values() {
        assert_eq!("todoitem".parse::<TaskKind>(), Ok(TaskKind::TaskItem));
        assert_eq!("TodoList".parse::<TaskKind>(), Ok(TaskKind::TaskList));
        assert!("milestone".parse::<TaskKind>().is_err());
        assert_eq!(TaskKind::Project.as_field_value(), Some("project"));
        assert_eq!(TaskKind::Unclassified.as_field_value(), None);
    }

    #[test]
    fn pending_session_time_ignores_zero_and_negative_values() {
        let mut task = Task::new("1", "Some task", TaskKind::TaskItem);
        assert_eq!(task.pending_session_minutes(), None);
        task.set_session_minutes(-5);
        assert_eq!(task.pending_session_minutes(), None);
        task.set_session_minutes(45);
        assert_eq!(task.pending_session_minutes(), Some(45));
    }
}

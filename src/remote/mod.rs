//! The remote project-management service tasks are synced with
//!
//! [`RemoteService`] is what the sync operations talk to. [`basecamp::BasecampClient`] implements it over HTTP,
//! [`mock::MockRemote`] implements it in memory for tests.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::task::TaskId;

pub mod basecamp;
pub use basecamp::BasecampClient;
pub mod mock;
pub use mock::MockRemote;

/// A remote project
#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    pub id: TaskId,
    pub name: String,
}

/// A remote task list, with the task items it contains
#[derive(Clone, Debug, PartialEq)]
pub struct TaskList {
    pub id: TaskId,
    pub name: String,
    pub project_id: TaskId,
    pub items: Vec<TaskItem>,
}

/// A remote task item
#[derive(Clone, Debug, PartialEq)]
pub struct TaskItem {
    pub id: TaskId,
    pub content: String,
    pub completed: bool,
}

/// Time that has been logged on the remote side
#[derive(Clone, Debug, PartialEq)]
pub struct TimeEntry {
    pub id: TaskId,
    pub hours: f64,
    pub date: Option<NaiveDate>,
    pub person_id: Option<TaskId>,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Person {
    pub id: TaskId,
    pub name: String,
}

/// What a new time entry is logged for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimeEntryTarget {
    Project(TaskId),
    TaskItem(TaskId),
}

/// A time entry that is about to be created
#[derive(Clone, Debug, PartialEq)]
pub struct NewTimeEntry {
    pub target: TimeEntryTarget,
    pub hours: f64,
    pub date: NaiveDate,
    pub person_id: TaskId,
    pub description: String,
}


/// A remote service that stores projects, task lists, task items and time entries
#[async_trait]
pub trait RemoteService {
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Every task list, across every project
    async fn list_task_lists(&self) -> Result<Vec<TaskList>>;

    async fn list_time_entries_for_task(&self, task_id: &TaskId) -> Result<Vec<TimeEntry>>;

    async fn create_time_entry(&mut self, entry: &NewTimeEntry) -> Result<TimeEntry>;

    /// Create a task item in a task list, and return it with its remote id
    async fn create_task_item(&mut self, list_id: &TaskId, content: &str) -> Result<TaskItem>;

    async fn complete_task_item(&mut self, task_id: &TaskId) -> Result<()>;

    /// The person whose credentials are used, if the service tells
    async fn get_authenticated_user(&self) -> Result<Option<Person>>;
}

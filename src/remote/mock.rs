//! An in-memory [`RemoteService`], that records every call it receives.
//!
//! It is used by the integration tests, and can be made to fail with a [`MockBehaviour`].

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{KarmError, Result};
use crate::mock_behaviour::{MockBehaviour, RemoteOperation};
use crate::remote::{NewTimeEntry, Person, Project, RemoteService, TaskItem, TaskList, TimeEntry, TimeEntryTarget};
use crate::task::TaskId;

/// Ids the mock gives to the things it creates start from there
const FIRST_CREATED_ID: u64 = 90_000;

/// A call the mock received (and accepted)
#[derive(Clone, Debug, PartialEq)]
pub enum MockCall {
    ListProjects,
    ListTaskLists,
    ListTimeEntries(TaskId),
    CreateTimeEntry(NewTimeEntry),
    CreateTaskItem { list_id: TaskId, content: String, new_id: TaskId },
    CompleteTaskItem(TaskId),
    GetAuthenticatedUser,
}

#[derive(Debug)]
pub struct MockRemote {
    projects: Vec<Project>,
    task_lists: Vec<TaskList>,
    time_entries: Vec<(TimeEntryTarget, TimeEntry)>,
    person: Option<Person>,
    next_id: u64,

    calls: Mutex<Vec<MockCall>>,
    mock_behaviour: Arc<Mutex<MockBehaviour>>,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemote {
    pub fn new() -> Self {
        Self {
            projects: Vec::new(),
            task_lists: Vec::new(),
            time_entries: Vec::new(),
            person: None,
            next_id: FIRST_CREATED_ID,
            calls: Mutex::new(Vec::new()),
            mock_behaviour: Arc::new(Mutex::new(MockBehaviour::new())),
        }
    }

    pub fn with_person<T: Into<TaskId>>(mut self, id: T, name: &str) -> Self {
        self.person = Some(Person { id: id.into(), name: name.to_string() });
        self
    }

    /// Make this mock fail (or succeed) according to `behaviour`
    pub fn set_mock_behaviour(&mut self, behaviour: Arc<Mutex<MockBehaviour>>) {
        self.mock_behaviour = behaviour;
    }

    pub fn add_project<T: Into<TaskId>>(&mut self, id: T, name: &str) {
        self.projects.push(Project { id: id.into(), name: name.to_string() });
    }

    pub fn add_task_list<T: Into<TaskId>, U: Into<TaskId>>(&mut self, id: T, name: &str, project_id: U) {
        self.task_lists.push(TaskList {
            id: id.into(),
            name: name.to_string(),
            project_id: project_id.into(),
            items: Vec::new(),
        });
    }

    /// Add a task item to an existing task list
    pub fn add_task_item<T: Into<TaskId>>(&mut self, list_id: &TaskId, id: T, content: &str) -> Result<()> {
        let list = self.task_list_mut(list_id)?;
        list.items.push(TaskItem { id: id.into(), content: content.to_string(), completed: false });
        Ok(())
    }

    /// Log some time for a task item, as if someone did it on the remote side
    pub fn add_time_entry(&mut self, task_id: &TaskId, hours: f64) {
        let id = self.new_id();
        self.time_entries.push((
            TimeEntryTarget::TaskItem(task_id.clone()),
            TimeEntry { id, hours, date: None, person_id: None, description: String::new() },
        ));
    }

    pub fn projects_mut(&mut self) -> &mut Vec<Project> {
        &mut self.projects
    }

    pub fn task_lists_mut(&mut self) -> &mut Vec<TaskList> {
        &mut self.task_lists
    }

    pub fn task_item(&self, id: &TaskId) -> Option<&TaskItem> {
        self.task_lists.iter()
            .flat_map(|list| list.items.iter())
            .find(|item| &item.id == id)
    }

    /// Every call this mock accepted so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Only the calls that changed something on the remote side
    pub fn write_calls(&self) -> Vec<MockCall> {
        self.calls().into_iter()
            .filter(|call| matches!(call,
                MockCall::CreateTimeEntry(_) | MockCall::CreateTaskItem { .. } | MockCall::CompleteTaskItem(_)
            ))
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn record(&self, call: MockCall) {
        lock(&self.calls).push(call);
    }

    fn behaviour(&self) -> MutexGuard<'_, MockBehaviour> {
        lock(&self.mock_behaviour)
    }

    fn new_id(&mut self) -> TaskId {
        let id = TaskId::from(self.next_id);
        self.next_id += 1;
        id
    }

    fn task_list_mut(&mut self, list_id: &TaskId) -> Result<&mut TaskList> {
        self.task_lists.iter_mut()
            .find(|list| &list.id == list_id)
            .ok_or_else(|| KarmError::Remote(format!("Unexpected HTTP status code 404 for task list {}", list_id)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RemoteService for MockRemote {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.behaviour().attempt(RemoteOperation::ListProjects)?;
        self.record(MockCall::ListProjects);
        Ok(self.projects.clone())
    }

    async fn list_task_lists(&self) -> Result<Vec<TaskList>> {
        self.behaviour().attempt(RemoteOperation::ListTaskLists)?;
        self.record(MockCall::ListTaskLists);
        Ok(self.task_lists.clone())
    }

    async fn list_time_entries_for_task(&self, task_id: &TaskId) -> Result<Vec<TimeEntry>> {
        self.behaviour().attempt(RemoteOperation::ListTimeEntries)?;
        self.record(MockCall::ListTimeEntries(task_id.clone()));
        let target = TimeEntryTarget::TaskItem(task_id.clone());
        Ok(self.time_entries.iter()
            .filter(|(entry_target, _)| entry_target == &target)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn create_time_entry(&mut self, entry: &NewTimeEntry) -> Result<TimeEntry> {
        self.behaviour().attempt(RemoteOperation::CreateTimeEntry)?;
        self.record(MockCall::CreateTimeEntry(entry.clone()));
        let created = TimeEntry {
            id: self.new_id(),
            hours: entry.hours,
            date: Some(entry.date),
            person_id: Some(entry.person_id.clone()),
            description: entry.description.clone(),
        };
        self.time_entries.push((entry.target.clone(), created.clone()));
        Ok(created)
    }

    async fn create_task_item(&mut self, list_id: &TaskId, content: &str) -> Result<TaskItem> {
        self.behaviour().attempt(RemoteOperation::CreateTaskItem)?;
        let item = TaskItem { id: self.new_id(), content: content.to_string(), completed: false };
        self.task_list_mut(list_id)?.items.push(item.clone());
        self.record(MockCall::CreateTaskItem {
            list_id: list_id.clone(),
            content: content.to_string(),
            new_id: item.id.clone(),
        });
        Ok(item)
    }

    async fn complete_task_item(&mut self, task_id: &TaskId) -> Result<()> {
        self.behaviour().attempt(RemoteOperation::CompleteTaskItem)?;
        let item = self.task_lists.iter_mut()
            .flat_map(|list| list.items.iter_mut())
            .find(|item| &item.id == task_id)
            .ok_or_else(|| KarmError::Remote(format!("Unexpected HTTP status code 404 for task item {}", task_id)))?;
        item.completed = true;
        self.record(MockCall::CompleteTaskItem(task_id.clone()));
        Ok(())
    }

    async fn get_authenticated_user(&self) -> Result<Option<Person>> {
        self.behaviour().attempt(RemoteOperation::GetAuthenticatedUser)?;
        self.record(MockCall::GetAuthenticatedUser);
        Ok(self.person.clone())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let mut mock = MockRemote::new().with_person("42", "John");
        mock.add_project("1", "Project");
        mock.add_task_list("2", "List", "1");
        mock.add_task_item(&"2".into(), "3", "Item").unwrap();
        mock.add_time_entry(&"3".into(), 1.5);

        assert_eq!(mock.list_projects().await.unwrap().len(), 1);
        assert_eq!(mock.list_time_entries_for_task(&"3".into()).await.unwrap()[0].hours, 1.5);

        let created = mock.create_task_item(&"2".into(), "New item").await.unwrap();
        assert_eq!(created.id, TaskId::from(FIRST_CREATED_ID + 1));
        mock.complete_task_item(&created.id).await.unwrap();
        assert!(mock.task_item(&created.id).unwrap().completed);

        let entry = NewTimeEntry {
            target: TimeEntryTarget::Project("1".into()),
            hours: 0.5,
            date: NaiveDate::from_ymd_opt(2009, 2, 14).unwrap(),
            person_id: "42".into(),
            description: String::new(),
        };
        mock.create_time_entry(&entry).await.unwrap();

        assert_eq!(mock.write_calls(), vec![
            MockCall::CreateTaskItem { list_id: "2".into(), content: "New item".into(), new_id: created.id.clone() },
            MockCall::CompleteTaskItem(created.id.clone()),
            MockCall::CreateTimeEntry(entry),
        ]);
        assert!(mock.create_task_item(&"404".into(), "Nowhere").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_can_fail() {
        let behaviour = Arc::new(Mutex::new(MockBehaviour::new().fail_after(RemoteOperation::ListProjects, 1, 1)));
        let mut mock = MockRemote::new();
        mock.set_mock_behaviour(Arc::clone(&behaviour));

        assert!(mock.list_projects().await.is_ok());
        assert!(mock.list_projects().await.is_err());
        assert!(mock.list_projects().await.is_ok());
        assert_eq!(mock.calls(), vec![MockCall::ListProjects, MockCall::ListProjects]);
    }
}

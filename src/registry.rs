//! This module provides the local task tree, backed by a KTimeTracker storage file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{KarmError, Result};
use crate::ical::{self, ExtraProperty, FieldDialect};
use crate::task::{Task, TaskId};
use crate::tree::{self, TaskRecord};
use crate::utils::keys_are_the_same;


/// The forest of tasks of a storage file.
///
/// Task ids are unique across the whole forest, not only among siblings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Registry {
    backing_file: Option<PathBuf>,

    dialect: FieldDialect,
    prod_id: Option<String>,
    calendar_properties: Vec<ExtraProperty>,

    roots: BTreeMap<TaskId, Task>,
    orphans: Vec<TaskId>,
}

impl Registry {
    /// An empty registry, that is not bound to any file yet
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty registry, that will be saved to `path`
    pub fn with_backing_file(path: &Path) -> Self {
        Self {
            backing_file: Some(PathBuf::from(path)),
            ..Self::default()
        }
    }

    /// Initialize a registry from the content of a storage file.
    /// Returns an error if the file cannot be read or is invalid
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut registry = Self::with_backing_file(path);
        registry.load(path)?;
        Ok(registry)
    }

    /// Replace the whole content of this registry with the content of a storage file.
    /// The registry is unchanged in case of error
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            std::io::Error::new(err.kind(), format!("Unable to open file {:?}: {}", path, err))
        })?;
        let loaded = Self::from_ical(&content)?;
        log::debug!("Loaded {} tasks from {:?}", loaded.len(), path);

        let backing_file = Some(PathBuf::from(path));
        *self = Self { backing_file, ..loaded };
        Ok(())
    }

    /// Build a registry from the content of a storage file
    pub fn from_ical(content: &str) -> Result<Self> {
        let parsed = ical::parse(content)?;
        let mut registry = Self {
            dialect: parsed.dialect,
            prod_id: parsed.prod_id,
            calendar_properties: parsed.calendar_properties,
            ..Self::default()
        };
        registry.replace_with_records(parsed.records)?;
        Ok(registry)
    }

    fn replace_with_records(&mut self, records: Vec<TaskRecord>) -> Result<()> {
        let forest = tree::build_forest(records)?;
        let mut roots = BTreeMap::new();
        for root in forest.roots {
            roots.insert(root.id().clone(), root);
        }
        self.roots = roots;
        self.orphans = forest.orphans;
        Ok(())
    }

    /// The content of the storage file for the current tasks
    pub fn to_ical(&self) -> String {
        let prod_id = self.prod_id.clone().unwrap_or_else(ical::default_prod_id);
        ical::build_from(&self.records(), &prod_id, &self.calendar_properties, self.dialect)
    }

    /// Every task as a flat record, parents first
    pub fn records(&self) -> Vec<TaskRecord> {
        tree::flatten(self.roots.values())
    }

    /// Store the current tasks to the backing file
    pub fn save(&self) -> Result<()> {
        match &self.backing_file {
            Some(path) => self.write_to(path),
            None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "this registry has no backing file").into()),
        }
    }

    /// Store the current tasks to another file, which becomes the backing file
    pub fn save_to_file(&mut self, path: &Path) -> Result<()> {
        self.write_to(path)?;
        self.backing_file = Some(PathBuf::from(path));
        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ical()).map_err(|err| {
            std::io::Error::new(err.kind(), format!("Unable to save file {:?}: {}", path, err))
        })?;
        log::debug!("Saved {} tasks to {:?}", self.len(), path);
        Ok(())
    }

    pub fn backing_file(&self) -> Option<&Path> {
        self.backing_file.as_deref()
    }

    pub fn dialect(&self) -> FieldDialect {
        self.dialect
    }

    /// Tasks that referred to a missing parent when this registry was loaded. They are kept as root tasks.
    pub fn orphans(&self) -> &[TaskId] {
        &self.orphans
    }


    /// Add a root task
    pub fn add(&mut self, task: Task) -> Result<&mut Task> {
        self.check_unique(&task, None)?;
        let id = task.id().clone();
        Ok(self.roots.entry(id).or_insert(task))
    }

    /// Add a task below another one, that can be anywhere in the tree
    pub fn add_child(&mut self, parent_id: &TaskId, task: Task) -> Result<&mut Task> {
        self.check_unique(&task, Some(parent_id))?;
        let parent = self.get_mut(parent_id).ok_or_else(|| KarmError::not_found(parent_id, None))?;
        parent.add(task)
    }

    /// The whole subtree of `task` must be new to this registry
    fn check_unique(&self, task: &Task, parent_id: Option<&TaskId>) -> Result<()> {
        let mut stack = vec![task];
        while let Some(current) = stack.pop() {
            if self.contains(current.id()) {
                return Err(KarmError::duplicate(current.id(), parent_id));
            }
            stack.extend(current.children());
        }
        Ok(())
    }

    /// Remove a root task (and its subtree), and return it
    pub fn delete(&mut self, id: &TaskId) -> Result<Task> {
        self.roots.remove(id).ok_or_else(|| KarmError::not_found(id, None))
    }

    /// Change the id of a task, wherever it is in the tree
    pub fn reidentify(&mut self, old_id: &TaskId, new_id: TaskId) -> Result<()> {
        if old_id == &new_id {
            return Ok(());
        }
        if self.contains(&new_id) {
            return Err(KarmError::duplicate(&new_id, None));
        }

        let parent_id = self.get(old_id)
            .ok_or_else(|| KarmError::not_found(old_id, None))?
            .parent_id()
            .cloned();
        match parent_id.filter(|p| !self.roots.contains_key(old_id) && self.contains(p)) {
            Some(parent_id) => {
                let parent = self.get_mut(&parent_id).ok_or_else(|| KarmError::not_found(&parent_id, None))?;
                let mut task = parent.delete(old_id)?;
                task.set_id(new_id);
                parent.add(task)?;
            },
            None => {
                let mut task = self.delete(old_id)?;
                task.set_id(new_id.clone());
                self.roots.insert(new_id, task);
            },
        }
        Ok(())
    }

    /// Look for a task anywhere in the tree
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        if let Some(root) = self.roots.get(id) {
            return Some(root);
        }
        self.roots.values().find_map(|root| root.find(id))
    }

    /// Look for a task anywhere in the tree
    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        if self.roots.contains_key(id) {
            return self.roots.get_mut(id);
        }
        self.roots.values_mut().find_map(|root| root.find_mut(id))
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.get(id).is_some()
    }

    pub fn root(&self, id: &TaskId) -> Option<&Task> {
        self.roots.get(id)
    }

    pub fn root_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.roots.get_mut(id)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Task> {
        self.roots.values()
    }

    pub fn root_ids(&self) -> Vec<TaskId> {
        self.roots.keys().cloned().collect()
    }

    /// Number of tasks, at any depth
    pub fn len(&self) -> usize {
        self.roots.values().map(|root| root.subtree_len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }


    /// Compares two registries to check they have the same current content
    ///
    /// This is not a complete equality test: the backing files and the calendar-level properties may differ
    pub fn has_same_contents_as(&self, other: &Self) -> bool {
        same_tasks(&self.roots, &other.roots)
    }
}

fn same_tasks(left: &BTreeMap<TaskId, Task>, right: &BTreeMap<TaskId, Task>) -> bool {
    if !keys_are_the_same(left, right) {
        return false;
    }
    left.iter().all(|(id, task_l)| match right.get(id) {
        None => false,
        Some(task_r) => same_task(task_l, task_r),
    })
}

/// Timestamps that only track when a record was written (DTSTAMP, CREATED, LAST-MODIFIED) are not compared
fn same_task(left: &Task, right: &Task) -> bool {
    let (l, r) = (left.fields(), right.fields());
    let same = left.title() == right.title()
        && left.parent_id() == right.parent_id()
        && l.kind == r.kind
        && l.session_minutes == r.session_minutes
        && l.total_minutes == r.total_minutes
        && l.completed == r.completed
        && l.percent_complete == r.percent_complete
        && l.extra_properties == r.extra_properties;
    if !same {
        log::debug!("Tasks {} and {} mismatch", left.id(), right.id());
        return false;
    }

    left.child_ids() == right.child_ids()
        && left.children().zip(right.children()).all(|(cl, cr)| same_task(cl, cr))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    fn sample() -> Registry {
        let mut registry = Registry::new();
        let project = registry.add(Task::new("1", "Project", TaskKind::Project)).unwrap();
        let list = project.add(Task::new("2", "List", TaskKind::TaskList)).unwrap();
        list.add(Task::new("3", "Item", TaskKind::TaskItem)).unwrap();
        registry
    }

    #[test]
    fn ids_are_unique_across_the_whole_tree() {
        let mut registry = sample();
        let before = registry.clone();

        let err = registry.add(Task::new("3", "Clashing root", TaskKind::Project)).unwrap_err();
        assert!(matches!(err, KarmError::DuplicateId { .. }));
        assert_eq!(registry, before);

        let err = registry.add_child(&"1".into(), Task::new("3", "Clashing list", TaskKind::TaskList)).unwrap_err();
        assert!(matches!(err, KarmError::DuplicateId { .. }));
        assert_eq!(registry, before);

        let mut subtree = Task::new("10", "New root", TaskKind::Project);
        subtree.add(Task::new("2", "Clashing child", TaskKind::TaskList)).unwrap();
        assert!(matches!(registry.add(subtree), Err(KarmError::DuplicateId { .. })));
        assert_eq!(registry, before);
    }

    #[test]
    fn lookup_and_delete() {
        let mut registry = sample();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(&"3".into()).unwrap().title(), "Item");
        assert!(registry.root(&"3".into()).is_none());

        // Only root tasks can be deleted from the registry itself
        assert!(matches!(registry.delete(&"2".into()), Err(KarmError::NotFound { .. })));
        registry.delete(&"1".into()).unwrap();
        assert!(registry.is_empty());
        assert!(!registry.contains(&"3".into()));
    }

    #[test]
    fn add_child_needs_an_existing_parent() {
        let mut registry = sample();
        let err = registry.add_child(&"404".into(), Task::new("4", "Item", TaskKind::TaskItem)).unwrap_err();
        assert!(matches!(err, KarmError::NotFound { .. }));

        registry.add_child(&"2".into(), Task::new("4", "Item", TaskKind::TaskItem)).unwrap();
        assert_eq!(registry.get(&"4".into()).unwrap().parent_id(), Some(&TaskId::from("2")));
    }

    #[test]
    fn reidentify_nested_and_root_tasks() {
        let mut registry = sample();
        registry.add_child(&"3".into(), Task::new("local", "a note", TaskKind::Unclassified)).unwrap();

        registry.reidentify(&"3".into(), "33".into()).unwrap();
        let item = registry.get(&"33".into()).unwrap();
        assert_eq!(item.parent_id(), Some(&TaskId::from("2")));
        assert_eq!(item.child(&"local".into()).unwrap().parent_id(), Some(&TaskId::from("33")));
        assert!(!registry.contains(&"3".into()));

        registry.reidentify(&"1".into(), "11".into()).unwrap();
        assert!(registry.root(&"11".into()).is_some());

        assert!(matches!(registry.reidentify(&"33".into(), "2".into()), Err(KarmError::DuplicateId { .. })));
        assert!(matches!(registry.reidentify(&"404".into(), "405".into()), Err(KarmError::NotFound { .. })));
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("karm.ics");

        let mut registry = sample();
        registry.save_to_file(&path).unwrap();
        assert_eq!(registry.backing_file(), Some(path.as_path()));

        let retrieved = Registry::from_file(&path).unwrap();
        assert!(registry.has_same_contents_as(&retrieved));
        assert_eq!(retrieved.len(), 3);
    }
}

//! Remote services and storage files the sync tests start from

use std::path::{Path, PathBuf};

use karm_sync::remote::MockRemote;
use karm_sync::task::{Task, TaskId, TaskKind};
use karm_sync::Registry;

/// A Basecamp account with:
/// * an active project (100) with a task list (110) of two task items (111 and 112)
/// * a project without task list (200)
///
/// Task item 111 has 1h45 of time entries, 112 has 20 minutes.
pub fn standard_remote() -> MockRemote {
    let mut remote = MockRemote::new().with_person("42", "John Doe");
    remote.add_project("100", "Website");
    remote.add_project("200", "Internal");
    remote.add_task_list("110", "Phase 1", "100");
    remote.add_task_item(&TaskId::from("110"), "111", "Write the specs").unwrap();
    remote.add_task_item(&TaskId::from("110"), "112", "Design").unwrap();

    remote.add_time_entry(&TaskId::from("111"), 1.25);
    remote.add_time_entry(&TaskId::from("111"), 0.5);
    remote.add_time_entry(&TaskId::from("112"), 1.0 / 3.0);
    remote
}

/// The local tree a checkin starts from, that matches [`standard_remote`]:
///
/// ```text
/// Website [100]                     session 45
///     Phase 1 [110]
///         Write the specs [111]     session 30
///             call with client      session 15, complete
///             next call             session 0
///         Design [112]              complete
///         New stuff [local-1]       session 10, only known locally
///     meeting                       session 60, project-level time entry
/// Personal notes                    session 20, not a project
/// ```
pub fn checkin_registry() -> Registry {
    let mut registry = Registry::new();

    let project = registry.add(Task::new("100", "Website", TaskKind::Project)).unwrap();
    project.set_session_minutes(45);

    let list = project.add(Task::new("110", "Phase 1", TaskKind::TaskList)).unwrap();

    let specs = list.add(Task::new("111", "Write the specs", TaskKind::TaskItem)).unwrap();
    specs.set_session_minutes(30);
    let call = specs.add(Task::new("call", "call with client", TaskKind::Unclassified)).unwrap();
    call.set_session_minutes(15);
    call.mark_as_complete();
    specs.add(Task::new("next-call", "next call", TaskKind::Unclassified)).unwrap();

    let design = list.add(Task::new("112", "Design", TaskKind::TaskItem)).unwrap();
    design.mark_as_complete();

    let new_stuff = list.add(Task::new("local-1", "New stuff", TaskKind::Unclassified)).unwrap();
    new_stuff.set_session_minutes(10);

    let meeting = project.add(Task::new("meeting", "meeting", TaskKind::Unclassified)).unwrap();
    meeting.set_session_minutes(60);

    let notes = registry.add(Task::new("notes", "Personal notes", TaskKind::Unclassified)).unwrap();
    notes.set_session_minutes(20);

    registry
}

/// Where tests write their storage file
pub fn storage_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("karm.ics")
}

/// Save `registry` as the storage file at `path`
pub fn write_storage(registry: &Registry, path: &Path) {
    let mut registry = registry.clone();
    registry.save_to_file(path).unwrap();
}

pub fn read_storage(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

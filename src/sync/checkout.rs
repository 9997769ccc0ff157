use std::collections::HashSet;

use crate::error::Result;
use crate::registry::Registry;
use crate::remote::RemoteService;
use crate::sync::{FetchOptions, SyncProgress, SyncReport, Synchronizer};
use crate::task::{Task, TaskKind};

impl<R: RemoteService> Synchronizer<R> {
    /// Build a new tree that mirrors the remote projects, task lists and task items.
    ///
    /// With [`FetchOptions::REMOTE_TIME`], the total time of each task item is the sum of its remote time entries.
    /// Otherwise, it is left unset.
    pub async fn checkout(&self, options: FetchOptions) -> Result<(Registry, SyncReport)> {
        let mut progress = SyncProgress::new();
        progress.info("Starting a checkout.");

        let (projects, task_lists) = self.fetch_projects_and_lists(options, &mut progress).await?;
        let mut registry = Registry::new();

        for project in &projects {
            registry.add(Task::new(project.id.clone(), project.name.as_str(), TaskKind::Project))?;
            progress.added(&format!("Added project <{}> [{}]", project.name, project.id));
        }
        let known_projects: HashSet<_> = projects.iter().map(|p| p.id.clone()).collect();

        for list in &task_lists {
            if !known_projects.contains(&list.project_id) {
                progress.warn(&format!("Task list <{}> [{}] belongs to an unknown project [{}], skipping it", list.name, list.id, list.project_id));
                continue;
            }
            registry.add_child(&list.project_id, Task::new(list.id.clone(), list.name.as_str(), TaskKind::TaskList))?;
            progress.added(&format!("    Added task list <{}> [{}]", list.name, list.id));

            for item in &list.items {
                let mut task = Task::new(item.id.clone(), item.content.as_str(), TaskKind::TaskItem);
                if options.contains(FetchOptions::REMOTE_TIME) {
                    task.set_total_minutes(self.remote_minutes(&item.id).await?);
                }
                registry.add_child(&list.id, task)?;
                progress.added(&format!("        Added task item <{}> [{}]", item.content, item.id));
            }
        }

        progress.info(&format!("Checkout ended, {} tasks", registry.len()));
        let mut report = progress.into_report();
        report.changed = true;
        Ok((registry, report))
    }
}

use std::collections::HashSet;

use crate::error::Result;
use crate::registry::Registry;
use crate::remote::RemoteService;
use crate::sync::{task, task_mut, FetchOptions, SyncProgress, SyncReport, Synchronizer};
use crate::task::{Task, TaskId, TaskKind};

impl<R: RemoteService> Synchronizer<R> {
    /// Merge what exists remotely into `registry`.
    ///
    /// Remote additions are added, remote renames are applied. Nothing is ever deleted: local tasks that
    /// have no remote counterpart anymore are only listed in [`SyncReport::stale`].
    ///
    /// With [`FetchOptions::REMOTE_TIME`], the total time of a task item becomes the sum of its remote time entries
    /// plus its session time that has not been checked in yet.
    ///
    /// `registry` is left untouched in case of error.
    pub async fn update(&self, registry: &mut Registry, options: FetchOptions) -> Result<SyncReport> {
        let mut progress = SyncProgress::new();
        progress.info("Starting an update.");

        let (projects, task_lists) = self.fetch_projects_and_lists(options, &mut progress).await?;
        let mut working = registry.clone();

        for project in &projects {
            merge_task(&mut working, None, &project.id, &project.name, TaskKind::Project, &mut progress)?;
        }

        for list in &task_lists {
            if !working.contains(&list.project_id) {
                progress.warn(&format!("Task list <{}> [{}] belongs to an unknown project [{}], skipping it", list.name, list.id, list.project_id));
                continue;
            }
            merge_task(&mut working, Some(&list.project_id), &list.id, &list.name, TaskKind::TaskList, &mut progress)?;

            for item in &list.items {
                let is_new = merge_task(&mut working, Some(&list.id), &item.id, &item.content, TaskKind::TaskItem, &mut progress)?;

                if options.contains(FetchOptions::REMOTE_TIME) {
                    let remote_minutes = self.remote_minutes(&item.id).await?;
                    let local = task_mut(&mut working, &item.id)?;
                    let total = remote_minutes + local.session_minutes();
                    if local.total_minutes() != Some(total) {
                        local.set_total_minutes(total);
                        if is_new {
                            progress.touched();
                        } else {
                            progress.updated(&format!("Updated total time of task item [{}] to {} minutes", item.id, total));
                        }
                    }
                }
            }
        }

        let remote_ids: HashSet<&TaskId> = projects.iter().map(|p| &p.id)
            .chain(task_lists.iter().map(|l| &l.id))
            .chain(task_lists.iter().flat_map(|l| l.items.iter().map(|i| &i.id)))
            .collect();
        // Inactive projects are filtered out on purpose, they cannot be told apart from deleted ones
        let check_projects = !options.contains(FetchOptions::ACTIVE_PROJECTS);
        report_stale(&working, &remote_ids, check_projects, &mut progress);

        let report = progress.into_report();
        log_summary(&report);
        *registry = working;
        Ok(report)
    }
}

/// Add a remote entity to the local tree, or rename its local counterpart. Returns whether it has been added
fn merge_task(
    registry: &mut Registry,
    parent_id: Option<&TaskId>,
    id: &TaskId,
    title: &str,
    kind: TaskKind,
    progress: &mut SyncProgress,
) -> Result<bool> {
    if registry.contains(id) {
        let local = task_mut(registry, id)?;
        if local.title() != title {
            local.set_title(title);
            progress.updated(&format!("Updated {} [{}]: <{}>", kind, id, title));
        }
        return Ok(false);
    }

    let new_task = Task::new(id.clone(), title, kind);
    match parent_id {
        None => registry.add(new_task)?,
        Some(parent_id) => registry.add_child(parent_id, new_task)?,
    };
    let parent_title = parent_id.and_then(|p| task(registry, p).ok()).map(|p| p.title().to_string());
    match parent_title {
        Some(parent_title) => progress.added(&format!("Added {} <{}> [{}] to <{}>", kind, title, id, parent_title)),
        None => progress.added(&format!("Added {} <{}> [{}]", kind, title, id)),
    }
    Ok(true)
}

fn report_stale(registry: &Registry, remote_ids: &HashSet<&TaskId>, check_projects: bool, progress: &mut SyncProgress) {
    let mut stack: Vec<&Task> = registry.roots().collect();
    while let Some(current) = stack.pop() {
        let checked = match current.kind() {
            TaskKind::Project => check_projects,
            TaskKind::TaskList | TaskKind::TaskItem => true,
            TaskKind::Unclassified => false,
        };
        if checked && !remote_ids.contains(current.id()) {
            progress.stale(current.id(), &format!("{} <{}> [{}] does not exist remotely anymore. Keeping it", current.kind(), current.title(), current.id()));
        }
        stack.extend(current.children());
    }
}

fn log_summary(report: &SyncReport) {
    if report.changed {
        log::info!("Update ended: {}", report);
    } else {
        log::info!("Update ended, nothing has changed");
    }
}

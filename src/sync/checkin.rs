use chrono::{Local, NaiveDate};

use crate::error::{KarmError, Result};
use crate::prompt::Prompter;
use crate::registry::Registry;
use crate::remote::{NewTimeEntry, RemoteService, TimeEntryTarget};
use crate::sync::{task, task_mut, SyncProgress, SyncReport, Synchronizer};
use crate::task::{TaskId, TaskKind};
use crate::utils::{hours_from_minutes, pretty_time};

/// Everything a time entry needs, apart from what it is for
struct EntryContext<'a> {
    date: NaiveDate,
    person_id: &'a TaskId,
}

impl<R: RemoteService> Synchronizer<R> {
    /// Send the session time of every task to the remote service, then remove the tasks that are done.
    ///
    /// * the session time of projects and task items is sent as a time entry, with a description the user is prompted for
    /// * tasks below a task item are time entries on their own: their session time is sent with their title as a description, and they are removed once complete
    /// * other tasks right below a project are sent as time entries of that project, with their title as a description
    /// * task items that only exist locally are created remotely first
    /// * complete task items are marked as complete remotely, then removed. Complete task lists and projects are removed once they are empty
    ///
    /// Time entries are dated `date`, or today if there is none.
    /// `registry` is left untouched in case of error. Note that whatever has been sent to the remote service before the error stays there,
    /// and would be sent again by the next checkin.
    pub async fn checkin<P: Prompter>(&mut self, registry: &mut Registry, date: Option<NaiveDate>, prompter: &mut P) -> Result<SyncReport> {
        let mut progress = SyncProgress::new();
        progress.info("Starting a checkin.");

        let person = self.remote.get_authenticated_user().await?
            .ok_or_else(|| KarmError::Authentication("Could not retrieve logged in person".to_string()))?;
        progress.debug(&format!("Logged in as {} [{}]", person.name, person.id));
        let context = EntryContext {
            date: date.unwrap_or_else(|| Local::now().date_naive()),
            person_id: &person.id,
        };

        let mut working = registry.clone();
        for project_id in working.root_ids() {
            if task(&working, &project_id)?.kind() != TaskKind::Project {
                continue;
            }
            self.checkin_project(&mut working, &project_id, &context, prompter, &mut progress).await?;
        }

        let report = progress.into_report();
        if report.changed {
            log::info!("Checkin ended: {}", report);
        } else {
            log::info!("Checkin ended, nothing has changed");
        }
        *registry = working;
        Ok(report)
    }

    async fn checkin_project<P: Prompter>(
        &mut self,
        registry: &mut Registry,
        project_id: &TaskId,
        context: &EntryContext<'_>,
        prompter: &mut P,
        progress: &mut SyncProgress,
    ) -> Result<()> {
        let project = task(registry, project_id)?;
        progress.debug(&format!("Processing project <{}> [{}]", project.title(), project_id));

        if let Some(minutes) = project.pending_session_minutes() {
            let description = prompter.ask(&format!(
                "    Please, enter time entry ({}) description for project (<Enter> to skip comment): ",
                pretty_time(minutes)
            ));
            self.submit(TimeEntryTarget::Project(project_id.clone()), minutes, description, context, progress).await?;
            task_mut(registry, project_id)?.set_session_minutes(0);
            progress.touched();
        }

        for child_id in task(registry, project_id)?.child_ids() {
            let child = task(registry, &child_id)?;
            if child.kind() == TaskKind::TaskList {
                for item_id in child.child_ids() {
                    self.checkin_task_item(registry, &child_id, item_id, context, prompter, progress).await?;
                }
            } else if let Some(minutes) = child.pending_session_minutes() {
                // Something that is not a task list, right below a project: this is logged time for the project
                let description = Some(child.title().to_string());
                self.submit(TimeEntryTarget::Project(project_id.clone()), minutes, description, context, progress).await?;
                task_mut(registry, &child_id)?.set_session_minutes(0);
                progress.touched();
            }

            let child = task(registry, &child_id)?;
            if child.is_completed() && !child.has_children() {
                task_mut(registry, project_id)?.delete(&child_id)?;
                progress.deleted(&format!("    Deleted list [{}]", child_id));
            }
        }

        let project = task(registry, project_id)?;
        if project.is_completed() && !project.has_children() {
            registry.delete(project_id)?;
            progress.deleted(&format!("    Deleted project [{}]", project_id));
        }
        Ok(())
    }

    async fn checkin_task_item<P: Prompter>(
        &mut self,
        registry: &mut Registry,
        list_id: &TaskId,
        item_id: TaskId,
        context: &EntryContext<'_>,
        prompter: &mut P,
        progress: &mut SyncProgress,
    ) -> Result<()> {
        let mut item_id = item_id;
        let item = task(registry, &item_id)?;

        if item.kind() != TaskKind::TaskItem {
            let title = item.title().to_string();
            let created = self.remote.create_task_item(list_id, &title).await?;
            registry.reidentify(&item_id, created.id.clone())?;
            progress.remote_created(&format!("    Created task item <{}> [{}] (was [{}])", title, created.id, item_id));
            item_id = created.id;
            task_mut(registry, &item_id)?.set_kind(TaskKind::TaskItem);
            progress.touched();
        }

        let item = task(registry, &item_id)?;
        if let Some(minutes) = item.pending_session_minutes() {
            let description = prompter.ask(&format!(
                "    Please, enter time entry ({}) description for todo item <{}> (<Enter> to skip comment): ",
                pretty_time(minutes), item.title()
            ));
            self.submit(TimeEntryTarget::TaskItem(item_id.clone()), minutes, description, context, progress).await?;
            task_mut(registry, &item_id)?.set_session_minutes(0);
            progress.touched();
        }

        // Tasks below a task item are time entries on their own
        for entry_id in task(registry, &item_id)?.child_ids() {
            let entry = task(registry, &entry_id)?;
            if let Some(minutes) = entry.pending_session_minutes() {
                let description = Some(entry.title().to_string());
                self.submit(TimeEntryTarget::TaskItem(item_id.clone()), minutes, description, context, progress).await?;
                task_mut(registry, &entry_id)?.set_session_minutes(0);
                progress.touched();
            }

            if task(registry, &entry_id)?.is_completed() {
                task_mut(registry, &item_id)?.delete(&entry_id)?;
                progress.deleted(&format!("    Deleted time entry [{}] of task item [{}]", entry_id, item_id));
            }
        }

        let item = task(registry, &item_id)?;
        if item.is_completed() && !item.has_children() {
            self.remote.complete_task_item(&item_id).await?;
            progress.remote_completed(&format!("    Checked as done task item [{}]", item_id));
            task_mut(registry, list_id)?.delete(&item_id)?;
            progress.deleted(&format!("    Deleted task item [{}]", item_id));
        }
        Ok(())
    }

    async fn submit(
        &mut self,
        target: TimeEntryTarget,
        minutes: i64,
        description: Option<String>,
        context: &EntryContext<'_>,
        progress: &mut SyncProgress,
    ) -> Result<()> {
        let entry = NewTimeEntry {
            target,
            hours: hours_from_minutes(minutes),
            date: context.date,
            person_id: context.person_id.clone(),
            description: description.unwrap_or_default(),
        };
        self.remote.create_time_entry(&entry).await?;
        progress.time_entry_submitted(&format!("    Added time {:?}: {:.2} hours ({})", entry.target, entry.hours, pretty_time(minutes)));
        Ok(())
    }
}

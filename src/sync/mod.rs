//! This module syncs a storage file with a remote service
//!
//! There are three operations:
//! * [`Synchronizer::checkout`] builds a brand new tree from what exists remotely
//! * [`Synchronizer::update`] merges remote additions and renames into an existing tree
//! * [`Synchronizer::checkin`] sends the time logged locally to the remote service, then prunes what is done
//!
//! Each operation works on a copy of the local tree, that replaces the original one only when the whole pass succeeded.
//! The `*_file` variants load and save the storage file around them, so that a failed sync never leaves a partially synced file.

use std::path::Path;

use bitflags::bitflags;
use chrono::NaiveDate;

use crate::error::{KarmError, Result};
use crate::prompt::Prompter;
use crate::registry::Registry;
use crate::remote::{Project, RemoteService, TaskList};
use crate::task::{Task, TaskId};
use crate::utils::normalize_line_breaks;

mod checkin;
mod checkout;
mod update;
pub mod progress;
pub use progress::{SyncProgress, SyncReport};

bitflags! {
    /// What to fetch from the remote service, for checkouts and updates
    pub struct FetchOptions: u8 {
        /// Only keep projects that own at least one task list
        const ACTIVE_PROJECTS = 0b01;
        /// Compute the total time of task items from their remote time entries
        const REMOTE_TIME = 0b10;
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions::empty()
    }
}


/// Syncs local task trees with a [`RemoteService`]
#[derive(Debug)]
pub struct Synchronizer<R: RemoteService> {
    remote: R,
}

impl<R: RemoteService> Synchronizer<R> {
    pub fn new(remote: R) -> Self {
        Self { remote }
    }

    /// Apart from tests, there are very few reasons to access the remote service directly
    pub fn remote(&self) -> &R { &self.remote }
    pub fn remote_mut(&mut self) -> &mut R { &mut self.remote }
    pub fn into_remote(self) -> R { self.remote }

    /// Checkout the remote projects into `path`. Any previous content of this file is discarded.
    pub async fn checkout_to_file(&self, path: &Path, options: FetchOptions) -> Result<SyncReport> {
        let (mut registry, report) = self.checkout(options).await?;
        registry.save_to_file(path)?;
        log::info!("Checked out {} tasks into {:?}", registry.len(), path);
        Ok(report)
    }

    /// Merge the remote changes into the storage file at `path`. The file is written only if something changed.
    pub async fn update_file(&self, path: &Path, options: FetchOptions) -> Result<SyncReport> {
        let mut registry = Registry::from_file(path)?;
        let report = self.update(&mut registry, options).await?;
        save_if_changed(&registry, &report, path)?;
        Ok(report)
    }

    /// Checkin the time logged in the storage file at `path`. The file is written only if something changed.
    pub async fn checkin_file<P: Prompter>(&mut self, path: &Path, date: Option<NaiveDate>, prompter: &mut P) -> Result<SyncReport> {
        let mut registry = Registry::from_file(path)?;
        let report = self.checkin(&mut registry, date, prompter).await?;
        save_if_changed(&registry, &report, path)?;
        Ok(report)
    }

    /// Remote projects and task lists, with the active project filter applied
    async fn fetch_projects_and_lists(&self, options: FetchOptions, progress: &mut SyncProgress) -> Result<(Vec<Project>, Vec<TaskList>)> {
        let mut projects = self.remote.list_projects().await?;
        let mut task_lists = self.remote.list_task_lists().await?;

        // Titles are compared with what is read back from the storage file
        for project in projects.iter_mut() {
            project.name = normalize_line_breaks(&project.name);
        }
        for list in task_lists.iter_mut() {
            list.name = normalize_line_breaks(&list.name);
            for item in list.items.iter_mut() {
                item.content = normalize_line_breaks(&item.content);
            }
        }
        progress.debug(&format!("Fetched {} projects and {} task lists", projects.len(), task_lists.len()));

        if options.contains(FetchOptions::ACTIVE_PROJECTS) {
            projects.retain(|project| task_lists.iter().any(|list| list.project_id == project.id));
            progress.debug(&format!("{} projects are active", projects.len()));
        }
        Ok((projects, task_lists))
    }

    /// Sum of the remote time entries of a task item, in minutes
    async fn remote_minutes(&self, task_id: &TaskId) -> Result<i64> {
        let entries = self.remote.list_time_entries_for_task(task_id).await?;
        let hours: f64 = entries.iter().map(|entry| entry.hours).sum();
        Ok(crate::utils::minutes_from_hours(hours))
    }
}

fn save_if_changed(registry: &Registry, report: &SyncReport, path: &Path) -> Result<()> {
    if report.changed {
        registry.save()?;
        log::info!("{:?} updated: {}", path, report);
    } else {
        log::info!("Nothing has changed in {:?}", path);
    }
    Ok(())
}

fn task_mut<'a>(registry: &'a mut Registry, id: &TaskId) -> Result<&'a mut Task> {
    registry.get_mut(id).ok_or_else(|| KarmError::not_found(id, None))
}

fn task<'a>(registry: &'a Registry, id: &TaskId) -> Result<&'a Task> {
    registry.get(id).ok_or_else(|| KarmError::not_found(id, None))
}

//! Utilities to track the progression of a sync

use std::fmt::{Display, Formatter};

use crate::task::TaskId;

/// What a sync operation did
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncReport {
    /// Whether the local tree has been modified (and needs to be saved)
    pub changed: bool,

    pub added: usize,
    pub updated: usize,
    pub deleted: usize,

    /// Time entries that have been created on the remote side
    pub time_entries: usize,
    /// Task items that have been created on the remote side
    pub remote_created: usize,
    /// Task items that have been marked as complete on the remote side
    pub remote_completed: usize,

    /// Local tasks that mirror remote entities that do not exist anymore. They are kept.
    pub stale: Vec<TaskId>,
    pub warnings: usize,
}

impl Display for SyncReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} added, {} updated, {} deleted locally; {} time entries submitted, {} task items created and {} completed remotely",
            self.added, self.updated, self.deleted,
            self.time_entries, self.remote_created, self.remote_completed)?;
        if !self.stale.is_empty() {
            write!(f, "; {} tasks do not exist remotely anymore", self.stale.len())?;
        }
        Ok(())
    }
}


/// A structure that logs what happens during a sync, and counts the changes
#[derive(Debug, Default)]
pub struct SyncProgress {
    report: SyncReport,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> &SyncReport {
        &self.report
    }

    /// Finish tracking, and tell what happened
    pub fn into_report(mut self) -> SyncReport {
        let n_changes = self.report.added + self.report.updated + self.report.deleted;
        if n_changes > 0 {
            self.report.changed = true;
        }
        self.report
    }

    /// Something changed locally that is not an addition, an update or a deletion (e.g. a session time reset)
    pub fn touched(&mut self) {
        self.report.changed = true;
    }

    pub fn added(&mut self, text: &str) {
        self.report.added += 1;
        self.debug(text);
    }
    pub fn updated(&mut self, text: &str) {
        self.report.updated += 1;
        self.debug(text);
    }
    pub fn deleted(&mut self, text: &str) {
        self.report.deleted += 1;
        self.debug(text);
    }
    pub fn time_entry_submitted(&mut self, text: &str) {
        self.report.time_entries += 1;
        self.debug(text);
    }
    pub fn remote_created(&mut self, text: &str) {
        self.report.remote_created += 1;
        self.debug(text);
    }
    pub fn remote_completed(&mut self, text: &str) {
        self.report.remote_completed += 1;
        self.debug(text);
    }
    pub fn stale(&mut self, id: &TaskId, text: &str) {
        self.report.stale.push(id.clone());
        self.info(text);
    }

    /// Log a warning
    pub fn warn(&mut self, text: &str) {
        log::warn!("{}", text);
        self.report.warnings += 1;
    }
    /// Log an info
    pub fn info(&mut self, text: &str) {
        log::info!("{}", text);
    }
    /// Log a debug message
    pub fn debug(&mut self, text: &str) {
        log::debug!("{}", text);
    }
}

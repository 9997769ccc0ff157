//! Errors that can abort a sync command

use thiserror::Error;

use crate::task::TaskId;

/// Every failure this crate can report.
///
/// None of them are recovered from: the running command stops and the storage file is left as it was.
#[derive(Error, Debug)]
pub enum KarmError {
    /// A task with this id already exists somewhere in the tree
    #[error("there already exists a task with id \"{id}\"{}", in_parent(.parent))]
    DuplicateId { id: TaskId, parent: Option<TaskId> },

    /// No task with this id where it was looked for
    #[error("task with id \"{id}\" not found{}", in_parent(.parent))]
    NotFound { id: TaskId, parent: Option<TaskId> },

    /// A stored or fetched record misses mandatory data
    #[error("malformed record (line {line}): {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// The remote service did not accept our credentials, or could not tell who we are
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Invalid or missing command-line parameters
    #[error("{0}")]
    ArgumentValidation(String),

    /// The remote service answered with an error or with data we cannot read
    #[error("remote service error: {0}")]
    Remote(String),

    #[error("unable to reach the remote service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn in_parent(parent: &Option<TaskId>) -> String {
    match parent {
        Some(parent) => format!(" in task \"{}\"", parent),
        None => String::from(" among root tasks"),
    }
}

impl KarmError {
    pub(crate) fn duplicate(id: &TaskId, parent: Option<&TaskId>) -> Self {
        Self::DuplicateId { id: id.clone(), parent: parent.cloned() }
    }

    pub(crate) fn not_found(id: &TaskId, parent: Option<&TaskId>) -> Self {
        Self::NotFound { id: id.clone(), parent: parent.cloned() }
    }

    pub(crate) fn malformed<S: Into<String>>(line: usize, reason: S) -> Self {
        Self::MalformedRecord { line, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, KarmError>;

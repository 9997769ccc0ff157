//! This crate syncs KTimeTracker (formerly KArm) task storage files with a Basecamp account.
//!
//! A storage file is an iCalendar file, where every task is a `VTODO` that points to its parent task.
//! The [`registry`] module loads such a file into a tree of [`Task`]s, and saves it back without losing
//! the fields it does not know about.
//!
//! Projects, task lists and task items come from a [`RemoteService`](remote::RemoteService), usually a
//! [`BasecampClient`](remote::BasecampClient). A [`Synchronizer`](sync::Synchronizer) then either
//! * checks out the remote projects into a new tree,
//! * updates an existing tree with the remote changes,
//! * or checks in the time logged locally as remote time entries.

pub mod error;
pub use error::{KarmError, Result};

pub mod task;
pub use task::{Task, TaskId, TaskKind};
pub mod tree;
pub mod ical;
pub mod registry;
pub use registry::Registry;

pub mod remote;
pub mod mock_behaviour;
pub mod sync;
pub use sync::Synchronizer;
pub mod prompt;

pub mod settings;
pub mod resource;
pub mod config;
pub mod utils;

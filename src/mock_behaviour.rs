//! Scripted failures for the mocked remote service

use std::collections::BTreeMap;

use crate::error::{KarmError, Result};

/// The operations of a [`RemoteService`](crate::remote::RemoteService) that can be scripted to fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RemoteOperation {
    ListProjects,
    ListTaskLists,
    ListTimeEntries,
    CreateTimeEntry,
    CreateTaskItem,
    CompleteTaskItem,
    GetAuthenticatedUser,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Outcomes {
    successes: u32,
    failures: u32,
}

/// How a mocked remote service answers during a given test.
///
/// Every operation succeeds, unless it has been scripted with [`MockBehaviour::fail_after`].
#[derive(Clone, Debug, Default)]
pub struct MockBehaviour {
    scripts: BTreeMap<RemoteOperation, Outcomes>,
}

impl MockBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    /// `operation` will succeed `successes` times, then fail `failures` times, then succeed again
    pub fn fail_after(mut self, operation: RemoteOperation, successes: u32, failures: u32) -> Self {
        self.script(operation, successes, failures);
        self
    }

    /// Replace the script of an operation, e.g. in the middle of a test
    pub fn script(&mut self, operation: RemoteOperation, successes: u32, failures: u32) {
        self.scripts.insert(operation, Outcomes { successes, failures });
    }

    /// Failures that are still to come for `operation`
    pub fn pending_failures(&self, operation: RemoteOperation) -> u32 {
        self.scripts.get(&operation).map_or(0, |outcomes| outcomes.failures)
    }

    /// Consume one outcome of the script of `operation`
    pub fn attempt(&mut self, operation: RemoteOperation) -> Result<()> {
        let outcomes = match self.scripts.get_mut(&operation) {
            None => return Ok(()),
            Some(outcomes) => outcomes,
        };

        if outcomes.successes > 0 {
            outcomes.successes -= 1;
            Ok(())
        } else if outcomes.failures > 0 {
            outcomes.failures -= 1;
            log::debug!("Mocked {:?} fails ({} more failures to come)", operation, outcomes.failures);
            Err(KarmError::Remote(format!("mocked failure of {:?}", operation)))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_scripted_failures() {
        let mut behaviour = MockBehaviour::new()
            .fail_after(RemoteOperation::CreateTimeEntry, 1, 2);

        for _ in 0..3 {
            assert!(behaviour.attempt(RemoteOperation::ListProjects).is_ok());
        }
        assert!(behaviour.attempt(RemoteOperation::CreateTimeEntry).is_ok());
        assert!(matches!(behaviour.attempt(RemoteOperation::CreateTimeEntry), Err(KarmError::Remote(_))));
        assert_eq!(behaviour.pending_failures(RemoteOperation::CreateTimeEntry), 1);
        assert!(behaviour.attempt(RemoteOperation::CreateTimeEntry).is_err());
        assert!(behaviour.attempt(RemoteOperation::CreateTimeEntry).is_ok());

        behaviour.script(RemoteOperation::ListProjects, 0, 1);
        assert!(behaviour.attempt(RemoteOperation::ListProjects).is_err());
        assert!(behaviour.attempt(RemoteOperation::ListProjects).is_ok());
    }
}

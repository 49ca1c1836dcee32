//! Structured error types for the deployment worker.
//!
//! The boundary rule mirrors the rest of our services: structured,
//! pattern-matchable enums at the seams callers observe, `anyhow::Error` as
//! internal transport for backend failures (storage drivers, the client
//! database). Admission rejection is *expected contention*, not a failure,
//! and gets its own variant so callers can match on it.

use thiserror::Error;

/// Errors from the migration metadata store.
///
/// The distinction matters:
/// - [`PersistenceError::PendingExists`] is the store enforcing the
///   one-pending-migration invariant; expected under concurrent scheduling.
/// - [`PersistenceError::Backend`] is a system-level storage failure.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A migration with status `Pending` already exists for the project.
    #[error("a pending migration already exists for project {project_id}")]
    PendingExists { project_id: String },

    /// Storage backend failed (connection, timeout, serialization).
    #[error("migration store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Errors returned to callers of `Schedule`.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Another migration is already pending or being applied for the project.
    ///
    /// The worker stays available; retry once the current deployment reaches
    /// a terminal status.
    #[error("a deployment is already in progress for project {project_id}")]
    DeploymentInProgress { project_id: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The worker's mailbox is gone (shut down or crashed).
    #[error("deployment worker for project {project_id} is not running")]
    WorkerStopped { project_id: String },
}

/// Fatal worker initialization failures. The worker shuts down on any of
/// these; a supervisor decides whether to restart it.
#[derive(Debug, Error)]
pub enum InitError {
    /// The project has no migrations at all. Projects must be bootstrapped
    /// by an external provisioner before a worker is started.
    #[error("project {project_id} has no migrations; bootstrap it before starting a worker")]
    MissingBaseline { project_id: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Errors from applying or reverse-applying one step.
#[derive(Debug, Error)]
pub enum StepApplyError {
    /// The client database rejected the mutation. During forward execution
    /// this flips the engine into rollback mode; during rollback it is
    /// swallowed (logged) and rollback proceeds.
    #[error("step `{step}` failed against the client database: {source}")]
    Failed {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    /// The mapper produced a forward mutation without a rollback counterpart.
    /// A programming error in the mapper, distinct from a runtime rollback
    /// failure; never swallowed.
    #[error("step `{step}` has no rollback mutation")]
    MissingRollbackMutation { step: String },
}

impl StepApplyError {
    pub fn is_missing_rollback(&self) -> bool {
        matches!(self, StepApplyError::MissingRollbackMutation { .. })
    }
}

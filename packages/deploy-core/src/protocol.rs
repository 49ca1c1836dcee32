//! Messages flowing through a deployment worker's mailbox.
//!
//! The worker is a single-consumer FIFO: callers and the worker's own async
//! continuations post messages onto the same queue. Follow-ups (`Deploy`,
//! `Resume`, `Ready`) are posted back rather than invoked inline so that
//! admission of new `Schedule`s interleaves correctly with engine completion.

use tokio::sync::oneshot;

use crate::error::{InitError, ScheduleError};
use crate::migration::{Migration, MigrationStep};
use crate::schema::Schema;

/// A `Schedule` submission with its one-shot reply channel.
#[derive(Debug)]
pub struct ScheduleRequest {
    pub next_schema: Schema,
    pub steps: Vec<MigrationStep>,
    pub reply: oneshot::Sender<Result<Migration, ScheduleError>>,
}

/// What initialization learned about the project.
#[derive(Debug, Clone)]
pub struct InitState {
    /// Schema of the highest-revision migration.
    pub active_schema: Schema,
    /// Whether a `Pending` migration was found and a `Deploy` should follow.
    pub has_pending: bool,
}

/// Mailbox protocol of the deployment worker.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Submit a new migration for admission.
    Schedule(ScheduleRequest),

    /// Apply the pending migration, if any. Idempotent; also accepted as an
    /// external kick.
    Deploy,

    /// Initialization finished; carries the loaded state or the fatal error.
    Ready(Result<InitState, InitError>),

    /// An async continuation finished; leave `Busy` and drain the stash.
    /// Carries the new active schema when a migration just succeeded.
    Resume { new_active_schema: Option<Schema> },
}

impl WorkerMessage {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerMessage::Schedule(_) => "schedule",
            WorkerMessage::Deploy => "deploy",
            WorkerMessage::Ready(_) => "ready",
            WorkerMessage::Resume { .. } => "resume",
        }
    }
}

//! # deploy-core
//!
//! The per-project schema deployment worker: serializes, applies, and (on
//! failure) rolls back schema migrations for one logical project against the
//! relational database backing that project's data.
//!
//! ## Architecture
//!
//! ```text
//! caller ── schedule() ──► WorkerHandle
//!                              │
//!                              ▼ mailbox (FIFO)
//!                       DeploymentWorker          Initializing → Ready ⇄ Busy
//!                              │
//!                              ▼ Deploy
//!                       MigrationEngine           forward / rollback loop
//!                              │
//!                              ▼ one step at a time
//!                         StepApplier ──► MigrationStepMapper (pure)
//!                              │
//!                              ▼ one payload at a time
//!                        ClientDatabase           project's SQL backend
//!
//!                  MigrationPersistence           durable (projectId, migration)
//! ```
//!
//! ## Key invariants
//!
//! 1. **At most one pending** migration per project, enforced by the worker's
//!    admission check and by the store itself.
//! 2. **The active schema is monotone**: it advances only when a migration
//!    reaches `Success`, and to exactly that migration's schema.
//! 3. **Forward steps run in order; rollback runs in exact reverse** of the
//!    order in which steps were (attempted to be) applied.
//! 4. **Reverse-step failures are swallowed**; rollback always runs to the
//!    end, and a dirty rollback is recorded as `RollbackFailure`.
//! 5. **All engine outcomes are observable through persisted status only**:
//!    after `schedule` returns, callers poll the store for the terminal
//!    status.
//!
//! Workers for different projects are fully independent; a supervisor spawns
//! one worker per project and owns restart and retry policy.

mod applier;
mod config;
mod database;
mod engine;
mod error;
mod mapper;
mod migration;
mod persistence;
mod postgres;
mod progress;
mod protocol;
mod schema;
mod worker;

// Re-export the worker surface
pub use config::{DeployConfig, WorkerConfig};
pub use worker::{DeploymentWorker, WorkerHandle};

// Re-export protocol messages
pub use protocol::{InitState, ScheduleRequest, WorkerMessage};

// Re-export engine types
pub use engine::{MigrationApplierResult, MigrationEngine};

// Re-export step application
pub use applier::{SqlStepApplier, StepApplier};
pub use mapper::{ClientSqlMutaction, MigrationStepMapper, PostgresStepMapper, SqlStatements};

// Re-export the data model
pub use migration::{Migration, MigrationStatus, MigrationStep};
pub use progress::MigrationProgress;
pub use schema::{Field, FieldType, Model, Schema};

// Re-export error types
pub use error::{InitError, PersistenceError, ScheduleError, StepApplyError};

// Re-export persistence and database seams
pub use database::{ClientDatabase, PostgresClientDatabase};
pub use persistence::MigrationPersistence;
pub use postgres::PostgresMigrationPersistence;

// Re-export testing doubles (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub use database::testing::RecordingDatabase;
#[cfg(any(test, feature = "testing"))]
pub use persistence::testing::InMemoryMigrationPersistence;

// Re-export commonly used external types
pub use async_trait::async_trait;

//! Forward/rollback execution of one migration.
//!
//! The engine drives a [`MigrationProgress`] value through forward mode and,
//! on the first step failure, rollback mode. Each iteration strictly shrinks
//! either the pending or the applied sequence, so a run issues at most
//! `2 * |steps|` step operations. The engine writes the terminal status to
//! persistence itself; the worker only advances its cached schema afterwards.
//!
//! # Failure rules
//!
//! - A forward failure counts the failing step as applied: the applier must
//!   keep forward mutations best-effort reversible, and the reverse of the
//!   failing step runs first during rollback.
//! - Reverse-step failures are swallowed (logged) and rollback proceeds; any
//!   swallowed failure makes the final status `RollbackFailure`.
//! - A missing rollback mutation is a mapper bug: rollback stops there and
//!   the migration is failed with `RollbackFailure`.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::applier::StepApplier;
use crate::error::PersistenceError;
use crate::migration::{Migration, MigrationStatus};
use crate::persistence::MigrationPersistence;
use crate::progress::MigrationProgress;
use crate::schema::Schema;

/// Outcome of one engine run, from the caller's perspective.
///
/// A rollback run reports `succeeded: false` even when every reverse step ran
/// cleanly: the migration did not take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationApplierResult {
    pub succeeded: bool,
}

/// Orchestrates one migration run against the client database.
pub struct MigrationEngine {
    applier: Arc<dyn StepApplier>,
    persistence: Arc<dyn MigrationPersistence>,
}

impl MigrationEngine {
    pub fn new(applier: Arc<dyn StepApplier>, persistence: Arc<dyn MigrationPersistence>) -> Self {
        Self {
            applier,
            persistence,
        }
    }

    /// Apply `migration` on top of `previous_schema`.
    ///
    /// Step operations are totally ordered: the engine issues at most one
    /// mutation to the client database at a time. The returned error is
    /// always a persistence failure while writing the terminal status; in
    /// that case the migration is left `Pending` for a supervisor to retry.
    pub async fn apply(
        &self,
        previous_schema: &Schema,
        migration: &Migration,
    ) -> Result<MigrationApplierResult, PersistenceError> {
        let mut progress = MigrationProgress::new(migration.steps.clone());
        let mut rollback_dirty = false;

        info!(
            project_id = %migration.project_id,
            revision = migration.revision,
            steps = migration.steps.len(),
            "applying migration"
        );

        loop {
            if !progress.is_rolling_back {
                let Some((step, next)) = progress.pop_pending() else {
                    self.persistence
                        .update_migration_status(migration, MigrationStatus::Success)
                        .await?;
                    info!(
                        project_id = %migration.project_id,
                        revision = migration.revision,
                        "migration succeeded"
                    );
                    return Ok(MigrationApplierResult { succeeded: true });
                };

                match self
                    .applier
                    .apply_step(previous_schema, &migration.schema, &step)
                    .await
                {
                    Ok(()) => {
                        debug!(step = %step.describe(), "step applied");
                        progress = next;
                    }
                    Err(e) => {
                        warn!(
                            project_id = %migration.project_id,
                            revision = migration.revision,
                            step = %step.describe(),
                            error = %e,
                            "step failed, rolling back"
                        );
                        // The failing step counts as applied so its reverse
                        // runs first.
                        progress = next.mark_for_rollback();
                    }
                }
            } else {
                let Some((step, next)) = progress.pop_applied() else {
                    let status = if rollback_dirty {
                        MigrationStatus::RollbackFailure
                    } else {
                        MigrationStatus::RollbackSuccess
                    };
                    self.persistence
                        .update_migration_status(migration, status)
                        .await?;
                    info!(
                        project_id = %migration.project_id,
                        revision = migration.revision,
                        status = %status,
                        "rollback finished"
                    );
                    return Ok(MigrationApplierResult { succeeded: false });
                };

                match self
                    .applier
                    .unapply_step(previous_schema, &migration.schema, &step)
                    .await
                {
                    Ok(()) => {
                        debug!(step = %step.describe(), "step reversed");
                        progress = next;
                    }
                    Err(e) if e.is_missing_rollback() => {
                        error!(
                            project_id = %migration.project_id,
                            revision = migration.revision,
                            step = %step.describe(),
                            "mapper produced no rollback mutation, aborting rollback"
                        );
                        self.persistence
                            .update_migration_status(migration, MigrationStatus::RollbackFailure)
                            .await?;
                        return Ok(MigrationApplierResult { succeeded: false });
                    }
                    Err(e) => {
                        warn!(
                            project_id = %migration.project_id,
                            revision = migration.revision,
                            step = %step.describe(),
                            error = %e,
                            "reverse step failed, continuing rollback"
                        );
                        rollback_dirty = true;
                        progress = next;
                    }
                }
            }
        }
    }
}

//! Step application against the client database.
//!
//! One step at a time: map it, and if the mapper produced a mutation, submit
//! the matching payload (forward or reverse) to the client database as one
//! unit. Steps the mapper declines are no-ops in both directions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::database::ClientDatabase;
use crate::error::StepApplyError;
use crate::mapper::MigrationStepMapper;
use crate::migration::MigrationStep;
use crate::schema::Schema;

/// Applies (and reverse-applies) single migration steps.
#[async_trait]
pub trait StepApplier: Send + Sync + 'static {
    /// Run the step's forward mutation, if any.
    async fn apply_step(
        &self,
        prev: &Schema,
        next: &Schema,
        step: &MigrationStep,
    ) -> Result<(), StepApplyError>;

    /// Run the step's reverse mutation, if any.
    ///
    /// Fails with [`StepApplyError::MissingRollbackMutation`] when a forward
    /// mutation exists but carries no rollback payload.
    async fn unapply_step(
        &self,
        prev: &Schema,
        next: &Schema,
        step: &MigrationStep,
    ) -> Result<(), StepApplyError>;
}

/// The shipped applier: a step mapper plus a client database.
pub struct SqlStepApplier {
    mapper: Arc<dyn MigrationStepMapper>,
    database: Arc<dyn ClientDatabase>,
}

impl SqlStepApplier {
    pub fn new(mapper: Arc<dyn MigrationStepMapper>, database: Arc<dyn ClientDatabase>) -> Self {
        Self { mapper, database }
    }
}

#[async_trait]
impl StepApplier for SqlStepApplier {
    async fn apply_step(
        &self,
        prev: &Schema,
        next: &Schema,
        step: &MigrationStep,
    ) -> Result<(), StepApplyError> {
        let Some(mutaction) = self.mapper.mutaction_for(prev, next, step) else {
            debug!(step = %step.describe(), "step has no database effect");
            return Ok(());
        };

        self.database
            .run(mutaction.execute())
            .await
            .map_err(|source| StepApplyError::Failed {
                step: step.describe(),
                source,
            })
    }

    async fn unapply_step(
        &self,
        prev: &Schema,
        next: &Schema,
        step: &MigrationStep,
    ) -> Result<(), StepApplyError> {
        let Some(mutaction) = self.mapper.mutaction_for(prev, next, step) else {
            debug!(step = %step.describe(), "step has no database effect to reverse");
            return Ok(());
        };

        let rollback = mutaction
            .rollback()
            .ok_or_else(|| StepApplyError::MissingRollbackMutation {
                step: step.describe(),
            })?;

        self.database
            .run(rollback)
            .await
            .map_err(|source| StepApplyError::Failed {
                step: step.describe(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::RecordingDatabase;
    use crate::mapper::{ClientSqlMutaction, PostgresStepMapper, SqlStatements};
    use crate::schema::Schema;

    fn applier_with(db: Arc<RecordingDatabase>) -> SqlStepApplier {
        SqlStepApplier::new(Arc::new(PostgresStepMapper::new()), db)
    }

    #[tokio::test]
    async fn test_apply_step_submits_forward_payload() {
        let db = Arc::new(RecordingDatabase::new());
        let applier = applier_with(db.clone());
        let step = MigrationStep::CreateModel {
            model: "user".into(),
        };

        applier
            .apply_step(&Schema::empty(), &Schema::empty(), &step)
            .await
            .unwrap();

        assert_eq!(db.executed(), vec!["CREATE TABLE \"user\" ()".to_string()]);
    }

    #[tokio::test]
    async fn test_unapply_step_submits_rollback_payload() {
        let db = Arc::new(RecordingDatabase::new());
        let applier = applier_with(db.clone());
        let step = MigrationStep::CreateModel {
            model: "user".into(),
        };

        applier
            .unapply_step(&Schema::empty(), &Schema::empty(), &step)
            .await
            .unwrap();

        assert_eq!(db.executed(), vec!["DROP TABLE \"user\"".to_string()]);
    }

    #[tokio::test]
    async fn test_no_op_step_touches_nothing() {
        let db = Arc::new(RecordingDatabase::new());
        let applier = applier_with(db.clone());
        // Deleting a field neither schema knows maps to no mutation.
        let step = MigrationStep::DeleteField {
            model: "user".into(),
            field: "ghost".into(),
        };

        applier
            .apply_step(&Schema::empty(), &Schema::empty(), &step)
            .await
            .unwrap();
        applier
            .unapply_step(&Schema::empty(), &Schema::empty(), &step)
            .await
            .unwrap();

        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_missing_rollback_is_fatal() {
        struct ForwardOnlyMapper;
        impl MigrationStepMapper for ForwardOnlyMapper {
            fn mutaction_for(
                &self,
                _prev: &Schema,
                _next: &Schema,
                _step: &MigrationStep,
            ) -> Option<ClientSqlMutaction> {
                Some(ClientSqlMutaction::new(
                    SqlStatements::one("CREATE TABLE \"x\" ()"),
                    None,
                ))
            }
        }

        let db = Arc::new(RecordingDatabase::new());
        let applier = SqlStepApplier::new(Arc::new(ForwardOnlyMapper), db.clone());
        let step = MigrationStep::CreateModel { model: "x".into() };

        let err = applier
            .unapply_step(&Schema::empty(), &Schema::empty(), &step)
            .await
            .unwrap_err();
        assert!(err.is_missing_rollback());
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_database_failure_maps_to_step_apply_error() {
        let db = Arc::new(RecordingDatabase::new());
        db.fail_on("\"user\"");
        let applier = applier_with(db);
        let step = MigrationStep::CreateModel {
            model: "user".into(),
        };

        let err = applier
            .apply_step(&Schema::empty(), &Schema::empty(), &step)
            .await
            .unwrap_err();
        match err {
            StepApplyError::Failed { step, .. } => assert_eq!(step, "create model user"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

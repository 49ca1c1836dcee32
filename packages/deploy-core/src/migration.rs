//! Migration records and their lifecycle.
//!
//! A [`Migration`] is the durable unit of deployment: the target schema, the
//! ordered steps that get a project there, and a status that only ever moves
//! `Pending -> {Success, RollbackSuccess, RollbackFailure}`. A project has a
//! monotonically increasing revision sequence of migrations, and at most one
//! of them is `Pending` at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{Field, Schema};

/// One atomic logical change within a migration.
///
/// Order within `Migration::steps` is significant: forward execution walks
/// the sequence front to back, rollback walks the applied prefix back to
/// front. A step may have no database effect at all (the mapper returns no
/// mutation for it); such steps still count as applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MigrationStep {
    CreateModel { model: String },
    DeleteModel { model: String },
    CreateField { model: String, field: Field },
    DeleteField { model: String, field: String },
}

impl MigrationStep {
    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            MigrationStep::CreateModel { model } => format!("create model {}", model),
            MigrationStep::DeleteModel { model } => format!("delete model {}", model),
            MigrationStep::CreateField { model, field } => {
                format!("create field {}.{}", model, field.name)
            }
            MigrationStep::DeleteField { model, field } => {
                format!("delete field {}.{}", model, field)
            }
        }
    }
}

/// Lifecycle status of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Admitted and persisted, not yet (fully) applied.
    Pending,
    /// All steps applied; the project's active schema advanced.
    Success,
    /// Forward execution failed and every reverse step ran cleanly.
    RollbackSuccess,
    /// Forward execution failed and rollback was incomplete or dirty.
    RollbackFailure,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::RollbackSuccess => "rollback_success",
            Self::RollbackFailure => "rollback_failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "rollback_success" => Some(Self::RollbackSuccess),
            "rollback_failure" => Some(Self::RollbackFailure),
            _ => None,
        }
    }

    /// Everything except `Pending` is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted migration for one project.
///
/// Created by the worker on `Schedule` admission; mutated only through
/// `MigrationPersistence::update_migration_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    pub project_id: String,
    /// Assigned by persistence on create; strictly increasing per project.
    pub revision: i64,
    /// The schema this migration moves the project to.
    pub schema: Schema,
    pub steps: Vec<MigrationStep>,
    pub status: MigrationStatus,
    pub created_at: DateTime<Utc>,
    /// Set when the status moves to a terminal value.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Migration {
    /// A not-yet-persisted migration (revision 0, assigned on create).
    pub fn new(project_id: impl Into<String>, schema: Schema, steps: Vec<MigrationStep>) -> Self {
        Self {
            project_id: project_id.into(),
            revision: 0,
            schema,
            steps,
            status: MigrationStatus::Pending,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MigrationStatus::Pending
    }
}

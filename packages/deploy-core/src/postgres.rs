//! Postgres-backed migration store.
//!
//! Migrations live in one table keyed by `(project_id, revision)`:
//!
//! ```sql
//! CREATE TABLE project_migrations (
//!     project_id  TEXT NOT NULL,
//!     revision    BIGINT NOT NULL,
//!     schema      JSONB NOT NULL,
//!     steps       JSONB NOT NULL,
//!     status      TEXT NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     finished_at TIMESTAMPTZ,
//!     PRIMARY KEY (project_id, revision)
//! );
//! CREATE UNIQUE INDEX project_migrations_one_pending
//!     ON project_migrations (project_id) WHERE status = 'pending';
//! ```
//!
//! The partial unique index is the store-side enforcement of the
//! one-pending-migration invariant; the worker's admission check only makes
//! rejection cheap and ordered.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::error::PersistenceError;
use crate::migration::{Migration, MigrationStatus};
use crate::persistence::MigrationPersistence;

const SETUP_SQL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS project_migrations (
        project_id  TEXT NOT NULL,
        revision    BIGINT NOT NULL,
        schema      JSONB NOT NULL,
        steps       JSONB NOT NULL,
        status      TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        finished_at TIMESTAMPTZ,
        PRIMARY KEY (project_id, revision)
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS project_migrations_one_pending
        ON project_migrations (project_id) WHERE status = 'pending'
    "#,
];

/// Unique-violation SQLSTATE, raised by the partial index on concurrent creates.
const UNIQUE_VIOLATION: &str = "23505";

/// Migration store over a Postgres pool.
pub struct PostgresMigrationPersistence {
    pool: PgPool,
}

impl PostgresMigrationPersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the backing table and index if missing.
    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        for statement in SETUP_SQL {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| PersistenceError::Backend(e.into()))?;
        }
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct MigrationRow {
    project_id: String,
    revision: i64,
    schema: serde_json::Value,
    steps: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<MigrationRow> for Migration {
    type Error = anyhow::Error;

    fn try_from(row: MigrationRow) -> Result<Self, Self::Error> {
        let status = MigrationStatus::parse(&row.status)
            .ok_or_else(|| anyhow!("unknown migration status `{}`", row.status))?;
        Ok(Migration {
            project_id: row.project_id,
            revision: row.revision,
            schema: serde_json::from_value(row.schema).context("malformed schema column")?,
            steps: serde_json::from_value(row.steps).context("malformed steps column")?,
            status,
            created_at: row.created_at,
            finished_at: row.finished_at,
        })
    }
}

#[async_trait]
impl MigrationPersistence for PostgresMigrationPersistence {
    async fn get_last_migration(
        &self,
        project_id: &str,
    ) -> Result<Option<Migration>, PersistenceError> {
        let row = sqlx::query_as::<_, MigrationRow>(
            r#"
            SELECT * FROM project_migrations
            WHERE project_id = $1
            ORDER BY revision DESC
            LIMIT 1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::Backend(e.into()))?;

        row.map(Migration::try_from)
            .transpose()
            .map_err(PersistenceError::Backend)
    }

    async fn get_next_migration(
        &self,
        project_id: &str,
    ) -> Result<Option<Migration>, PersistenceError> {
        let row = sqlx::query_as::<_, MigrationRow>(
            r#"
            SELECT * FROM project_migrations
            WHERE project_id = $1 AND status = 'pending'
            LIMIT 1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::Backend(e.into()))?;

        row.map(Migration::try_from)
            .transpose()
            .map_err(PersistenceError::Backend)
    }

    async fn create(&self, migration: Migration) -> Result<Migration, PersistenceError> {
        let schema = serde_json::to_value(&migration.schema)
            .map_err(|e| PersistenceError::Backend(e.into()))?;
        let steps = serde_json::to_value(&migration.steps)
            .map_err(|e| PersistenceError::Backend(e.into()))?;

        let row = sqlx::query_as::<_, MigrationRow>(
            r#"
            INSERT INTO project_migrations (project_id, revision, schema, steps, status)
            SELECT $1, COALESCE(MAX(revision), 0) + 1, $2, $3, 'pending'
            FROM project_migrations
            WHERE project_id = $1
            RETURNING *
            "#,
        )
        .bind(&migration.project_id)
        .bind(schema)
        .bind(steps)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                    return PersistenceError::PendingExists {
                        project_id: migration.project_id.clone(),
                    };
                }
            }
            PersistenceError::Backend(e.into())
        })?;

        Migration::try_from(row).map_err(PersistenceError::Backend)
    }

    async fn update_migration_status(
        &self,
        migration: &Migration,
        status: MigrationStatus,
    ) -> Result<(), PersistenceError> {
        // The status guard keeps equal transitions idempotent: re-applying
        // the same terminal status does not bump finished_at.
        sqlx::query(
            r#"
            UPDATE project_migrations
            SET status = $3,
                finished_at = CASE WHEN $3 = 'pending' THEN NULL ELSE NOW() END
            WHERE project_id = $1 AND revision = $2 AND status <> $3
            "#,
        )
        .bind(&migration.project_id)
        .bind(migration.revision)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Backend(e.into()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::MigrationStep;
    use crate::schema::Schema;

    #[test]
    fn test_row_conversion_round_trips() {
        let schema = Schema::empty();
        let steps = vec![MigrationStep::CreateModel {
            model: "user".into(),
        }];
        let row = MigrationRow {
            project_id: "p".into(),
            revision: 3,
            schema: serde_json::to_value(&schema).unwrap(),
            steps: serde_json::to_value(&steps).unwrap(),
            status: "rollback_success".into(),
            created_at: Utc::now(),
            finished_at: Some(Utc::now()),
        };

        let migration = Migration::try_from(row).unwrap();
        assert_eq!(migration.revision, 3);
        assert_eq!(migration.schema, schema);
        assert_eq!(migration.steps, steps);
        assert_eq!(migration.status, MigrationStatus::RollbackSuccess);
    }

    #[test]
    fn test_row_conversion_rejects_unknown_status() {
        let row = MigrationRow {
            project_id: "p".into(),
            revision: 1,
            schema: serde_json::to_value(Schema::empty()).unwrap(),
            steps: serde_json::json!([]),
            status: "exploded".into(),
            created_at: Utc::now(),
            finished_at: None,
        };

        let err = Migration::try_from(row).unwrap_err();
        assert!(err.to_string().contains("unknown migration status"));
    }
}

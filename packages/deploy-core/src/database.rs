//! Client database seam.
//!
//! The client database is the SQL backend holding a project's user-facing
//! data. The worker only ever asks it to run one payload at a time; isolation
//! between projects is the database's concern, not the worker's.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::mapper::SqlStatements;

/// Executes a mutation payload as a single unit.
#[async_trait]
pub trait ClientDatabase: Send + Sync + 'static {
    async fn run(&self, statements: &SqlStatements) -> Result<()>;
}

/// Client database over a Postgres pool.
///
/// The payload's statements run inside one transaction, so a multi-statement
/// mutation either fully applies or leaves the project untouched.
pub struct PostgresClientDatabase {
    pool: PgPool,
}

impl PostgresClientDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientDatabase for PostgresClientDatabase {
    async fn run(&self, statements: &SqlStatements) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for statement in statements.iter() {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Recording database (for testing)
// =============================================================================

/// Test double that records payloads and fails on request.
#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::ClientDatabase;
    use crate::mapper::SqlStatements;

    /// In-memory client database.
    ///
    /// Records every executed statement in order. Statements registered via
    /// [`RecordingDatabase::fail_on`] are rejected (after being recorded as
    /// attempted), which is how tests script mid-run failures.
    #[derive(Default)]
    pub struct RecordingDatabase {
        executed: Mutex<Vec<String>>,
        failing: Mutex<HashSet<String>>,
    }

    impl RecordingDatabase {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make any payload containing `fragment` fail.
        pub fn fail_on(&self, fragment: impl Into<String>) {
            self.failing.lock().unwrap().insert(fragment.into());
        }

        /// Everything executed so far, in submission order. Failed payloads
        /// are not included.
        pub fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ClientDatabase for RecordingDatabase {
        async fn run(&self, statements: &SqlStatements) -> Result<()> {
            let failing = self.failing.lock().unwrap();
            for statement in statements.iter() {
                if failing.iter().any(|fragment| statement.contains(fragment)) {
                    return Err(anyhow!("scripted failure on `{}`", statement));
                }
            }
            drop(failing);

            let mut executed = self.executed.lock().unwrap();
            executed.extend(statements.iter().map(str::to_string));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingDatabase;
    use super::*;

    #[tokio::test]
    async fn test_recording_database_preserves_order() {
        let db = RecordingDatabase::new();
        db.run(&SqlStatements::one("CREATE TABLE \"a\" ()"))
            .await
            .unwrap();
        db.run(&SqlStatements::one("CREATE TABLE \"b\" ()"))
            .await
            .unwrap();

        assert_eq!(
            db.executed(),
            vec![
                "CREATE TABLE \"a\" ()".to_string(),
                "CREATE TABLE \"b\" ()".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_scripted_failure_is_not_recorded_as_executed() {
        let db = RecordingDatabase::new();
        db.fail_on("\"b\"");

        db.run(&SqlStatements::one("CREATE TABLE \"a\" ()"))
            .await
            .unwrap();
        let err = db
            .run(&SqlStatements::one("CREATE TABLE \"b\" ()"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("scripted failure"));
        assert_eq!(db.executed(), vec!["CREATE TABLE \"a\" ()".to_string()]);
    }
}

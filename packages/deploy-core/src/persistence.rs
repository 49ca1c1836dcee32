//! Migration metadata store.
//!
//! # The Contract
//!
//! 1. **Durable and linearizable per project.** The worker is the only writer
//!    for its project, but the store must still enforce the one-pending
//!    invariant itself; the worker's admission check is an optimization, not
//!    the guarantee.
//!
//! 2. **Revisions are assigned on create.** `create` persists with status
//!    `Pending` and returns the stored record including its revision.
//!
//! 3. **Status moves once.** `update_migration_status` moves a migration to a
//!    terminal status and is idempotent for equal transitions.

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::migration::{Migration, MigrationStatus};

/// Durable store over `(project_id, migration)`.
#[async_trait]
pub trait MigrationPersistence: Send + Sync + 'static {
    /// The highest-revision migration for the project, regardless of status.
    async fn get_last_migration(
        &self,
        project_id: &str,
    ) -> Result<Option<Migration>, PersistenceError>;

    /// The unique migration with status `Pending`, if any.
    async fn get_next_migration(
        &self,
        project_id: &str,
    ) -> Result<Option<Migration>, PersistenceError>;

    /// Persist a new migration with status `Pending` and an assigned revision.
    ///
    /// Fails with [`PersistenceError::PendingExists`] if a `Pending`
    /// migration already exists for the project.
    async fn create(&self, migration: Migration) -> Result<Migration, PersistenceError>;

    /// Move a migration to a terminal status.
    async fn update_migration_status(
        &self,
        migration: &Migration,
        status: MigrationStatus,
    ) -> Result<(), PersistenceError>;
}

// =============================================================================
// In-memory store (for testing)
// =============================================================================

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Utc;

    use super::MigrationPersistence;
    use crate::error::PersistenceError;
    use crate::migration::{Migration, MigrationStatus};

    /// In-memory migration store backed by a HashMap.
    #[derive(Default)]
    pub struct InMemoryMigrationPersistence {
        migrations: Mutex<HashMap<String, Vec<Migration>>>,
        fail_next_create: Mutex<bool>,
    }

    impl InMemoryMigrationPersistence {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a project's zeroth migration, already `Success`, the way an
        /// external provisioner bootstraps a project before its worker starts.
        pub fn seed(&self, mut migration: Migration) {
            migration.revision = 1;
            migration.status = MigrationStatus::Success;
            migration.finished_at = Some(Utc::now());
            self.migrations
                .lock()
                .unwrap()
                .entry(migration.project_id.clone())
                .or_default()
                .push(migration);
        }

        /// Script the next `create` call to fail at the backend.
        pub fn fail_next_create(&self) {
            *self.fail_next_create.lock().unwrap() = true;
        }

        /// All stored migrations for a project, in revision order.
        pub fn project_migrations(&self, project_id: &str) -> Vec<Migration> {
            self.migrations
                .lock()
                .unwrap()
                .get(project_id)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl MigrationPersistence for InMemoryMigrationPersistence {
        async fn get_last_migration(
            &self,
            project_id: &str,
        ) -> Result<Option<Migration>, PersistenceError> {
            let migrations = self.migrations.lock().unwrap();
            Ok(migrations
                .get(project_id)
                .and_then(|list| list.last().cloned()))
        }

        async fn get_next_migration(
            &self,
            project_id: &str,
        ) -> Result<Option<Migration>, PersistenceError> {
            let migrations = self.migrations.lock().unwrap();
            Ok(migrations.get(project_id).and_then(|list| {
                list.iter()
                    .find(|m| m.status == MigrationStatus::Pending)
                    .cloned()
            }))
        }

        async fn create(&self, mut migration: Migration) -> Result<Migration, PersistenceError> {
            {
                let mut fail = self.fail_next_create.lock().unwrap();
                if *fail {
                    *fail = false;
                    return Err(PersistenceError::Backend(anyhow!("scripted create failure")));
                }
            }

            let mut migrations = self.migrations.lock().unwrap();
            let list = migrations.entry(migration.project_id.clone()).or_default();

            if list.iter().any(|m| m.status == MigrationStatus::Pending) {
                return Err(PersistenceError::PendingExists {
                    project_id: migration.project_id,
                });
            }

            migration.revision = list.last().map(|m| m.revision + 1).unwrap_or(1);
            migration.status = MigrationStatus::Pending;
            list.push(migration.clone());
            Ok(migration)
        }

        async fn update_migration_status(
            &self,
            migration: &Migration,
            status: MigrationStatus,
        ) -> Result<(), PersistenceError> {
            let mut migrations = self.migrations.lock().unwrap();
            let stored = migrations
                .get_mut(&migration.project_id)
                .and_then(|list| list.iter_mut().find(|m| m.revision == migration.revision))
                .ok_or_else(|| {
                    PersistenceError::Backend(anyhow!(
                        "no migration {} at revision {}",
                        migration.project_id,
                        migration.revision
                    ))
                })?;

            if stored.status == status {
                return Ok(());
            }
            stored.status = status;
            stored.finished_at = status.is_terminal().then(Utc::now);
            Ok(())
        }
    }
}

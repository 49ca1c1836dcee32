//! The per-project deployment worker.
//!
//! One worker per project, single-threaded with respect to its own state: a
//! tokio task owning a FIFO mailbox, a mode variable, and a stash. Handlers
//! never block the loop; anything that suspends (persistence writes, engine
//! runs, the init reads) runs as a spawned continuation that posts follow-up
//! messages back onto the same mailbox.
//!
//! # State machine
//!
//! ```text
//!              ┌──────────────┐
//!              │ Initializing │ ── init fails ──► (stop)
//!              └──────┬───────┘
//!             Ready(Ok) │  (+ self Deploy when a Pending exists)
//!                      ▼
//!    drain stash ┌───────┐  Schedule / Deploy   ┌──────┐
//!        ◄────── │ Ready │ ────────────────────► │ Busy │
//!                └───────┘ ◄──── Resume ──────── └──────┘
//! ```
//!
//! In `Initializing` and `Busy` every message except the state-exit event is
//! stashed and redelivered in arrival order on entry to `Ready`. The one
//! exception: a `Schedule` arriving while `Busy` is answered immediately
//! with `DeploymentInProgress` instead of waiting.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::engine::MigrationEngine;
use crate::error::{InitError, PersistenceError, ScheduleError};
use crate::migration::{Migration, MigrationStep};
use crate::persistence::MigrationPersistence;
use crate::protocol::{InitState, ScheduleRequest, WorkerMessage};
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Initializing,
    Ready,
    Busy,
}

/// Cloneable handle to a running deployment worker.
#[derive(Clone)]
pub struct WorkerHandle {
    project_id: String,
    tx: mpsc::Sender<WorkerMessage>,
    cancel: CancellationToken,
}

impl WorkerHandle {
    /// Submit a migration for admission.
    ///
    /// Replies are returned in admission order. `DeploymentInProgress` means
    /// another migration is pending or being applied; retry after it reaches
    /// a terminal status.
    pub async fn schedule(
        &self,
        next_schema: Schema,
        steps: Vec<MigrationStep>,
    ) -> Result<Migration, ScheduleError> {
        let (reply, rx) = oneshot::channel();
        let request = ScheduleRequest {
            next_schema,
            steps,
            reply,
        };
        self.tx
            .send(WorkerMessage::Schedule(request))
            .await
            .map_err(|_| ScheduleError::WorkerStopped {
                project_id: self.project_id.clone(),
            })?;
        rx.await.map_err(|_| ScheduleError::WorkerStopped {
            project_id: self.project_id.clone(),
        })?
    }

    /// Externally kick a `Deploy`. Harmless when nothing is pending.
    pub async fn kick_deploy(&self) -> Result<(), ScheduleError> {
        self.tx
            .send(WorkerMessage::Deploy)
            .await
            .map_err(|_| ScheduleError::WorkerStopped {
                project_id: self.project_id.clone(),
            })
    }

    /// Request cooperative shutdown. In-flight database work runs to
    /// completion from the database's perspective; its result is discarded.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

/// The worker task state. Constructed via [`DeploymentWorker::spawn`].
pub struct DeploymentWorker {
    project_id: String,
    worker_id: String,
    persistence: Arc<dyn MigrationPersistence>,
    engine: Arc<MigrationEngine>,
    active_schema: Option<Schema>,
    mode: Mode,
    stash: VecDeque<WorkerMessage>,
    self_tx: mpsc::Sender<WorkerMessage>,
}

impl DeploymentWorker {
    /// Spawn a worker for `project_id`.
    ///
    /// The worker starts in `Initializing`; the init reads run as a spawned
    /// continuation and everything arriving before they finish is stashed.
    pub fn spawn(
        project_id: impl Into<String>,
        persistence: Arc<dyn MigrationPersistence>,
        engine: Arc<MigrationEngine>,
        config: WorkerConfig,
    ) -> (WorkerHandle, JoinHandle<()>) {
        let project_id = project_id.into();
        let (tx, rx) = mpsc::channel(config.mailbox_capacity);
        let cancel = CancellationToken::new();

        let init_tx = tx.clone();
        let init_persistence = persistence.clone();
        let init_project = project_id.clone();
        tokio::spawn(async move {
            let outcome = initialize(init_persistence.as_ref(), &init_project).await;
            let _ = init_tx.send(WorkerMessage::Ready(outcome)).await;
        });

        let worker = DeploymentWorker {
            project_id: project_id.clone(),
            worker_id: config.worker_id,
            persistence,
            engine,
            active_schema: None,
            mode: Mode::Initializing,
            stash: VecDeque::new(),
            self_tx: tx.clone(),
        };
        let task = tokio::spawn(worker.run(rx, cancel.clone()));

        let handle = WorkerHandle {
            project_id,
            tx,
            cancel,
        };
        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<WorkerMessage>, cancel: CancellationToken) {
        info!(
            project_id = %self.project_id,
            worker_id = %self.worker_id,
            "deployment worker starting"
        );

        loop {
            // Redeliver stashed messages, in arrival order, for as long as we
            // stay Ready. A redelivered Schedule or Deploy flips us to Busy
            // and the remainder keeps waiting.
            while self.mode == Mode::Ready {
                let Some(msg) = self.stash.pop_front() else {
                    break;
                };
                debug!(
                    project_id = %self.project_id,
                    kind = msg.kind(),
                    "redelivering stashed message"
                );
                if !self.handle(msg).await {
                    return;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(project_id = %self.project_id, "deployment worker stopping");
                    return;
                }
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        info!(project_id = %self.project_id, "mailbox closed, worker stopping");
                        return;
                    };
                    if !self.handle(msg).await {
                        return;
                    }
                }
            }
        }
    }

    /// Process one message. Returns `false` when the worker must stop.
    async fn handle(&mut self, msg: WorkerMessage) -> bool {
        match self.mode {
            Mode::Initializing => match msg {
                WorkerMessage::Ready(Ok(init)) => {
                    info!(
                        project_id = %self.project_id,
                        has_pending = init.has_pending,
                        "deployment worker initialized"
                    );
                    self.active_schema = Some(init.active_schema);
                    if init.has_pending {
                        // The interrupted migration goes first, ahead of
                        // anything stashed during init.
                        self.stash.push_front(WorkerMessage::Deploy);
                    }
                    self.mode = Mode::Ready;
                    true
                }
                WorkerMessage::Ready(Err(e)) => {
                    error!(
                        project_id = %self.project_id,
                        error = %e,
                        "initialization failed, worker shutting down"
                    );
                    false
                }
                other => {
                    debug!(
                        project_id = %self.project_id,
                        kind = other.kind(),
                        "stashing message during initialization"
                    );
                    self.stash.push_back(other);
                    true
                }
            },

            Mode::Ready => match msg {
                WorkerMessage::Schedule(request) => {
                    self.mode = Mode::Busy;
                    self.spawn_admission(request);
                    true
                }
                WorkerMessage::Deploy => {
                    self.mode = Mode::Busy;
                    self.spawn_deploy();
                    true
                }
                other => {
                    warn!(
                        project_id = %self.project_id,
                        kind = other.kind(),
                        "unexpected message while ready, dropping"
                    );
                    true
                }
            },

            Mode::Busy => match msg {
                WorkerMessage::Schedule(request) => {
                    debug!(project_id = %self.project_id, "rejecting schedule while busy");
                    let _ = request.reply.send(Err(ScheduleError::DeploymentInProgress {
                        project_id: self.project_id.clone(),
                    }));
                    true
                }
                WorkerMessage::Resume { new_active_schema } => {
                    if let Some(schema) = new_active_schema {
                        self.active_schema = Some(schema);
                    }
                    self.mode = Mode::Ready;
                    true
                }
                other => {
                    debug!(
                        project_id = %self.project_id,
                        kind = other.kind(),
                        "stashing message while busy"
                    );
                    self.stash.push_back(other);
                    true
                }
            },
        }
    }

    /// Admission continuation: check-then-create against persistence, reply
    /// to the caller, then hand control back via `Deploy` + `Resume`.
    ///
    /// The check-then-create pair needs no lock: the worker went `Busy` the
    /// moment admission began, so it is serialized with every other write
    /// for this project.
    fn spawn_admission(&self, request: ScheduleRequest) {
        let persistence = self.persistence.clone();
        let tx = self.self_tx.clone();
        let project_id = self.project_id.clone();

        tokio::spawn(async move {
            let outcome = admit(
                persistence.as_ref(),
                &project_id,
                request.next_schema,
                request.steps,
            )
            .await;
            let admitted = outcome.is_ok();
            if let Err(e) = &outcome {
                debug!(project_id = %project_id, error = %e, "schedule not admitted");
            }
            let _ = request.reply.send(outcome);

            if admitted {
                let _ = tx.send(WorkerMessage::Deploy).await;
            }
            let _ = tx
                .send(WorkerMessage::Resume {
                    new_active_schema: None,
                })
                .await;
        });
    }

    /// Deploy continuation: load the pending migration and run the engine.
    fn spawn_deploy(&self) {
        let persistence = self.persistence.clone();
        let engine = self.engine.clone();
        let tx = self.self_tx.clone();
        let project_id = self.project_id.clone();
        let active_schema = self.active_schema.clone();

        tokio::spawn(async move {
            let new_active_schema =
                run_deploy(persistence.as_ref(), &engine, &project_id, active_schema).await;
            let _ = tx.send(WorkerMessage::Resume { new_active_schema }).await;
        });
    }
}

/// Init reads: last migration (for the active schema) and the pending one.
async fn initialize(
    persistence: &dyn MigrationPersistence,
    project_id: &str,
) -> Result<InitState, InitError> {
    let last = persistence
        .get_last_migration(project_id)
        .await?
        .ok_or_else(|| InitError::MissingBaseline {
            project_id: project_id.to_string(),
        })?;
    let next = persistence.get_next_migration(project_id).await?;

    Ok(InitState {
        active_schema: last.schema,
        has_pending: next.is_some(),
    })
}

async fn admit(
    persistence: &dyn MigrationPersistence,
    project_id: &str,
    next_schema: Schema,
    steps: Vec<MigrationStep>,
) -> Result<Migration, ScheduleError> {
    if persistence.get_next_migration(project_id).await?.is_some() {
        return Err(ScheduleError::DeploymentInProgress {
            project_id: project_id.to_string(),
        });
    }

    match persistence
        .create(Migration::new(project_id, next_schema, steps))
        .await
    {
        Ok(migration) => {
            info!(
                project_id = %project_id,
                revision = migration.revision,
                steps = migration.steps.len(),
                "migration scheduled"
            );
            Ok(migration)
        }
        // The store beat us to the invariant: same answer as the pre-check.
        Err(PersistenceError::PendingExists { project_id }) => {
            Err(ScheduleError::DeploymentInProgress { project_id })
        }
        Err(e) => Err(e.into()),
    }
}

/// Returns the new active schema when the migration succeeded.
async fn run_deploy(
    persistence: &dyn MigrationPersistence,
    engine: &MigrationEngine,
    project_id: &str,
    active_schema: Option<Schema>,
) -> Option<Schema> {
    let Some(active_schema) = active_schema else {
        warn!(project_id = %project_id, "deploy before initialization finished, ignoring");
        return None;
    };

    let migration = match persistence.get_next_migration(project_id).await {
        Ok(Some(migration)) => migration,
        Ok(None) => {
            warn!(project_id = %project_id, "deploy requested but no migration is pending");
            return None;
        }
        Err(e) => {
            error!(project_id = %project_id, error = %e, "could not load pending migration");
            return None;
        }
    };

    match engine.apply(&active_schema, &migration).await {
        Ok(result) if result.succeeded => Some(migration.schema),
        Ok(_) => None,
        Err(e) => {
            // Terminal status write failed; the migration stays Pending for
            // a supervisor to retry.
            error!(
                project_id = %project_id,
                revision = migration.revision,
                error = %e,
                "failed to record migration outcome"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::Semaphore;
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::applier::SqlStepApplier;
    use crate::database::testing::RecordingDatabase;
    use crate::database::ClientDatabase;
    use crate::mapper::{PostgresStepMapper, SqlStatements};
    use crate::migration::MigrationStatus;
    use crate::persistence::testing::InMemoryMigrationPersistence;
    use crate::schema::{Field, FieldType, Model};

    const PROJECT: &str = "p";

    fn user_schema() -> Schema {
        Schema {
            models: vec![Model {
                name: "user".into(),
                fields: vec![Field {
                    name: "email".into(),
                    field_type: FieldType::Text,
                    required: true,
                }],
            }],
        }
    }

    fn user_steps() -> Vec<MigrationStep> {
        vec![
            MigrationStep::CreateModel {
                model: "user".into(),
            },
            MigrationStep::CreateField {
                model: "user".into(),
                field: Field {
                    name: "email".into(),
                    field_type: FieldType::Text,
                    required: true,
                },
            },
        ]
    }

    fn spawn_worker(
        store: Arc<InMemoryMigrationPersistence>,
        db: Arc<dyn ClientDatabase>,
    ) -> (WorkerHandle, JoinHandle<()>) {
        spawn_worker_on(store.clone(), store, db)
    }

    /// Spawn with a distinct persistence for the worker (lets tests wrap the
    /// store) while the engine records status through the inner store.
    fn spawn_worker_on(
        worker_store: Arc<dyn MigrationPersistence>,
        engine_store: Arc<InMemoryMigrationPersistence>,
        db: Arc<dyn ClientDatabase>,
    ) -> (WorkerHandle, JoinHandle<()>) {
        let applier = Arc::new(SqlStepApplier::new(Arc::new(PostgresStepMapper::new()), db));
        let engine = Arc::new(MigrationEngine::new(applier, engine_store));
        DeploymentWorker::spawn(PROJECT, worker_store, engine, WorkerConfig::default())
    }

    fn seed_baseline(store: &InMemoryMigrationPersistence) {
        store.seed(Migration::new(PROJECT, Schema::empty(), vec![]));
    }

    async fn wait_for_terminal(
        store: &InMemoryMigrationPersistence,
        revision: i64,
    ) -> MigrationStatus {
        timeout(Duration::from_secs(2), async {
            loop {
                let status = store
                    .project_migrations(PROJECT)
                    .into_iter()
                    .find(|m| m.revision == revision)
                    .map(|m| m.status);
                if let Some(status) = status {
                    if status.is_terminal() {
                        return status;
                    }
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("migration never reached a terminal status")
    }

    /// Schedule with retry: the worker only re-enters `Ready` once it has
    /// processed its own `Resume`, which can land shortly after the terminal
    /// status becomes visible in the store.
    async fn schedule_admitted(
        handle: &WorkerHandle,
        schema: Schema,
        steps: Vec<MigrationStep>,
    ) -> Migration {
        timeout(Duration::from_secs(2), async {
            loop {
                match handle.schedule(schema.clone(), steps.clone()).await {
                    Ok(migration) => return migration,
                    Err(ScheduleError::DeploymentInProgress { .. }) => {
                        sleep(Duration::from_millis(10)).await;
                    }
                    Err(e) => panic!("unexpected schedule error: {e:?}"),
                }
            }
        })
        .await
        .expect("schedule was never admitted")
    }

    /// Client database that holds every payload until permits are released.
    struct GatedDatabase {
        inner: RecordingDatabase,
        permits: Arc<Semaphore>,
    }

    #[async_trait]
    impl ClientDatabase for GatedDatabase {
        async fn run(&self, statements: &SqlStatements) -> Result<()> {
            let permit = self.permits.acquire().await?;
            permit.forget();
            self.inner.run(statements).await
        }
    }

    /// Persistence wrapper that holds the init read until released.
    struct GatedPersistence {
        inner: Arc<InMemoryMigrationPersistence>,
        release: Arc<Semaphore>,
    }

    #[async_trait]
    impl MigrationPersistence for GatedPersistence {
        async fn get_last_migration(
            &self,
            project_id: &str,
        ) -> Result<Option<Migration>, PersistenceError> {
            let permit = self
                .release
                .acquire()
                .await
                .map_err(|e| PersistenceError::Backend(e.into()))?;
            permit.forget();
            self.inner.get_last_migration(project_id).await
        }

        async fn get_next_migration(
            &self,
            project_id: &str,
        ) -> Result<Option<Migration>, PersistenceError> {
            self.inner.get_next_migration(project_id).await
        }

        async fn create(&self, migration: Migration) -> Result<Migration, PersistenceError> {
            self.inner.create(migration).await
        }

        async fn update_migration_status(
            &self,
            migration: &Migration,
            status: MigrationStatus,
        ) -> Result<(), PersistenceError> {
            self.inner.update_migration_status(migration, status).await
        }
    }

    #[tokio::test]
    async fn test_happy_path_applies_and_advances_active_schema() {
        let store = Arc::new(InMemoryMigrationPersistence::new());
        seed_baseline(&store);
        let db = Arc::new(RecordingDatabase::new());
        let (handle, _task) = spawn_worker(store.clone(), db.clone());

        let migration = handle.schedule(user_schema(), user_steps()).await.unwrap();
        assert_eq!(migration.revision, 2);
        assert!(migration.is_pending());

        assert_eq!(
            wait_for_terminal(&store, 2).await,
            MigrationStatus::Success
        );
        assert_eq!(
            db.executed(),
            vec![
                "CREATE TABLE \"user\" ()".to_string(),
                "ALTER TABLE \"user\" ADD COLUMN \"email\" TEXT NOT NULL".to_string(),
            ]
        );

        // The active schema advanced to the new one: deleting the model now
        // maps against a schema that knows it, so a DROP is emitted.
        schedule_admitted(
            &handle,
            Schema::empty(),
            vec![MigrationStep::DeleteModel {
                model: "user".into(),
            }],
        )
        .await;
        assert_eq!(
            wait_for_terminal(&store, 3).await,
            MigrationStatus::Success
        );
        assert!(db
            .executed()
            .contains(&"DROP TABLE \"user\"".to_string()));
    }

    #[tokio::test]
    async fn test_failed_migration_rolls_back_and_keeps_active_schema() {
        let store = Arc::new(InMemoryMigrationPersistence::new());
        seed_baseline(&store);
        let db = Arc::new(RecordingDatabase::new());
        db.fail_on("ADD COLUMN");
        let (handle, _task) = spawn_worker(store.clone(), db.clone());

        handle.schedule(user_schema(), user_steps()).await.unwrap();
        assert_eq!(
            wait_for_terminal(&store, 2).await,
            MigrationStatus::RollbackSuccess
        );

        // Active schema did not advance: deleting "user" is metadata-only
        // against the still-empty schema, so nothing new hits the database.
        let statements_before = db.executed().len();
        schedule_admitted(
            &handle,
            Schema::empty(),
            vec![MigrationStep::DeleteModel {
                model: "user".into(),
            }],
        )
        .await;
        assert_eq!(
            wait_for_terminal(&store, 3).await,
            MigrationStatus::Success
        );
        assert_eq!(db.executed().len(), statements_before);
    }

    #[tokio::test]
    async fn test_schedule_while_busy_is_rejected_without_persisting() {
        let store = Arc::new(InMemoryMigrationPersistence::new());
        seed_baseline(&store);
        let permits = Arc::new(Semaphore::new(0));
        let db = Arc::new(GatedDatabase {
            inner: RecordingDatabase::new(),
            permits: permits.clone(),
        });
        let (handle, _task) = spawn_worker(store.clone(), db);

        // Admitted, then the engine blocks on the gated database.
        let first = handle.schedule(user_schema(), user_steps()).await.unwrap();
        assert_eq!(first.revision, 2);

        let err = handle
            .schedule(user_schema(), user_steps())
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::DeploymentInProgress { .. }));
        // Exactly one migration was persisted on top of the baseline.
        assert_eq!(store.project_migrations(PROJECT).len(), 2);

        permits.add_permits(16);
        assert_eq!(
            wait_for_terminal(&store, 2).await,
            MigrationStatus::Success
        );

        // Back to Ready: the next schedule is admitted.
        let third = schedule_admitted(&handle, user_schema(), vec![]).await;
        assert_eq!(third.revision, 3);
    }

    #[tokio::test]
    async fn test_restart_with_pending_migration_deploys_it() {
        let store = Arc::new(InMemoryMigrationPersistence::new());
        seed_baseline(&store);
        store
            .create(Migration::new(PROJECT, user_schema(), user_steps()))
            .await
            .unwrap();
        let db = Arc::new(RecordingDatabase::new());

        let (_handle, _task) = spawn_worker(store.clone(), db.clone());

        assert_eq!(
            wait_for_terminal(&store, 2).await,
            MigrationStatus::Success
        );
        assert_eq!(db.executed().len(), 2);
    }

    #[tokio::test]
    async fn test_worker_shuts_down_without_baseline_migration() {
        let store = Arc::new(InMemoryMigrationPersistence::new());
        let db = Arc::new(RecordingDatabase::new());
        let (handle, task) = spawn_worker(store, db);

        timeout(Duration::from_secs(2), task)
            .await
            .expect("worker should stop on init failure")
            .unwrap();

        let err = handle
            .schedule(Schema::empty(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::WorkerStopped { .. }));
    }

    #[tokio::test]
    async fn test_deploy_kick_without_pending_is_a_no_op() {
        let store = Arc::new(InMemoryMigrationPersistence::new());
        seed_baseline(&store);
        let db = Arc::new(RecordingDatabase::new());
        let (handle, _task) = spawn_worker(store.clone(), db.clone());

        handle.kick_deploy().await.unwrap();
        sleep(Duration::from_millis(50)).await;

        assert!(db.executed().is_empty());
        assert_eq!(store.project_migrations(PROJECT).len(), 1);

        // The worker came back to Ready and still admits work.
        let migration = schedule_admitted(&handle, user_schema(), vec![]).await;
        assert_eq!(migration.revision, 2);
    }

    #[tokio::test]
    async fn test_messages_stashed_during_init_are_redelivered_in_order() {
        let inner = Arc::new(InMemoryMigrationPersistence::new());
        seed_baseline(&inner);
        let release = Arc::new(Semaphore::new(0));
        let gated = Arc::new(GatedPersistence {
            inner: inner.clone(),
            release: release.clone(),
        });
        let db = Arc::new(RecordingDatabase::new());
        let (handle, _task) = spawn_worker_on(gated, inner.clone(), db);

        // Two schedules arrive while init is blocked on the first read.
        let first = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.schedule(user_schema(), vec![]).await })
        };
        sleep(Duration::from_millis(20)).await;
        let second = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.schedule(user_schema(), vec![]).await })
        };
        sleep(Duration::from_millis(20)).await;

        release.add_permits(1);

        // FIFO redelivery: the first submission wins admission, the second
        // is rejected while the first deploys.
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.revision, 2);
        let err = second.await.unwrap().unwrap_err();
        assert!(matches!(err, ScheduleError::DeploymentInProgress { .. }));
    }

    #[tokio::test]
    async fn test_schedule_persistence_error_is_surfaced_and_worker_recovers() {
        let store = Arc::new(InMemoryMigrationPersistence::new());
        seed_baseline(&store);
        store.fail_next_create();
        let db = Arc::new(RecordingDatabase::new());
        let (handle, _task) = spawn_worker(store.clone(), db);

        let err = handle
            .schedule(user_schema(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Persistence(PersistenceError::Backend(_))
        ));

        // Back to Ready; the next attempt succeeds.
        let migration = schedule_admitted(&handle, user_schema(), vec![]).await;
        assert_eq!(migration.revision, 2);
        assert_eq!(
            wait_for_terminal(&store, 2).await,
            MigrationStatus::Success
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_worker() {
        let store = Arc::new(InMemoryMigrationPersistence::new());
        seed_baseline(&store);
        let db = Arc::new(RecordingDatabase::new());
        let (handle, task) = spawn_worker(store, db);

        handle.shutdown();
        timeout(Duration::from_secs(2), task)
            .await
            .expect("worker should honor shutdown")
            .unwrap();
    }
}

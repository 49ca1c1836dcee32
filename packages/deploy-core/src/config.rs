//! Worker and service configuration.

use anyhow::{Context, Result};
use std::env;
use uuid::Uuid;

/// Tuning knobs for one deployment worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Mailbox depth before senders are backpressured. The stash itself is
    /// unbounded by contract; backpressure is the caller's responsibility.
    pub mailbox_capacity: usize,
    /// Identifier for this worker instance, for logs.
    pub worker_id: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 64,
            worker_id: format!("deploy-{}", Uuid::new_v4()),
        }
    }
}

impl WorkerConfig {
    pub fn with_mailbox_capacity(mailbox_capacity: usize) -> Self {
        Self {
            mailbox_capacity,
            ..Default::default()
        }
    }

    /// Create a config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

/// Service-level configuration loaded from environment variables.
///
/// The worker core itself takes no environment input; this is for the
/// process that wires workers to real databases.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Connection string for the migration metadata store.
    pub database_url: String,
    /// Connection string for the client databases; defaults to the metadata
    /// store when projects share a server.
    pub client_database_url: String,
    pub worker: WorkerConfig,
}

impl DeployConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let client_database_url =
            env::var("CLIENT_DATABASE_URL").unwrap_or_else(|_| database_url.clone());
        let mailbox_capacity = env::var("WORKER_MAILBOX_CAPACITY")
            .ok()
            .map(|raw| {
                raw.parse()
                    .context("WORKER_MAILBOX_CAPACITY must be a valid number")
            })
            .transpose()?
            .unwrap_or_else(|| WorkerConfig::default().mailbox_capacity);

        Ok(Self {
            database_url,
            client_database_url,
            worker: WorkerConfig::with_mailbox_capacity(mailbox_capacity),
        })
    }
}

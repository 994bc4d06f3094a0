//! # Progress Store
//!
//! Expected vs. completed job counters per `(config, process type)`. The producer
//! adds to `expected` when it enqueues; the failure router adds one to `completed`
//! each time a job finishes successfully.

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

use super::errors::StoreResult;
use crate::models::{ProcessType, ProgressRecord};

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn add_expected(&self, config_id: &str, process: ProcessType, jobs: u64) -> StoreResult<()>;

    async fn mark_completed(&self, config_id: &str, process: ProcessType) -> StoreResult<()>;

    /// Zeroed record when nothing has been counted yet
    async fn get(&self, config_id: &str, process: ProcessType) -> StoreResult<ProgressRecord>;

    /// Clear every counter of a config
    async fn reset(&self, config_id: &str) -> StoreResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryProgressStore {
    records: DashMap<(String, ProcessType), (u64, u64)>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn add_expected(&self, config_id: &str, process: ProcessType, jobs: u64) -> StoreResult<()> {
        self.records
            .entry((config_id.to_string(), process))
            .or_default()
            .0 += jobs;
        Ok(())
    }

    async fn mark_completed(&self, config_id: &str, process: ProcessType) -> StoreResult<()> {
        self.records
            .entry((config_id.to_string(), process))
            .or_default()
            .1 += 1;
        Ok(())
    }

    async fn get(&self, config_id: &str, process: ProcessType) -> StoreResult<ProgressRecord> {
        let (expected_jobs, completed_jobs) = self
            .records
            .get(&(config_id.to_string(), process))
            .map(|entry| *entry.value())
            .unwrap_or_default();
        Ok(ProgressRecord {
            config_id: config_id.to_string(),
            process_type: process,
            expected_jobs,
            completed_jobs,
        })
    }

    async fn reset(&self, config_id: &str) -> StoreResult<()> {
        self.records.retain(|(id, _), _| id != config_id);
        Ok(())
    }
}

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Counters persisted in PostgreSQL so they survive restarts and are shared by replicas
#[derive(Debug, Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        MIGRATOR.run(&pool).await?;
        info!("🗄️ Progress store connected and migrated");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn add_expected(&self, config_id: &str, process: ProcessType, jobs: u64) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO migration_progress (config_id, process_type, expected_jobs, completed_jobs, updated_at) \
             VALUES ($1, $2, $3, 0, NOW()) \
             ON CONFLICT (config_id, process_type) \
             DO UPDATE SET expected_jobs = migration_progress.expected_jobs + EXCLUDED.expected_jobs, \
                           updated_at = NOW()",
        )
        .bind(config_id)
        .bind(process.as_str())
        .bind(jobs as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_completed(&self, config_id: &str, process: ProcessType) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO migration_progress (config_id, process_type, expected_jobs, completed_jobs, updated_at) \
             VALUES ($1, $2, 0, 1, NOW()) \
             ON CONFLICT (config_id, process_type) \
             DO UPDATE SET completed_jobs = migration_progress.completed_jobs + 1, \
                           updated_at = NOW()",
        )
        .bind(config_id)
        .bind(process.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, config_id: &str, process: ProcessType) -> StoreResult<ProgressRecord> {
        let row = sqlx::query(
            "SELECT expected_jobs, completed_jobs FROM migration_progress \
             WHERE config_id = $1 AND process_type = $2",
        )
        .bind(config_id)
        .bind(process.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let (expected, completed) = match row {
            Some(row) => (
                row.try_get::<i64, _>("expected_jobs")?,
                row.try_get::<i64, _>("completed_jobs")?,
            ),
            None => (0, 0),
        };

        Ok(ProgressRecord {
            config_id: config_id.to_string(),
            process_type: process,
            expected_jobs: expected.max(0) as u64,
            completed_jobs: completed.max(0) as u64,
        })
    }

    async fn reset(&self, config_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM migration_progress WHERE config_id = $1")
            .bind(config_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_counters() {
        let store = InMemoryProgressStore::new();
        store
            .add_expected("cfg", ProcessType::MetadataDownload, 3)
            .await
            .unwrap();
        store
            .mark_completed("cfg", ProcessType::MetadataDownload)
            .await
            .unwrap();

        let record = store.get("cfg", ProcessType::MetadataDownload).await.unwrap();
        assert_eq!(record.expected_jobs, 3);
        assert_eq!(record.completed_jobs, 1);
        assert_eq!(record.outstanding(), 2);

        let untouched = store.get("cfg", ProcessType::MetadataUpload).await.unwrap();
        assert_eq!(untouched.expected_jobs, 0);
    }

    #[tokio::test]
    async fn test_reset_only_touches_one_config() {
        let store = InMemoryProgressStore::new();
        store.add_expected("a", ProcessType::DataDownload, 1).await.unwrap();
        store.add_expected("b", ProcessType::DataDownload, 2).await.unwrap();

        store.reset("a").await.unwrap();

        assert_eq!(store.get("a", ProcessType::DataDownload).await.unwrap().expected_jobs, 0);
        assert_eq!(store.get("b", ProcessType::DataDownload).await.unwrap().expected_jobs, 2);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a PostgreSQL instance"]
    async fn test_pg_counters_upsert() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let store = PgProgressStore::connect(&url, 2).await.unwrap();
        let config_id = format!("itest-{}", uuid::Uuid::new_v4());

        store.add_expected(&config_id, ProcessType::MetadataUpload, 2).await.unwrap();
        store.add_expected(&config_id, ProcessType::MetadataUpload, 3).await.unwrap();
        store.mark_completed(&config_id, ProcessType::MetadataUpload).await.unwrap();

        let record = store.get(&config_id, ProcessType::MetadataUpload).await.unwrap();
        assert_eq!((record.expected_jobs, record.completed_jobs), (5, 1));

        store.reset(&config_id).await.unwrap();
        assert_eq!(store.get(&config_id, ProcessType::MetadataUpload).await.unwrap().expected_jobs, 0);
    }
}

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;

use super::field_store::FieldStore;

/// SQLite-backed field store. Survives restarts.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open `fields.db` in the given data directory
    pub async fn init(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        // 데이터베이스 파일 경로
        let db_path = data_dir.join("fields.db");
        Self::open(&db_path).await
    }

    pub async fn open(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        // 연결 풀 생성
        let pool = SqlitePool::connect_with(options).await?;
        Self::with_pool(pool).await
    }

    /// Single-connection in-memory database; every pooled connection would
    /// otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        // 테이블 생성
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fields (
                namespace TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (namespace, field)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    async fn get_value(&self, namespace: &str, field: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM fields WHERE namespace = ? AND field = ?")
            .bind(namespace)
            .bind(field)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set_value(&self, namespace: &str, field: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fields (namespace, field, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, field) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(namespace)
        .bind(field)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All persisted fields of a namespace, sorted by field name
    pub async fn snapshot(&self, namespace: &str) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT field, value FROM fields WHERE namespace = ? ORDER BY field")
            .bind(namespace)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>("field"), r.get::<String, _>("value")))
            .collect())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl FieldStore for Database {
    async fn get(&self, namespace: &str, field: &str) -> Option<String> {
        match self.get_value(namespace, field).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to read field {}/{}: {}", namespace, field, e);
                None
            }
        }
    }

    async fn set(&self, namespace: &str, field: &str, value: &str) {
        if let Err(e) = self.set_value(namespace, field, value).await {
            tracing::error!("Failed to persist field {}/{}: {}", namespace, field, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.get("GoogleDocs", "prompt").await.is_none());

        db.set("GoogleDocs", "prompt", "first").await;
        db.set("GoogleDocs", "prompt", "second").await;
        db.set("GoogleDocs", "context_window", "8192").await;

        assert_eq!(db.get("GoogleDocs", "prompt").await.as_deref(), Some("second"));
        assert_eq!(
            db.snapshot("GoogleDocs").await.unwrap(),
            vec![
                ("context_window".to_string(), "8192".to_string()),
                ("prompt".to_string(), "second".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let db = Database::init(dir.path()).await.unwrap();
        db.set("SlackChannel", "channel", "general").await;
        db.close().await;

        let reopened = Database::init(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get("SlackChannel", "channel").await.as_deref(),
            Some("general")
        );
        assert!(reopened.get("GoogleDocs", "channel").await.is_none());
    }
}

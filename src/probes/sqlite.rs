//! SQLite probe: same create/insert/select cycle against a local file.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, info};

use super::{Probe, ProbeDetail, ServiceKind};
use crate::config::SqliteConfig;
use crate::errors::{Error, Result};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS test (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )
"#;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TestRecord {
    pub id: i64,
    pub name: String,
    pub created_at: Option<String>,
}

pub struct SqliteProbe {
    config: SqliteConfig,
}

impl SqliteProbe {
    pub fn new(config: SqliteConfig) -> Self {
        Self { config }
    }

    async fn ensure_parent_dir(path: &Path) -> Result<()> {
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    Error::io(e, format!("Failed to create directory {}", dir.display()))
                })
            }
            _ => Ok(()),
        }
    }

    async fn exercise(conn: &mut SqliteConnection) -> Result<ProbeDetail> {
        sqlx::query(CREATE_TABLE)
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::database(e, "Failed to create table 'test'"))?;

        let inserted_id = sqlx::query("INSERT INTO test (name) VALUES (?)")
            .bind("Person")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::database(e, "Failed to insert into 'test'"))?
            .last_insert_rowid();
        info!(id = inserted_id, "Record inserted into SQLite");

        let rows: Vec<TestRecord> = sqlx::query_as(
            "SELECT id, name, CAST(created_at AS TEXT) AS created_at FROM test ORDER BY id",
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| Error::database(e, "Failed to read from 'test'"))?;
        info!(row_count = rows.len(), rows = ?rows, "SQLite Data");

        Ok(ProbeDetail::new(format!(
            "inserted id {}, table holds {} row(s)",
            inserted_id,
            rows.len()
        ))
        .with_data(json!({ "inserted_id": inserted_id, "rows": rows })))
    }
}

#[async_trait]
impl Probe for SqliteProbe {
    fn service(&self) -> ServiceKind {
        ServiceKind::Sqlite
    }

    async fn run(&self) -> Result<ProbeDetail> {
        let path = &self.config.path;
        Self::ensure_parent_dir(path).await?;

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .disable_statement_logging();

        let mut conn = SqliteConnection::connect_with(&options).await.map_err(|e| {
            Error::database(e, format!("Failed to open SQLite database {}", path.display()))
        })?;
        info!(path = %path.display(), "Connected to SQLite");

        let result = Self::exercise(&mut conn).await;

        if let Err(e) = conn.close().await {
            debug!(error = %e, "Error while closing SQLite connection");
        }

        result
    }
}

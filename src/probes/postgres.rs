//! PostgreSQL probe: create the `test` table, insert a row, read all rows.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, info};

use super::{connect_within, Probe, ProbeDetail, ServiceKind};
use crate::config::PostgresConfig;
use crate::errors::{Error, Result};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS test (
        id SERIAL PRIMARY KEY,
        name VARCHAR(50)
    )
"#;

/// Row shape of the `test` table
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TestRecord {
    pub id: i32,
    pub name: Option<String>,
}

pub struct PostgresProbe {
    config: PostgresConfig,
}

impl PostgresProbe {
    pub fn new(config: PostgresConfig) -> Self {
        Self { config }
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.database)
            .disable_statement_logging()
    }

    async fn exercise(conn: &mut PgConnection) -> Result<ProbeDetail> {
        sqlx::query(CREATE_TABLE)
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::database(e, "Failed to create table 'test'"))?;

        let inserted_id: i32 =
            sqlx::query_scalar("INSERT INTO test (name) VALUES ($1) RETURNING id")
                .bind("Person")
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| Error::database(e, "Failed to insert into 'test'"))?;
        info!(id = inserted_id, "Record inserted into PostgreSQL");

        let rows: Vec<TestRecord> = sqlx::query_as("SELECT id, name FROM test ORDER BY id")
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| Error::database(e, "Failed to read from 'test'"))?;
        info!(row_count = rows.len(), rows = ?rows, "PostgreSQL Data");

        Ok(ProbeDetail::new(format!(
            "inserted id {}, table holds {} row(s)",
            inserted_id,
            rows.len()
        ))
        .with_data(json!({ "inserted_id": inserted_id, "rows": rows })))
    }
}

#[async_trait]
impl Probe for PostgresProbe {
    fn service(&self) -> ServiceKind {
        ServiceKind::Postgres
    }

    async fn run(&self) -> Result<ProbeDetail> {
        let target = self.config.display_url();
        let options = self.connect_options();

        let mut conn = connect_within(
            "connect to PostgreSQL",
            self.config.connect_timeout(),
            async {
                PgConnection::connect_with(&options).await.map_err(|e| {
                    Error::database(e, format!("Failed to connect to PostgreSQL at {}", target))
                })
            },
        )
        .await?;
        info!(url = %target, "Connected to PostgreSQL");

        let result = Self::exercise(&mut conn).await;

        if let Err(e) = conn.close().await {
            debug!(error = %e, "Error while closing PostgreSQL connection");
        }

        result
    }
}

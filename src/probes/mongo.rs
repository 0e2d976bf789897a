//! MongoDB probe: insert one document and list the collection.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use serde_json::json;
use tracing::info;

use super::{Probe, ProbeDetail, ServiceKind};
use crate::config::settings::DEFAULT_CONNECT_TIMEOUT_SECONDS;
use crate::config::MongoConfig;
use crate::errors::{Error, Result};

pub struct MongoProbe {
    config: MongoConfig,
}

impl MongoProbe {
    pub fn new(config: MongoConfig) -> Self {
        Self { config }
    }

    /// Document written on every run
    pub fn sample_document() -> Document {
        doc! { "name": "Person", "age": 32 }
    }

    async fn client(&self) -> Result<Client> {
        let mut options = ClientOptions::parse(&self.config.uri)
            .await
            .map_err(|e| Error::mongo(e, "Invalid MONGO_URI"))?;

        let timeout = Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS);
        options.connect_timeout.get_or_insert(timeout);
        options.server_selection_timeout.get_or_insert(timeout);
        options.app_name.get_or_insert_with(|| crate::APP_NAME.to_string());

        Client::with_options(options).map_err(|e| Error::mongo(e, "Failed to build MongoDB client"))
    }

    async fn exercise(&self, client: &Client) -> Result<ProbeDetail> {
        let database = client.database(&self.config.database);

        // The driver connects lazily; ping forces a round trip
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| Error::mongo(e, "Failed to connect to MongoDB"))?;
        info!(database = %self.config.database, "Connected to MongoDB");

        let collection: Collection<Document> = database.collection(&self.config.collection);

        let inserted = collection
            .insert_one(Self::sample_document())
            .await
            .map_err(|e| Error::mongo(e, format!("Failed to insert into '{}'", self.config.collection)))?;

        let documents: Vec<Document> = collection
            .find(doc! {})
            .await
            .map_err(|e| Error::mongo(e, format!("Failed to query '{}'", self.config.collection)))?
            .try_collect()
            .await
            .map_err(|e| Error::mongo(e, "Failed to read query results"))?;
        info!(
            inserted_id = %inserted.inserted_id,
            document_count = documents.len(),
            "MongoDB Data"
        );

        Ok(ProbeDetail::new(format!(
            "inserted {}, collection holds {} document(s)",
            inserted.inserted_id,
            documents.len()
        ))
        .with_data(json!({
            "inserted_id": inserted.inserted_id.to_string(),
            "documents": serde_json::to_value(&documents)?,
        })))
    }
}

#[async_trait]
impl Probe for MongoProbe {
    fn service(&self) -> ServiceKind {
        ServiceKind::Mongo
    }

    async fn run(&self) -> Result<ProbeDetail> {
        let client = self.client().await?;
        let result = self.exercise(&client).await;
        client.shutdown().await;
        result
    }
}

use crate::error::IndexError;
use crate::models::IndexPoint;
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

pub struct QdrantIndex {
    endpoint: String,
    collection: String,
    client: Client,
}

impl QdrantIndex {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, dimension: usize) -> Result<(), IndexError> {
        let collection_url = format!("{}/collections/{}", self.endpoint, self.collection);

        let existing = self.client.get(&collection_url).send().await?;
        if existing.status().is_success() {
            debug!(collection = %self.collection, "collection already exists");
            return Ok(());
        }

        let response = self
            .client
            .put(&collection_url)
            .json(&json!({
                "vectors": { "size": dimension, "distance": "Cosine" }
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexError::Backend {
                status: status.as_u16(),
                details: response.text().await.unwrap_or_default(),
            });
        }

        info!(collection = %self.collection, dimension, "created collection");
        Ok(())
    }

    async fn upsert_points(&self, points: &[IndexPoint]) -> Result<(), IndexError> {
        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, self.collection
            ))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexError::Backend {
                status: status.as_u16(),
                details: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }
}

//! Qdrant implementation for vector search
//!
//! Provides connection management, nearest-neighbor search over showcase
//! project records, and the optional admin capability used for seeding.
//!
//! Collections are created with cosine distance, so scores are cosine
//! similarity: bounded, higher means more similar.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forge_core::{ProjectRecord, SearchHit, VectorConfig, VectorDbError};
use qdrant_client::qdrant::{
    point_id::PointIdOptions, points_selector::PointsSelectorOneOf, Condition,
    CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointId, PointStruct,
    PointsIdsList, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;

use crate::{RecordPoint, SearchParams, VectorAdmin, VectorSearch};

/// Qdrant-backed vector search client
pub struct QdrantSearch {
    client: Qdrant,
    dimension: usize,
}

impl QdrantSearch {
    /// Create a new Qdrant connection
    pub async fn connect(config: &VectorConfig) -> Result<Self, VectorDbError> {
        let client = Qdrant::from_url(&config.qdrant_url)
            .build()
            .map_err(|e| VectorDbError::Connection(format!("Qdrant connection failed: {e}")))?;

        Ok(Self {
            client,
            dimension: config.dimension,
        })
    }

    /// Configured collection dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl VectorSearch for QdrantSearch {
    async fn search(
        &self,
        collection: &str,
        params: SearchParams,
    ) -> Result<Vec<SearchHit>, VectorDbError> {
        if params.vector.len() != self.dimension {
            return Err(VectorDbError::Search(format!(
                "query vector dimension {} does not match collection dimension {}",
                params.vector.len(),
                self.dimension
            )));
        }

        let mut builder =
            SearchPointsBuilder::new(collection, params.vector.clone(), params.limit as u64)
                .with_payload(true);

        if let Some(threshold) = params.score_threshold {
            builder = builder.score_threshold(threshold);
        }

        if let Some(filter) = &params.filter {
            let conditions: Vec<Condition> = filter
                .must_match
                .iter()
                .map(|(field, value)| Condition::matches(field.clone(), value.clone()))
                .collect();
            builder = builder.filter(Filter::must(conditions));
        }

        let results = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| VectorDbError::Search(format!("vector search failed: {e}")))?;

        let mut hits: Vec<SearchHit> = results
            .result
            .into_iter()
            .map(|point| {
                let id = point
                    .id
                    .and_then(|pid| pid.point_id_options)
                    .map(|options| match options {
                        PointIdOptions::Num(n) => n.to_string(),
                        PointIdOptions::Uuid(s) => s,
                    })
                    .unwrap_or_default();

                let payload = &point.payload;
                let read_str = |key: &str| {
                    payload
                        .get(key)
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                };

                let record = ProjectRecord {
                    title: read_str("title").unwrap_or_default(),
                    description: read_str("description").unwrap_or_default(),
                    link: read_str("link").unwrap_or_default(),
                    how_its_made: read_str("how_its_made"),
                    source_code: read_str("source_code"),
                    last_updated: read_str("last_updated")
                        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                        .map(|dt| dt.with_timezone(&Utc)),
                };

                SearchHit {
                    id,
                    score: point.score,
                    payload: record,
                }
            })
            .collect();

        // Hits are always ordered descending by score.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(hits)
    }

    fn admin(&self) -> Option<&dyn VectorAdmin> {
        Some(self)
    }
}

#[async_trait]
impl VectorAdmin for QdrantSearch {
    async fn create_collection(
        &self,
        collection: &str,
        dimension: usize,
    ) -> Result<(), VectorDbError> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorDbError::Admin(format!("failed to list collections: {e}")))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == collection);

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(collection).vectors_config(
                        VectorParamsBuilder::new(dimension as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| VectorDbError::Admin(format!("failed to create collection: {e}")))?;
        }

        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<RecordPoint>,
    ) -> Result<(), VectorDbError> {
        if points.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|point| {
                let payload_map: std::collections::HashMap<String, qdrant_client::qdrant::Value> =
                    serde_json::to_value(&point.payload)
                        .unwrap_or_default()
                        .as_object()
                        .cloned()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(k, v)| (k, v.into()))
                        .collect();

                PointStruct::new(point.id, point.vector, payload_map)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points))
            .await
            .map_err(|e| VectorDbError::Admin(format!("failed to upsert records: {e}")))?;

        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), VectorDbError> {
        if ids.is_empty() {
            return Ok(());
        }

        let selector = PointsSelectorOneOf::Points(PointsIdsList {
            ids: ids
                .iter()
                .map(|id| PointId {
                    point_id_options: Some(PointIdOptions::Uuid(id.clone())),
                })
                .collect(),
        });

        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(selector))
            .await
            .map_err(|e| VectorDbError::Admin(format!("failed to delete records: {e}")))?;

        Ok(())
    }
}

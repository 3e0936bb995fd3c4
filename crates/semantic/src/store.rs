use async_trait::async_trait;
use blocks::BlockKind;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::{SemanticError, similarity::cosine};

/// A persisted block with its embedding, keyed per tenant.
///
/// Records are written by the ingestion path, which is an external
/// collaborator; the pipeline only reads. The stored embedding is exposed so
/// the selector can compute pairwise similarities without another service
/// round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Owning tenant.
    pub tenant: String,
    /// Stable id of the stored block, assigned by the ingestion path.
    pub block_id: String,
    /// Kind of the stored block.
    pub kind: BlockKind,
    /// Textual payload.
    pub content: String,
    /// Token count of the payload at ingestion time.
    pub token_count: usize,
    /// Ingestion time, used for recency.
    pub created_at: DateTime<Utc>,
    /// Fingerprint of the normalized content, used for dedup against the
    /// live conversation.
    pub fingerprint: String,
    /// Free-form metadata, including the provenance tag under `source`.
    pub metadata: serde_json::Value,
    /// Unit-norm embedding of the content.
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    /// Provenance tag from the metadata, defaulting to `retrieved:<id>`.
    pub fn source(&self) -> String {
        self.metadata
            .get("source")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("retrieved:{}", self.block_id))
    }
}

/// Vector store contract: cosine-ANN search over per-tenant records.
///
/// Any backend supporting cosine search with a fixed dimension qualifies;
/// the bundled [`MemoryVectorStore`] serves tests and single-process
/// deployments.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a record, keyed by `(tenant, block_id)`.
    async fn upsert(&self, record: VectorRecord) -> Result<(), SemanticError>;

    /// Delete a record by id. Unknown ids are a no-op.
    async fn delete(&self, tenant: &str, block_id: &str) -> Result<(), SemanticError>;

    /// Return up to `top_k` records of the tenant in descending cosine
    /// similarity to `query`, optionally restricted to one kind.
    async fn ann_search(
        &self,
        tenant: &str,
        query: &[f32],
        top_k: usize,
        kind_filter: Option<BlockKind>,
    ) -> Result<Vec<VectorRecord>, SemanticError>;
}

/// Brute-force in-memory store.
///
/// Exact search instead of approximate: fine at the scale of one process
/// and it keeps tests deterministic.
#[derive(Default)]
pub struct MemoryVectorStore {
    tenants: DashMap<String, Vec<VectorRecord>>,
}

impl MemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, record: VectorRecord) -> Result<(), SemanticError> {
        let mut records = self.tenants.entry(record.tenant.clone()).or_default();

        match records.iter().position(|r| r.block_id == record.block_id) {
            Some(index) => records[index] = record,
            None => records.push(record),
        }

        Ok(())
    }

    async fn delete(&self, tenant: &str, block_id: &str) -> Result<(), SemanticError> {
        if let Some(mut records) = self.tenants.get_mut(tenant) {
            records.retain(|r| r.block_id != block_id);
        }

        Ok(())
    }

    async fn ann_search(
        &self,
        tenant: &str,
        query: &[f32],
        top_k: usize,
        kind_filter: Option<BlockKind>,
    ) -> Result<Vec<VectorRecord>, SemanticError> {
        let Some(records) = self.tenants.get(tenant) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f32, VectorRecord)> = records
            .iter()
            .filter(|r| kind_filter.is_none_or(|kind| r.kind == kind))
            .map(|r| (cosine(query, &r.embedding), r.clone()))
            .collect();

        scored.sort_by(|(sa, ra), (sb, rb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ra.block_id.cmp(&rb.block_id))
        });

        scored.truncate(top_k);

        Ok(scored.into_iter().map(|(_, r)| r).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tenant: &str, id: &str, kind: BlockKind, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            tenant: tenant.to_string(),
            block_id: id.to_string(),
            kind,
            content: format!("content of {id}"),
            token_count: 4,
            created_at: Utc::now(),
            fingerprint: id.to_string(),
            metadata: serde_json::json!({}),
            embedding,
        }
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let store = MemoryVectorStore::new();
        store.upsert(record("t", "far", BlockKind::Doc, vec![0.0, 1.0])).await.unwrap();
        store.upsert(record("t", "near", BlockKind::Doc, vec![1.0, 0.0])).await.unwrap();
        store
            .upsert(record("t", "mid", BlockKind::Doc, vec![0.7071, 0.7071]))
            .await
            .unwrap();

        let hits = store.ann_search("t", &[1.0, 0.0], 2, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|r| r.block_id.as_str()).collect();
        assert_eq!(ids, ["near", "mid"]);
    }

    #[tokio::test]
    async fn search_respects_tenant_and_kind() {
        let store = MemoryVectorStore::new();
        store.upsert(record("a", "1", BlockKind::Doc, vec![1.0, 0.0])).await.unwrap();
        store.upsert(record("a", "2", BlockKind::Assistant, vec![1.0, 0.0])).await.unwrap();
        store.upsert(record("b", "3", BlockKind::Doc, vec![1.0, 0.0])).await.unwrap();

        let docs = store
            .ann_search("a", &[1.0, 0.0], 10, Some(BlockKind::Doc))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].block_id, "1");

        let other = store.ann_search("missing", &[1.0, 0.0], 10, None).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = MemoryVectorStore::new();
        store.upsert(record("t", "1", BlockKind::Doc, vec![1.0, 0.0])).await.unwrap();
        store.upsert(record("t", "1", BlockKind::Doc, vec![0.0, 1.0])).await.unwrap();

        let hits = store.ann_search("t", &[0.0, 1.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].embedding, vec![0.0, 1.0]);

        store.delete("t", "1").await.unwrap();
        assert!(store.ann_search("t", &[0.0, 1.0], 10, None).await.unwrap().is_empty());
    }
}

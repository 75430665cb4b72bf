use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;

use shared::domain::{Grievance, GrievanceId, NewGrievance, Status};

mod firestore;
mod memory;

pub use firestore::{FirestoreStore, ServiceAccountKey};
pub use memory::MemoryStore;

/// Collection the grievance records live in.
pub const GRIEVANCE_COLLECTION: &str = "grievances";

/// A flat document: string keys mapped to scalar/boolean values.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Client seam over the externally managed document store. The store owns
/// id assignment and all concurrency control; implementations add neither
/// retries nor ordering guarantees of their own.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persists a new document and returns the id the store assigned.
    async fn insert(&self, collection: &str, document: Document) -> Result<String>;

    /// Reads one document; absence is `None`, never an error.
    async fn fetch(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Merges `fields` into an existing document. Returns false when no
    /// document with that id exists.
    async fn apply(&self, collection: &str, id: &str, fields: Document) -> Result<bool>;

    /// All documents in a collection, order unspecified.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>>;

    /// Connectivity probe used once at startup.
    async fn ping(&self) -> Result<()>;
}

/// Record store adapter: grievance-typed operations over an injected
/// [`DocumentStore`] handle. Cloneable; safe to share across request tasks.
#[derive(Clone)]
pub struct Storage {
    store: Arc<dyn DocumentStore>,
}

impl Storage {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn health_check(&self) -> Result<()> {
        self.store.ping().await.context("document store ping failed")
    }

    /// Persists a new grievance with status forced to Pending and the
    /// submission time stamped here. Returns the store-assigned id.
    pub async fn create_grievance(&self, new: NewGrievance) -> Result<GrievanceId> {
        let grievance = Grievance {
            id: GrievanceId::default(),
            name: new.name,
            email: new.email,
            category: new.category,
            description: new.description,
            status: Status::Pending,
            anonymous: new.anonymous,
            submitted_at: Utc::now(),
        };
        let id = self
            .store
            .insert(GRIEVANCE_COLLECTION, to_document(&grievance)?)
            .await
            .context("failed to persist grievance")?;
        Ok(GrievanceId(id))
    }

    pub async fn fetch_grievance(&self, id: &GrievanceId) -> Result<Option<Grievance>> {
        let document = self.store.fetch(GRIEVANCE_COLLECTION, id.as_str()).await?;
        document
            .map(|doc| from_document(id.clone(), doc))
            .transpose()
    }

    pub async fn list_grievances(&self) -> Result<Vec<Grievance>> {
        let documents = self.store.list(GRIEVANCE_COLLECTION).await?;
        documents
            .into_iter()
            .map(|(id, doc)| from_document(GrievanceId(id), doc))
            .collect()
    }

    /// Overwrites only the status field, then re-reads the full record.
    /// `None` when no grievance with that id exists.
    pub async fn update_status(
        &self,
        id: &GrievanceId,
        status: Status,
    ) -> Result<Option<Grievance>> {
        let mut fields = Document::new();
        fields.insert("status".into(), serde_json::to_value(status)?);
        let applied = self
            .store
            .apply(GRIEVANCE_COLLECTION, id.as_str(), fields)
            .await
            .context("failed to update grievance status")?;
        if !applied {
            return Ok(None);
        }
        self.fetch_grievance(id).await
    }
}

fn to_document(grievance: &Grievance) -> Result<Document> {
    match serde_json::to_value(grievance)? {
        serde_json::Value::Object(map) => Ok(map),
        other => bail!("grievance serialized to non-object value: {other}"),
    }
}

fn from_document(id: GrievanceId, document: Document) -> Result<Grievance> {
    let mut grievance: Grievance = serde_json::from_value(serde_json::Value::Object(document))
        .with_context(|| format!("malformed grievance document '{id}'"))?;
    grievance.id = id;
    Ok(grievance)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

use async_trait::async_trait;
use chrono::Utc;
use orchcore::{
    LineageSummary, Record, RecordContent, RecordId, RepositoryError, Status, VersionedRepository,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local repository backend.
///
/// Records are keyed by id; a lineage is every record sharing a `base_id`.
/// The lock is taken once per operation and released before returning.
pub struct InMemoryRepository<C: RecordContent> {
    records: RwLock<HashMap<RecordId, Record<C>>>,
}

impl<C: RecordContent> Default for InMemoryRepository<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: RecordContent> InMemoryRepository<C> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Insert pre-built records as-is, replacing any with the same id
    pub async fn seed(&self, records: impl IntoIterator<Item = Record<C>>) {
        let mut store = self.records.write().await;
        for record in records {
            store.insert(record.id.clone(), record);
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn draft_of<'a, C>(
    store: &'a mut HashMap<RecordId, Record<C>>,
    base_id: &str,
) -> Result<&'a mut Record<C>, RepositoryError> {
    store
        .values_mut()
        .find(|r| r.base_id == base_id && r.is_draft())
        .ok_or_else(|| RepositoryError::NoDraft {
            base_id: base_id.to_string(),
        })
}

#[async_trait]
impl<C: RecordContent> VersionedRepository<C> for InMemoryRepository<C> {
    async fn create_draft(&self, content: C) -> Result<Record<C>, RepositoryError> {
        let record = Record::new_draft(content);
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_draft(&self, base_id: &str, content: C) -> Result<Record<C>, RepositoryError> {
        let mut store = self.records.write().await;
        let draft = draft_of(&mut store, base_id)?;
        draft.content = content;
        draft.updated_at = Utc::now();
        Ok(draft.clone())
    }

    async fn publish(
        &self,
        base_id: &str,
        version: &str,
        description: Option<String>,
    ) -> Result<Record<C>, RepositoryError> {
        let stamped = format!("v{}", version);
        let mut store = self.records.write().await;

        // A draft must exist before the version string is considered.
        draft_of(&mut store, base_id)?;

        let taken = store
            .values()
            .any(|r| r.base_id == base_id && r.version.as_deref() == Some(stamped.as_str()));
        if taken {
            return Err(RepositoryError::VersionExists {
                base_id: base_id.to_string(),
                version: stamped,
            });
        }

        let draft = draft_of(&mut store, base_id)?;
        let now = Utc::now();
        draft.status = Status::Published;
        draft.version = Some(stamped);
        draft.description = description;
        draft.updated_at = now;
        draft.last_published_at = Some(now);
        Ok(draft.clone())
    }

    async fn draft_from_version(
        &self,
        version_record_id: &str,
    ) -> Result<Record<C>, RepositoryError> {
        let mut store = self.records.write().await;

        let source = store
            .get(version_record_id)
            .ok_or_else(|| RepositoryError::not_found(version_record_id))?;
        if source.is_draft() {
            return Err(RepositoryError::NotPublished {
                id: version_record_id.to_string(),
            });
        }

        let now = Utc::now();
        let draft = Record {
            id: Uuid::new_v4().to_string(),
            base_id: source.base_id.clone(),
            version: None,
            status: Status::Draft,
            description: None,
            created_at: now,
            updated_at: now,
            last_published_at: None,
            content: source.content.clone(),
        };

        // The new draft supersedes any existing one.
        store.retain(|_, r| !(r.base_id == draft.base_id && r.is_draft()));
        store.insert(draft.id.clone(), draft.clone());
        Ok(draft)
    }

    async fn load(&self, record_id: &str) -> Result<Record<C>, RepositoryError> {
        self.records
            .read()
            .await
            .get(record_id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(record_id))
    }

    async fn list_versions(&self, base_id: &str) -> Result<Vec<Record<C>>, RepositoryError> {
        let store = self.records.read().await;
        let mut versions: Vec<Record<C>> = store
            .values()
            .filter(|r| r.base_id == base_id)
            .cloned()
            .collect();
        drop(store);

        if versions.is_empty() {
            return Err(RepositoryError::not_found(base_id));
        }

        // Draft first, then by version string. Lexical: "v10.0" sorts before "v2.0".
        versions.sort_by(|a, b| {
            b.is_draft()
                .cmp(&a.is_draft())
                .then_with(|| a.version.cmp(&b.version))
        });
        Ok(versions)
    }

    async fn list_all(&self) -> Result<Vec<LineageSummary>, RepositoryError> {
        let store = self.records.read().await;

        let mut lineages: HashMap<&str, Vec<&Record<C>>> = HashMap::new();
        for record in store.values() {
            lineages.entry(record.base_id.as_str()).or_default().push(record);
        }

        let mut summaries: Vec<LineageSummary> = lineages
            .values()
            .filter_map(|records| LineageSummary::from_records(records))
            .collect();
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.base_id.cmp(&b.base_id))
        });
        Ok(summaries)
    }
}

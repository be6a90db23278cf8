use crate::{
    BoundPolicy, EngineError, EngineVerdict, FlowContent, LineageSummary, PolicyContent,
    Record, RecordContent, RepositoryError,
};
use async_trait::async_trait;

/// Client for the external rule-evaluation engine
#[async_trait]
pub trait PolicyInvoker: Send + Sync {
    /// Evaluate one policy with its bound data.
    ///
    /// `result = false` is a normal verdict. Transport, status and decode
    /// failures must come back as errors, never as a default verdict.
    async fn invoke(&self, policy: &BoundPolicy) -> Result<EngineVerdict, EngineError>;
}

/// Draft/publish storage for one kind of record.
///
/// Implementations guarantee at most one draft per lineage and that
/// published records never change.
#[async_trait]
pub trait VersionedRepository<C: RecordContent>: Send + Sync {
    /// Start a new lineage with `content` as its draft
    async fn create_draft(&self, content: C) -> Result<Record<C>, RepositoryError>;

    /// Overwrite the lineage's draft content
    async fn update_draft(&self, base_id: &str, content: C) -> Result<Record<C>, RepositoryError>;

    /// Freeze the current draft as version `"v" + version`
    async fn publish(
        &self,
        base_id: &str,
        version: &str,
        description: Option<String>,
    ) -> Result<Record<C>, RepositoryError>;

    /// Replace the lineage's draft with a copy of a published version
    async fn draft_from_version(&self, version_record_id: &str)
        -> Result<Record<C>, RepositoryError>;

    async fn load(&self, record_id: &str) -> Result<Record<C>, RepositoryError>;

    /// Draft first, then published versions by ascending version string
    async fn list_versions(&self, base_id: &str) -> Result<Vec<Record<C>>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<LineageSummary>, RepositoryError>;

    /// Current draft of a lineage, if one exists
    async fn draft(&self, base_id: &str) -> Result<Option<Record<C>>, RepositoryError> {
        let versions = self.list_versions(base_id).await?;
        Ok(versions.into_iter().find(|r| r.is_draft()))
    }
}

pub type PolicyRepository = dyn VersionedRepository<PolicyContent>;
pub type FlowRepository = dyn VersionedRepository<FlowContent>;

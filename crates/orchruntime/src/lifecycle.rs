use orchcore::{Error, LineageSummary, Record, RecordContent, VersionedRepository};

/// Content check run before a draft is written
pub type ContentValidator<C> = fn(&C) -> Result<(), Error>;

/// Draft/publish operations on one repository, with error context and logging
pub struct Lifecycle<'r, C: RecordContent> {
    repo: &'r dyn VersionedRepository<C>,
    kind: &'static str,
    validator: Option<ContentValidator<C>>,
}

impl<'r, C: RecordContent> Lifecycle<'r, C> {
    pub fn new(repo: &'r dyn VersionedRepository<C>, kind: &'static str) -> Self {
        Self {
            repo,
            kind,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: ContentValidator<C>) -> Self {
        self.validator = Some(validator);
        self
    }

    fn check(&self, content: &C) -> Result<(), Error> {
        match self.validator {
            Some(validate) => validate(content),
            None => Ok(()),
        }
    }

    pub async fn create_draft(&self, content: C) -> Result<Record<C>, Error> {
        self.check(&content)?;
        let record = self
            .repo
            .create_draft(content)
            .await
            .map_err(Error::from)?;

        tracing::info!(kind = self.kind, base_id = %record.base_id, "Created {} lineage", self.kind);
        Ok(record)
    }

    pub async fn update_draft(&self, base_id: &str, content: C) -> Result<Record<C>, Error> {
        self.check(&content)?;
        let record = self
            .repo
            .update_draft(base_id, content)
            .await
            .map_err(|e| Error::policy(base_id, e))?;

        tracing::debug!(kind = self.kind, base_id, "Updated {} draft", self.kind);
        Ok(record)
    }

    pub async fn publish(
        &self,
        base_id: &str,
        version: &str,
        description: Option<String>,
    ) -> Result<Record<C>, Error> {
        let record = self
            .repo
            .publish(base_id, version, description)
            .await
            .map_err(|e| {
                tracing::warn!(kind = self.kind, base_id, "Publish failed: {}", e);
                Error::policy(base_id, e)
            })?;

        tracing::info!(
            kind = self.kind,
            base_id,
            version = record.version.as_deref().unwrap_or_default(),
            "Published {} version",
            self.kind
        );
        Ok(record)
    }

    pub async fn draft_from_version(&self, version_record_id: &str) -> Result<Record<C>, Error> {
        let record = self
            .repo
            .draft_from_version(version_record_id)
            .await
            .map_err(|e| Error::policy(version_record_id, e))?;

        tracing::info!(
            kind = self.kind,
            base_id = %record.base_id,
            from = version_record_id,
            "Spawned {} draft from version",
            self.kind
        );
        Ok(record)
    }

    pub async fn load(&self, record_id: &str) -> Result<Record<C>, Error> {
        self.repo
            .load(record_id)
            .await
            .map_err(|e| Error::policy(record_id, e))
    }

    pub async fn list_versions(&self, base_id: &str) -> Result<Vec<Record<C>>, Error> {
        self.repo
            .list_versions(base_id)
            .await
            .map_err(|e| Error::policy(base_id, e))
    }

    pub async fn list_all(&self) -> Result<Vec<LineageSummary>, Error> {
        self.repo.list_all().await.map_err(Error::from)
    }
}

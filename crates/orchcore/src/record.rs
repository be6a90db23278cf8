use crate::{Error, FlowDefinition, FlowDocument, Payload};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RecordId = String;
pub type BaseId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Draft,
    Published,
}

/// What a lineage stores in each of its records
pub trait RecordContent:
    Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Display name used by lineage summaries
    fn name(&self) -> &str;
}

/// One draft or published entry of a lineage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<C> {
    pub id: RecordId,
    pub base_id: BaseId,
    /// `None` while the record is a draft; `"v" + supplied` once published
    #[serde(default)]
    pub version: Option<String>,
    pub status: Status,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_published_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub content: C,
}

impl<C> Record<C> {
    /// A draft that starts a new lineage
    pub fn new_draft(content: C) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            base_id: Uuid::new_v4().to_string(),
            version: None,
            status: Status::Draft,
            description: None,
            created_at: now,
            updated_at: now,
            last_published_at: None,
            content,
        }
    }

    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_draft(&self) -> bool {
        self.status == Status::Draft
    }
}

/// Policy content: the rule text plus its data model and tests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyContent {
    pub name: String,
    pub rule: String,
    #[serde(default, rename = "schema", alias = "dataModel")]
    pub data_model: Payload,
    #[serde(default)]
    pub tests: Payload,
    /// Data bound at authoring time; replaced by the caller's data when run
    #[serde(default)]
    pub data: Payload,
}

impl PolicyContent {
    pub fn new(name: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rule: rule.into(),
            ..Self::default()
        }
    }
}

impl RecordContent for PolicyContent {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Flow content: the definition text plus editor graph state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowContent {
    pub name: String,
    /// Flow document as YAML or JSON text
    pub flow: String,
    #[serde(default)]
    pub nodes: Payload,
    #[serde(default)]
    pub edges: Payload,
    #[serde(default)]
    pub tests: Payload,
}

impl FlowContent {
    pub fn new(name: impl Into<String>, flow: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flow: flow.into(),
            ..Self::default()
        }
    }

    pub fn document(&self) -> Result<FlowDocument, Error> {
        FlowDocument::parse(&self.flow)
    }

    pub fn definition(&self) -> Result<FlowDefinition, Error> {
        Ok(self.document()?.flow)
    }
}

impl RecordContent for FlowContent {
    fn name(&self) -> &str {
        &self.name
    }
}

pub type PolicyRecord = Record<PolicyContent>;
pub type FlowRecord = Record<FlowContent>;

/// One row per lineage, as returned by `list_all`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageSummary {
    pub base_id: BaseId,
    pub name: String,
    pub version_count: usize,
    pub draft_id: Option<RecordId>,
    pub has_draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_published_at: Option<DateTime<Utc>>,
}

impl LineageSummary {
    /// Fold every record of one lineage into its summary row.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_records<C: RecordContent>(records: &[&Record<C>]) -> Option<Self> {
        let first = records.first()?;
        let draft = records.iter().find(|r| r.is_draft());
        let latest = *records.iter().max_by_key(|r| r.updated_at)?;
        let name_source = draft.copied().unwrap_or(latest);

        Some(Self {
            base_id: first.base_id.clone(),
            name: name_source.content.name().to_string(),
            version_count: records.iter().filter(|r| !r.is_draft()).count(),
            draft_id: draft.map(|r| r.id.clone()),
            has_draft: draft.is_some(),
            created_at: records.iter().map(|r| r.created_at).min()?,
            updated_at: latest.updated_at,
            last_published_at: records.iter().filter_map(|r| r.last_published_at).max(),
        })
    }
}

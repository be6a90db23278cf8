use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error on field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("flow error in flow {} at node {node_id}: {source}", .flow_id.as_deref().unwrap_or("<ad-hoc>"))]
    Flow {
        flow_id: Option<String>,
        node_id: String,
        #[source]
        source: NodeError,
    },

    #[error("policy error for policy {policy_id}: {source}")]
    Policy {
        policy_id: String,
        #[source]
        source: RepositoryError,
    },

    #[error("not found: {0}")]
    NotFound(#[source] RepositoryError),

    #[error("repository error: {0}")]
    Repository(#[source] RepositoryError),

    #[error("evaluation engine unavailable: {0}")]
    EngineUnavailable(#[source] EngineError),

    #[error("execution cancelled")]
    Cancelled,

    #[error("execution timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap a repository failure with the id of the record it concerned
    pub fn policy(policy_id: impl Into<String>, source: RepositoryError) -> Self {
        match source {
            RepositoryError::NotFound { .. } | RepositoryError::NoDraft { .. } => {
                Error::NotFound(source)
            }
            source => Error::Policy {
                policy_id: policy_id.into(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Policy { source, .. } | Error::Repository(source) => source.is_not_found(),
            Error::Flow { source, .. } => matches!(
                source,
                NodeError::Policy { source, .. } if source.is_not_found()
            ),
            _ => false,
        }
    }

    pub fn is_engine_unavailable(&self) -> bool {
        match self {
            Error::EngineUnavailable(e) => e.is_unavailable(),
            Error::Flow {
                source: NodeError::Engine(e),
                ..
            } => e.is_unavailable(),
            _ => false,
        }
    }

    pub fn is_missing_policy_reference(&self) -> bool {
        matches!(
            self,
            Error::Flow {
                source: NodeError::MissingPolicyReference,
                ..
            }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Flow { source, .. } => matches!(
                source,
                NodeError::Cancelled | NodeError::Engine(EngineError::Cancelled)
            ),
            Error::EngineUnavailable(EngineError::Cancelled) => true,
            _ => false,
        }
    }

    /// Id of the flow node that failed, if the error came out of a traversal
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Error::Flow { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

/// Repository failures not tied to a single record id
impl From<RepositoryError> for Error {
    fn from(e: RepositoryError) -> Self {
        if e.is_not_found() {
            Error::NotFound(e)
        } else {
            Error::Repository(e)
        }
    }
}

impl From<EngineError> for Error {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Cancelled => Error::Cancelled,
            e => Error::EngineUnavailable(e),
        }
    }
}

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("policyRef is required for policy nodes")]
    MissingPolicyReference,

    #[error("outcome is required for custom nodes")]
    MissingOutcome,

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("failed to load policy {policy_id}: {source}")]
    Policy {
        policy_id: String,
        #[source]
        source: RepositoryError,
    },

    #[error("failed to run policy: {0}")]
    Engine(#[from] EngineError),

    #[error("Cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found: {id}")]
    NotFound { id: String },

    #[error("no draft exists for {base_id}")]
    NoDraft { base_id: String },

    #[error("record {id} is not a published version")]
    NotPublished { id: String },

    #[error("version {version} already exists for {base_id}")]
    VersionExists { base_id: String, version: String },

    #[error("failed to encode record: {0}")]
    Serialization(String),
}

impl RepositoryError {
    pub fn not_found(id: impl Into<String>) -> Self {
        RepositoryError::NotFound { id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepositoryError::NotFound { .. } | RepositoryError::NoDraft { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("engine returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode engine response: {0}")]
    Decode(String),

    #[error("Cancelled")]
    Cancelled,
}

impl EngineError {
    /// Every failure except cancellation means no usable verdict came back
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, EngineError::Cancelled)
    }
}

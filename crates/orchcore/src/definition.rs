use crate::{Error, FlowNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A flow tree: one or more independent roots executed in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    #[serde(rename = "start", alias = "roots")]
    pub roots: Vec<FlowNode>,
}

impl FlowDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, node: FlowNode) -> Self {
        self.roots.push(node);
        self
    }

    pub fn node_count(&self) -> usize {
        self.roots.iter().map(FlowNode::subtree_size).sum()
    }

    /// Node ids must be present and unique across the whole definition.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        let mut pending: Vec<&FlowNode> = self.roots.iter().collect();
        while let Some(node) = pending.pop() {
            if node.id.is_empty() {
                return Err(Error::validation("flow", "node without an id"));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(Error::validation(
                    "flow",
                    format!("duplicate node id: {}", node.id),
                ));
            }
            pending.extend(node.on_true.iter());
            pending.extend(node.on_false.iter());
        }
        Ok(())
    }
}

/// Editor bookkeeping stored alongside a flow; ignored by the executor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMetadata {
    #[serde(default)]
    pub total_nodes: usize,
    #[serde(default)]
    pub total_edges: usize,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Stored form of a flow: `{flow: {start: [...]}, metadata: {...}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    pub flow: FlowDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FlowMetadata>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentShape {
    Wrapped(FlowDocument),
    Bare(FlowDefinition),
}

impl From<DocumentShape> for FlowDocument {
    fn from(shape: DocumentShape) -> Self {
        match shape {
            DocumentShape::Wrapped(doc) => doc,
            DocumentShape::Bare(flow) => FlowDocument {
                flow,
                metadata: None,
            },
        }
    }
}

impl FlowDocument {
    /// Parse a flow from JSON or YAML text, wrapped or bare.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let trimmed = text.trim_start();
        if trimmed.is_empty() {
            return Err(Error::validation("flow", "empty flow document"));
        }

        // Text opening with '{' may be JSON or a YAML flow mapping.
        let json_attempt = if trimmed.starts_with('{') {
            serde_json::from_str::<DocumentShape>(trimmed).ok()
        } else {
            None
        };
        let shape: DocumentShape = match json_attempt {
            Some(shape) => shape,
            None => serde_yaml::from_str(text)
                .map_err(|e| Error::validation("flow", format!("invalid flow format: {}", e)))?,
        };

        let doc = FlowDocument::from(shape);
        doc.flow.validate()?;
        Ok(doc)
    }

    pub fn to_yaml(&self) -> Result<String, Error> {
        serde_yaml::to_string(self)
            .map_err(|e| Error::validation("flow", format!("failed to encode flow: {}", e)))
    }
}

use crate::{NodeError, Value};
use serde::{Deserialize, Serialize};

pub type NodeId = String;

/// Node types understood by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Same semantics as `Policy`; only marks a tree root
    Start,
    Policy,
    Return,
    Custom,
}

impl NodeKind {
    pub fn parse(node_type: &str) -> Result<Self, NodeError> {
        match node_type {
            "start" => Ok(NodeKind::Start),
            "policy" => Ok(NodeKind::Policy),
            "return" => Ok(NodeKind::Return),
            "custom" => Ok(NodeKind::Custom),
            other => Err(NodeError::UnknownNodeType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Policy => "policy",
            NodeKind::Return => "return",
            NodeKind::Custom => "custom",
        }
    }

    pub fn evaluates_policy(&self) -> bool {
        matches!(self, NodeKind::Start | NodeKind::Policy)
    }
}

/// One node of a flow tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub id: NodeId,

    /// Raw type string; resolved with [`FlowNode::kind`] at execution time
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default, alias = "policyId", skip_serializing_if = "String::is_empty")]
    pub policy_ref: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_true: Vec<FlowNode>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_false: Vec<FlowNode>,
}

impl FlowNode {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            node_type: kind.as_str().to_string(),
            policy_ref: String::new(),
            return_value: None,
            outcome: None,
            on_true: Vec::new(),
            on_false: Vec::new(),
        }
    }

    pub fn policy(id: impl Into<String>, policy_ref: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Policy).with_policy(policy_ref)
    }

    pub fn start(id: impl Into<String>, policy_ref: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Start).with_policy(policy_ref)
    }

    pub fn returning(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(id, NodeKind::Return).with_return_value(value)
    }

    pub fn custom(id: impl Into<String>, outcome: impl Into<String>) -> Self {
        let mut node = Self::new(id, NodeKind::Custom);
        node.outcome = Some(outcome.into());
        node
    }

    pub fn with_policy(mut self, policy_ref: impl Into<String>) -> Self {
        self.policy_ref = policy_ref.into();
        self
    }

    pub fn with_return_value(mut self, value: impl Into<Value>) -> Self {
        self.return_value = Some(value.into());
        self
    }

    pub fn on_true(mut self, node: FlowNode) -> Self {
        self.on_true.push(node);
        self
    }

    pub fn on_false(mut self, node: FlowNode) -> Self {
        self.on_false.push(node);
        self
    }

    pub fn kind(&self) -> Result<NodeKind, NodeError> {
        NodeKind::parse(&self.node_type)
    }

    /// Branch value for a policy verdict.
    ///
    /// An unset `returnValue` or a literal `true` passes the verdict through;
    /// anything else forces `false`.
    pub fn effective_result(&self, verdict: bool) -> bool {
        match &self.return_value {
            None => verdict,
            Some(v) if v.is_true() => verdict,
            Some(_) => false,
        }
    }

    /// Number of nodes in this subtree, including this one
    pub fn subtree_size(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.on_true.iter());
            pending.extend(node.on_false.iter());
        }
        count
    }
}

/// Children are released with a work list so deep chains do not exhaust the stack.
impl Drop for FlowNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.on_true);
        pending.append(&mut self.on_false);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.on_true);
            pending.append(&mut node.on_false);
        }
    }
}

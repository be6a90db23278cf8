use crate::{NodeId, Payload, PolicyContent, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Selector value marking a synthesized custom-node verdict
pub const CUSTOM_RESPONSE_SELECTOR: &str = "custom_response";

/// Structured result of evaluating one policy on the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineVerdict {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub trace: Payload,
    #[serde(default, rename = "rule")]
    pub rule_text: Vec<String>,
    #[serde(default)]
    pub data: Payload,
    #[serde(default)]
    pub error: Payload,
}

impl EngineVerdict {
    pub fn new(result: bool) -> Self {
        Self {
            result,
            ..Self::default()
        }
    }

    /// Verdict recorded for a custom node: always true, outcome wrapped in a
    /// single execution step.
    pub fn custom(outcome: &str, data: &Payload) -> Self {
        Self {
            result: true,
            trace: json!({
                "execution": [{
                    "conditions": [],
                    "outcome": { "value": outcome },
                    "result": true,
                    "selector": { "value": CUSTOM_RESPONSE_SELECTOR },
                }]
            }),
            rule_text: vec![format!("Custom response: {}", outcome)],
            data: data.clone(),
            error: Payload::Null,
        }
    }

    /// Outcome value embedded in the first execution step, if any
    pub fn outcome_value(&self) -> Option<&Payload> {
        self.trace
            .get("execution")?
            .get(0)?
            .get("outcome")?
            .get("value")
    }
}

/// A policy with the caller's data bound to it, as submitted to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub rule: String,
    pub data: Payload,
    #[serde(default)]
    pub schema: Payload,
    #[serde(default)]
    pub tests: Payload,
}

impl BoundPolicy {
    /// Copy `content` and replace its authoring data with `data`
    pub fn bind(id: Option<String>, content: &PolicyContent, data: &Payload) -> Self {
        Self {
            id,
            name: content.name.clone(),
            rule: content.rule.clone(),
            data: data.clone(),
            schema: content.data_model.clone(),
            tests: content.tests.clone(),
        }
    }
}

/// One visited node in a flow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTraceEntry {
    pub node_id: NodeId,
    pub node_type: String,
    pub response: EngineVerdict,
}

/// Final value of a flow run plus every visited node in visitation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    pub result: Option<Value>,
    #[serde(rename = "nodeResponse")]
    pub trace: Vec<NodeTraceEntry>,
}

impl FlowResult {
    pub fn node_ids(&self) -> Vec<&str> {
        self.trace.iter().map(|e| e.node_id.as_str()).collect()
    }
}

// Shared fixtures for the runtime integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use orchadapters::InMemoryRepository;
use orchcore::{
    BoundPolicy, EngineError, EngineVerdict, FlowContent, Payload, PolicyContent, PolicyInvoker,
    Record,
};
use orchruntime::{Orchestrator, RuntimeConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// How the scripted engine answers for one policy id
#[derive(Debug, Clone)]
pub enum Answer {
    Verdict(bool),
    Unavailable,
    /// Never answers
    Hang,
}

/// Policy invoker that answers from a script and records every call
#[derive(Default)]
pub struct ScriptedInvoker {
    answers: HashMap<String, Answer>,
    calls: Mutex<Vec<(String, Payload)>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, policy_id: &str, answer: Answer) -> Self {
        self.answers.insert(policy_id.to_string(), answer);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn called_ids(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn data_seen(&self) -> Vec<Payload> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, data)| data.clone())
            .collect()
    }
}

#[async_trait]
impl PolicyInvoker for ScriptedInvoker {
    async fn invoke(&self, policy: &BoundPolicy) -> Result<EngineVerdict, EngineError> {
        let id = policy.id.clone().unwrap_or_default();
        self.calls
            .lock()
            .unwrap()
            .push((id.clone(), policy.data.clone()));

        match self.answers.get(&id).cloned().unwrap_or(Answer::Verdict(true)) {
            Answer::Verdict(result) => Ok(EngineVerdict {
                data: policy.data.clone(),
                rule_text: vec![policy.rule.clone()],
                ..EngineVerdict::new(result)
            }),
            Answer::Unavailable => Err(EngineError::Transport {
                endpoint: "http://engine.test/run".to_string(),
                message: "connection refused".to_string(),
            }),
            Answer::Hang => std::future::pending().await,
        }
    }
}

pub async fn seeded_policies(ids: &[&str]) -> Arc<InMemoryRepository<PolicyContent>> {
    let repo = Arc::new(InMemoryRepository::new());
    repo.seed(ids.iter().map(|id| {
        Record::new_draft(PolicyContent::new(*id, format!("rule for {}", id))).with_id(*id)
    }))
    .await;
    repo
}

pub async fn orchestrator(invoker: Arc<ScriptedInvoker>, policy_ids: &[&str]) -> Orchestrator {
    orchestrator_with_config(invoker, policy_ids, RuntimeConfig::default()).await
}

pub async fn orchestrator_with_config(
    invoker: Arc<ScriptedInvoker>,
    policy_ids: &[&str],
    config: RuntimeConfig,
) -> Orchestrator {
    let policies = seeded_policies(policy_ids).await;
    let flows = Arc::new(InMemoryRepository::<FlowContent>::new());
    Orchestrator::with_config(policies, flows, invoker, config)
}

mod common;

use common::{orchestrator, Answer, ScriptedInvoker};
use orchcore::{Error, FlowContent, PolicyContent, Status, Value};
use serde_json::json;
use std::sync::Arc;

const LICENCE_FLOW_YAML: &str = r#"
flow:
  start:
    - id: A
      type: start
      policyId: p1
      onTrue:
        - id: R1
          type: return
          returnValue: granted
      onFalse:
        - id: R2
          type: return
          returnValue: denied
metadata:
  totalNodes: 3
  totalEdges: 2
"#;

#[tokio::test]
async fn test_ad_hoc_yaml_flow() {
    let invoker = Arc::new(ScriptedInvoker::new().answer("p1", Answer::Verdict(true)));
    let orch = orchestrator(invoker, &["p1"]).await;

    let result = orch
        .run_ad_hoc_flow(LICENCE_FLOW_YAML, &json!({"Person": {"age": 18}}))
        .await
        .unwrap();

    assert_eq!(result.result, Some(Value::from("granted")));
    assert_eq!(result.node_ids(), vec!["A"]);
    assert_eq!(result.trace[0].node_type, "start");
}

#[tokio::test]
async fn test_ad_hoc_json_flow() {
    let invoker = Arc::new(ScriptedInvoker::new().answer("p1", Answer::Verdict(false)));
    let orch = orchestrator(invoker, &["p1"]).await;

    let text = json!({
        "roots": [{
            "id": "A",
            "type": "policy",
            "policyRef": "p1",
            "onFalse": [{"id": "R2", "type": "return", "returnValue": false}]
        }]
    })
    .to_string();

    let result = orch.run_ad_hoc_flow(&text, &json!({})).await.unwrap();
    assert_eq!(result.result, Some(Value::Bool(false)));
}

#[tokio::test]
async fn test_ad_hoc_flow_rejects_malformed_text() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let orch = orchestrator(invoker.clone(), &["p1"]).await;

    let err = orch
        .run_ad_hoc_flow("{ not a flow", &json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation { ref field, .. } if field == "flow"));
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test]
async fn test_stored_flow_lifecycle() {
    let invoker = Arc::new(ScriptedInvoker::new().answer("p1", Answer::Verdict(false)));
    let orch = orchestrator(invoker, &["p1"]).await;

    let draft = orch
        .create_flow_draft(FlowContent::new("licence flow", LICENCE_FLOW_YAML))
        .await
        .unwrap();
    assert_eq!(draft.status, Status::Draft);

    let published = orch
        .flows()
        .publish(&draft.base_id, "1.0", None)
        .await
        .unwrap();
    assert_eq!(published.version.as_deref(), Some("v1.0"));

    let result = orch
        .run_stored_flow(&published.id, &json!({}))
        .await
        .unwrap();
    assert_eq!(result.result, Some(Value::from("denied")));
}

#[tokio::test]
async fn test_invalid_flow_draft_rejected() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let orch = orchestrator(invoker, &[]).await;

    let err = orch
        .create_flow_draft(FlowContent::new("broken", "flow: [unterminated"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let summaries = orch.flows().list_all().await.unwrap();
    assert!(summaries.is_empty(), "nothing is stored for an invalid draft");
}

#[tokio::test]
async fn test_invalid_flow_update_keeps_draft() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let orch = orchestrator(invoker, &[]).await;

    let draft = orch
        .create_flow_draft(FlowContent::new("licence flow", LICENCE_FLOW_YAML))
        .await
        .unwrap();

    let duplicate_ids = r#"{"roots": [{"id": "A", "type": "return"}, {"id": "A", "type": "return"}]}"#;
    let err = orch
        .update_flow_draft(&draft.base_id, FlowContent::new("licence flow", duplicate_ids))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let stored = orch.flows().load(&draft.id).await.unwrap();
    assert_eq!(stored.content.flow, LICENCE_FLOW_YAML);
}

#[tokio::test]
async fn test_stored_flow_errors_carry_flow_id() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let orch = orchestrator(invoker, &[]).await;

    let draft = orch
        .flows()
        .create_draft(FlowContent::new("orphan", LICENCE_FLOW_YAML))
        .await
        .unwrap();

    let err = orch.run_stored_flow(&draft.id, &json!({})).await.unwrap_err();
    match &err {
        Error::Flow {
            flow_id, node_id, ..
        } => {
            assert_eq!(flow_id.as_deref(), Some(draft.id.as_str()));
            assert_eq!(node_id, "A");
        }
        other => panic!("Expected flow error, got {:?}", other),
    }
    assert!(err.is_not_found(), "policy p1 was never stored");
}

#[tokio::test]
async fn test_unknown_stored_flow() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let orch = orchestrator(invoker, &[]).await;

    let err = orch.run_stored_flow("missing", &json!({})).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_run_unsaved_policy() {
    let invoker = Arc::new(ScriptedInvoker::new().answer("", Answer::Verdict(false)));
    let orch = orchestrator(invoker.clone(), &[]).await;
    let content = PolicyContent::new("adhoc", "A **Person** passes if ...");

    let verdict = orch
        .run_policy(&content, &json!({"Person": {"age": 12}}))
        .await
        .unwrap();

    assert!(!verdict.result);
    assert_eq!(verdict.rule_text, vec!["A **Person** passes if ..."]);
    assert_eq!(invoker.data_seen(), vec![json!({"Person": {"age": 12}})]);
}

#[tokio::test]
async fn test_run_stored_policy() {
    let invoker = Arc::new(ScriptedInvoker::new().answer("p1", Answer::Verdict(true)));
    let orch = orchestrator(invoker.clone(), &["p1"]).await;

    let verdict = orch
        .run_stored_policy("p1", &json!({"Person": {"age": 40}}))
        .await
        .unwrap();
    assert!(verdict.result);
    assert_eq!(invoker.called_ids(), vec!["p1"]);

    let err = orch
        .run_stored_policy("ghost", &json!({}))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_run_policy_engine_unavailable() {
    let invoker = Arc::new(ScriptedInvoker::new().answer("p1", Answer::Unavailable));
    let orch = orchestrator(invoker, &["p1"]).await;

    let err = orch.run_stored_policy("p1", &json!({})).await.unwrap_err();
    assert!(err.is_engine_unavailable());
}

#[tokio::test]
async fn test_policy_lineage_through_orchestrator() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let orch = orchestrator(invoker, &[]).await;

    let draft = orch
        .policies()
        .create_draft(PolicyContent::new("licence", "rule v1"))
        .await
        .unwrap();
    orch.policies()
        .update_draft(&draft.base_id, PolicyContent::new("licence", "rule v2"))
        .await
        .unwrap();
    let v1 = orch
        .policies()
        .publish(&draft.base_id, "1", Some("initial".to_string()))
        .await
        .unwrap();
    assert_eq!(v1.content.rule, "rule v2");

    let err = orch
        .policies()
        .publish(&draft.base_id, "2", None)
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "no draft left to publish");

    let next = orch.policies().draft_from_version(&v1.id).await.unwrap();
    let versions = orch.policies().list_versions(&draft.base_id).await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].id, next.id);
}

use orchcore::{
    BoundPolicy, EngineError, EngineVerdict, Error, EventBus, ExecutionEvent, ExecutionId,
    FlowDefinition, FlowNode, FlowResult, NodeError, NodeKind, NodeTraceEntry, Payload,
    PolicyInvoker, PolicyRepository, Value,
};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-run context threaded through a traversal
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub execution_id: ExecutionId,
    /// Identifier of the stored flow, when the run came from one
    pub flow_id: Option<String>,
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(flow_id: Option<String>, cancellation: CancellationToken) -> Self {
        Self {
            execution_id: ExecutionId::new_v4(),
            flow_id,
            cancellation,
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(None, CancellationToken::new())
    }
}

/// What visiting one node yields
enum Step<'a> {
    /// Subtree finished with this value (`None` is a null result)
    Done(Option<Value>),
    /// Run `children` in order; `fallback` stands if none produces a value
    Descend {
        fallback: Value,
        children: Vec<&'a FlowNode>,
    },
}

/// A node whose children are still being executed
struct Branch<'a> {
    children: std::vec::IntoIter<&'a FlowNode>,
    result: Option<Value>,
}

/// Walks flow trees, evaluating policy nodes on the engine
pub struct FlowExecutor {
    policies: Arc<PolicyRepository>,
    invoker: Arc<dyn PolicyInvoker>,
}

impl FlowExecutor {
    pub fn new(policies: Arc<PolicyRepository>, invoker: Arc<dyn PolicyInvoker>) -> Self {
        Self { policies, invoker }
    }

    /// Execute every root in order.
    ///
    /// The trace accumulates across roots; the result is that of the last
    /// root. Any node failure aborts the run and no partial result is
    /// returned.
    pub async fn execute(
        &self,
        definition: &FlowDefinition,
        data: &Payload,
        ctx: &ExecutionContext,
        event_bus: &EventBus,
    ) -> Result<FlowResult, Error> {
        let start_time = Instant::now();

        event_bus.emit(ExecutionEvent::FlowStarted {
            execution_id: ctx.execution_id,
            flow_id: ctx.flow_id.clone(),
            roots: definition.roots.len(),
            timestamp: Utc::now(),
        });

        tracing::info!(
            execution_id = %ctx.execution_id,
            flow_id = ctx.flow_id.as_deref().unwrap_or("<ad-hoc>"),
            "Starting flow execution with {} root(s)",
            definition.roots.len()
        );

        let result = self.execute_roots(definition, data, ctx, event_bus).await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let visited_nodes = result.as_ref().map(|r| r.trace.len()).unwrap_or(0);

        event_bus.emit(ExecutionEvent::FlowCompleted {
            execution_id: ctx.execution_id,
            success: result.is_ok(),
            visited_nodes,
            duration_ms,
            timestamp: Utc::now(),
        });

        match &result {
            Ok(_) => tracing::info!(
                execution_id = %ctx.execution_id,
                "Flow completed in {}ms, {} node(s) traced",
                duration_ms,
                visited_nodes
            ),
            Err(e) => tracing::error!(execution_id = %ctx.execution_id, "Flow failed: {}", e),
        }

        result
    }

    async fn execute_roots(
        &self,
        definition: &FlowDefinition,
        data: &Payload,
        ctx: &ExecutionContext,
        event_bus: &EventBus,
    ) -> Result<FlowResult, Error> {
        let mut flow_result = FlowResult::default();

        for root in &definition.roots {
            let mut trace = Vec::new();
            let result = self.execute_tree(root, data, ctx, event_bus, &mut trace).await?;

            flow_result.trace.extend(trace);
            // Last root wins.
            flow_result.result = result;
        }

        Ok(flow_result)
    }

    /// Depth-first, left-to-right walk of one root using an explicit stack
    async fn execute_tree<'a>(
        &self,
        root: &'a FlowNode,
        data: &Payload,
        ctx: &ExecutionContext,
        event_bus: &EventBus,
        trace: &mut Vec<NodeTraceEntry>,
    ) -> Result<Option<Value>, Error> {
        let mut stack: Vec<Branch<'a>> = Vec::new();
        let mut finished = self.enter(root, data, ctx, event_bus, trace, &mut stack).await?;

        loop {
            if let Some(result) = finished.take() {
                let Some(parent) = stack.last_mut() else {
                    return Ok(result);
                };
                // Null child results leave the parent's value alone.
                if result.is_some() {
                    parent.result = result;
                }
            }

            let Some(parent) = stack.last_mut() else {
                return Ok(None);
            };

            match parent.children.next() {
                Some(child) => {
                    finished = self.enter(child, data, ctx, event_bus, trace, &mut stack).await?;
                }
                None => {
                    finished = stack.pop().map(|branch| branch.result);
                }
            }
        }
    }

    /// Visit `node`. Returns its result if the subtree is already finished,
    /// or `None` after pushing a branch for its children.
    async fn enter<'a>(
        &self,
        node: &'a FlowNode,
        data: &Payload,
        ctx: &ExecutionContext,
        event_bus: &EventBus,
        trace: &mut Vec<NodeTraceEntry>,
        stack: &mut Vec<Branch<'a>>,
    ) -> Result<Option<Option<Value>>, Error> {
        let step = match self.visit(node, data, ctx, event_bus, trace).await {
            Ok(step) => step,
            Err(NodeError::Cancelled) | Err(NodeError::Engine(EngineError::Cancelled)) => {
                tracing::warn!(node_id = %node.id, "Flow cancelled before node {} finished", node.id);
                return Err(Error::Cancelled);
            }
            Err(source) => {
                tracing::error!(node_id = %node.id, "Node {} failed: {}", node.id, source);
                event_bus.emit(ExecutionEvent::NodeFailed {
                    execution_id: ctx.execution_id,
                    node_id: node.id.clone(),
                    error: source.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(Error::Flow {
                    flow_id: ctx.flow_id.clone(),
                    node_id: node.id.clone(),
                    source,
                });
            }
        };

        match step {
            Step::Done(result) => Ok(Some(result)),
            Step::Descend { fallback, children } if children.is_empty() => {
                Ok(Some(Some(fallback)))
            }
            Step::Descend { fallback, children } => {
                stack.push(Branch {
                    children: children.into_iter(),
                    result: Some(fallback),
                });
                Ok(None)
            }
        }
    }

    async fn visit<'a>(
        &self,
        node: &'a FlowNode,
        data: &Payload,
        ctx: &ExecutionContext,
        event_bus: &EventBus,
        trace: &mut Vec<NodeTraceEntry>,
    ) -> Result<Step<'a>, NodeError> {
        if ctx.cancellation.is_cancelled() {
            return Err(NodeError::Cancelled);
        }

        let kind = node.kind()?;
        tracing::debug!(node_id = %node.id, node_type = kind.as_str(), "Visiting node");

        match kind {
            NodeKind::Start | NodeKind::Policy => {
                let verdict = self.evaluate_policy(node, data, ctx).await?;
                let effective = node.effective_result(verdict.result);

                trace.push(NodeTraceEntry {
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                    response: verdict,
                });
                emit_visited(event_bus, ctx, node, effective);

                let branch = if effective { &node.on_true } else { &node.on_false };
                Ok(Step::Descend {
                    fallback: Value::Bool(effective),
                    children: branch.iter().collect(),
                })
            }

            NodeKind::Return => Ok(Step::Done(node.return_value.clone())),

            NodeKind::Custom => {
                let outcome = node.outcome.as_deref().ok_or(NodeError::MissingOutcome)?;

                trace.push(NodeTraceEntry {
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                    response: EngineVerdict::custom(outcome, data),
                });
                emit_visited(event_bus, ctx, node, true);

                // Custom nodes continue unconditionally through both lists.
                Ok(Step::Descend {
                    fallback: Value::String(outcome.to_string()),
                    children: node.on_true.iter().chain(node.on_false.iter()).collect(),
                })
            }
        }
    }

    async fn evaluate_policy(
        &self,
        node: &FlowNode,
        data: &Payload,
        ctx: &ExecutionContext,
    ) -> Result<EngineVerdict, NodeError> {
        if node.policy_ref.is_empty() {
            return Err(NodeError::MissingPolicyReference);
        }

        let record = cancellable(&ctx.cancellation, self.policies.load(&node.policy_ref))
            .await?
            .map_err(|source| NodeError::Policy {
                policy_id: node.policy_ref.clone(),
                source,
            })?;

        let policy = BoundPolicy::bind(Some(record.id.clone()), &record.content, data);

        let verdict = cancellable(&ctx.cancellation, self.invoker.invoke(&policy)).await??;

        tracing::debug!(
            node_id = %node.id,
            policy_id = %node.policy_ref,
            result = verdict.result,
            "Policy evaluated"
        );

        Ok(verdict)
    }
}

fn emit_visited(event_bus: &EventBus, ctx: &ExecutionContext, node: &FlowNode, effective: bool) {
    event_bus.emit(ExecutionEvent::NodeVisited {
        execution_id: ctx.execution_id,
        node_id: node.id.clone(),
        node_type: node.node_type.clone(),
        effective_result: effective,
        timestamp: Utc::now(),
    });
}

/// Race `fut` against cancellation of `token`
async fn cancellable<F: Future>(token: &CancellationToken, fut: F) -> Result<F::Output, NodeError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(NodeError::Cancelled),
        output = fut => Ok(output),
    }
}

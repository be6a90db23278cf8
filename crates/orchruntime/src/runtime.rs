use crate::{ExecutionContext, FlowExecutor, Lifecycle};
use orchcore::{
    BoundPolicy, EngineVerdict, Error, EventBus, ExecutionEvent, FlowContent, FlowDefinition,
    FlowDocument, FlowRecord, FlowRepository, FlowResult, Payload, PolicyContent, PolicyInvoker,
    PolicyRepository,
};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

/// Entry point for running flows and managing policy/flow lineages
pub struct Orchestrator {
    executor: Arc<FlowExecutor>,
    invoker: Arc<dyn PolicyInvoker>,
    policies: Arc<PolicyRepository>,
    flows: Arc<FlowRepository>,
    event_bus: Arc<EventBus>,
    config: RuntimeConfig,
}

impl Orchestrator {
    /// Create an orchestrator with default settings
    pub fn new(
        policies: Arc<PolicyRepository>,
        flows: Arc<FlowRepository>,
        invoker: Arc<dyn PolicyInvoker>,
    ) -> Self {
        Self::with_config(policies, flows, invoker, RuntimeConfig::default())
    }

    pub fn with_config(
        policies: Arc<PolicyRepository>,
        flows: Arc<FlowRepository>,
        invoker: Arc<dyn PolicyInvoker>,
        config: RuntimeConfig,
    ) -> Self {
        let executor = Arc::new(FlowExecutor::new(policies.clone(), invoker.clone()));
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        Self {
            executor,
            invoker,
            policies,
            flows,
            event_bus,
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Lifecycle operations on policy lineages
    pub fn policies(&self) -> Lifecycle<'_, PolicyContent> {
        Lifecycle::new(self.policies.as_ref(), "policy")
    }

    /// Lifecycle operations on flow lineages; drafts must hold a parseable flow
    pub fn flows(&self) -> Lifecycle<'_, FlowContent> {
        Lifecycle::new(self.flows.as_ref(), "flow").with_validator(|content| {
            content.document().map(|_| ())
        })
    }

    /// Start a flow lineage; the definition text must parse
    pub async fn create_flow_draft(&self, content: FlowContent) -> Result<FlowRecord, Error> {
        self.flows().create_draft(content).await
    }

    pub async fn update_flow_draft(
        &self,
        base_id: &str,
        content: FlowContent,
    ) -> Result<FlowRecord, Error> {
        self.flows().update_draft(base_id, content).await
    }

    /// Execute an already-parsed flow definition
    pub async fn run_flow(
        &self,
        definition: &FlowDefinition,
        data: &Payload,
    ) -> Result<FlowResult, Error> {
        self.run_flow_with_cancel(definition, data, CancellationToken::new())
            .await
    }

    pub async fn run_flow_with_cancel(
        &self,
        definition: &FlowDefinition,
        data: &Payload,
        cancellation: CancellationToken,
    ) -> Result<FlowResult, Error> {
        let ctx = ExecutionContext::new(None, cancellation);
        self.execute(definition, data, &ctx).await
    }

    /// Parse `definition_text` (YAML or JSON) and execute it
    pub async fn run_ad_hoc_flow(
        &self,
        definition_text: &str,
        data: &Payload,
    ) -> Result<FlowResult, Error> {
        self.run_ad_hoc_flow_with_cancel(definition_text, data, CancellationToken::new())
            .await
    }

    pub async fn run_ad_hoc_flow_with_cancel(
        &self,
        definition_text: &str,
        data: &Payload,
        cancellation: CancellationToken,
    ) -> Result<FlowResult, Error> {
        let document = FlowDocument::parse(definition_text)?;
        let ctx = ExecutionContext::new(None, cancellation);
        self.execute(&document.flow, data, &ctx).await
    }

    /// Load a stored flow record by id and execute its definition
    pub async fn run_stored_flow(&self, flow_id: &str, data: &Payload) -> Result<FlowResult, Error> {
        self.run_stored_flow_with_cancel(flow_id, data, CancellationToken::new())
            .await
    }

    pub async fn run_stored_flow_with_cancel(
        &self,
        flow_id: &str,
        data: &Payload,
        cancellation: CancellationToken,
    ) -> Result<FlowResult, Error> {
        let record = self.flows().load(flow_id).await?;
        let definition = record.content.definition()?;
        let ctx = ExecutionContext::new(Some(record.id.clone()), cancellation);
        self.execute(&definition, data, &ctx).await
    }

    /// Evaluate an unsaved policy against `data`
    pub async fn run_policy(
        &self,
        content: &PolicyContent,
        data: &Payload,
    ) -> Result<EngineVerdict, Error> {
        let policy = BoundPolicy::bind(None, content, data);
        self.deadline(async { self.invoker.invoke(&policy).await.map_err(Error::from) })
            .await
    }

    /// Load a stored policy, bind `data` and evaluate it
    pub async fn run_stored_policy(
        &self,
        policy_id: &str,
        data: &Payload,
    ) -> Result<EngineVerdict, Error> {
        let record = self.policies().load(policy_id).await?;
        let policy = BoundPolicy::bind(Some(record.id.clone()), &record.content, data);
        self.deadline(async { self.invoker.invoke(&policy).await.map_err(Error::from) })
            .await
    }

    async fn execute(
        &self,
        definition: &FlowDefinition,
        data: &Payload,
        ctx: &ExecutionContext,
    ) -> Result<FlowResult, Error> {
        let result = self
            .deadline(self.executor.execute(definition, data, ctx, &self.event_bus))
            .await;

        if matches!(result, Err(Error::Timeout { .. })) {
            ctx.cancellation.cancel();
        }
        result
    }

    /// Apply the configured execution deadline, if any
    async fn deadline<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        match self.config.max_execution_time_ms {
            Some(ms) => match timeout(Duration::from_millis(ms), fut).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("Execution exceeded {}ms deadline", ms);
                    Err(Error::Timeout { ms })
                }
            },
            None => fut.await,
        }
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Deadline for a single run; `None` means no limit
    pub max_execution_time_ms: Option<u64>,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_execution_time_ms: None,
            event_buffer_size: 1000,
        }
    }
}

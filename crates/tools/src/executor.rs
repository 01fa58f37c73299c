//! Tool execution engine.
//!
//! Turns a batch of model-issued tool calls into execution records: resolve
//! each call against the agent's active tools, parse its arguments, pick the
//! backend for the tool's kind, invoke it and audit the outcome. A bad call
//! degrades to a failed record; the batch itself never fails.

use parley_core::agent::Agent;
use parley_core::message::SessionId;
use parley_core::tool::{
    ExecutionLog, RecordOrigin, Tool, ToolBackend, ToolCall, ToolExecutionRecord, ToolKind,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use crate::registry::BackendRegistry;

/// Why a call could not be turned into an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreparationError {
    #[error("Tool '{name}' not found or not assigned to this agent")]
    UnknownTool { name: String },

    #[error("No provider found for tool type: {kind}")]
    NoBackend { kind: ToolKind },
}

/// A call that is ready to be invoked.
pub struct PreparedCall {
    pub tool: Tool,
    pub parameters: Map<String, Value>,
    pub backend: Arc<dyn ToolBackend>,
}

/// Executes tool-call batches for turns.
pub struct ToolExecutor {
    backends: BackendRegistry,
    log: Arc<dyn ExecutionLog>,
}

impl ToolExecutor {
    pub fn new(backends: BackendRegistry, log: Arc<dyn ExecutionLog>) -> Self {
        Self { backends, log }
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    /// Execute every call in order, producing exactly one record per call.
    pub async fn execute_batch(
        &self,
        calls: &[ToolCall],
        agent: &Agent,
        session_id: &SessionId,
    ) -> Vec<ToolExecutionRecord> {
        let mut records = Vec::with_capacity(calls.len());
        for call in calls {
            records.push(self.execute_one(call, agent, session_id).await);
        }
        records
    }

    /// Resolve a call to a tool, parameters and backend.
    pub fn prepare(
        &self,
        call: &ToolCall,
        agent: &Agent,
    ) -> Result<PreparedCall, PreparationError> {
        let tool = agent
            .find_tool(&call.name)
            .ok_or_else(|| PreparationError::UnknownTool {
                name: call.name.clone(),
            })?;
        let parameters = parse_arguments(&call.arguments);
        let backend = self
            .backends
            .get(tool.kind)
            .ok_or(PreparationError::NoBackend { kind: tool.kind })?;

        Ok(PreparedCall {
            tool: tool.clone(),
            parameters,
            backend,
        })
    }

    async fn execute_one(
        &self,
        call: &ToolCall,
        agent: &Agent,
        session_id: &SessionId,
    ) -> ToolExecutionRecord {
        let mut origin = RecordOrigin {
            call_id: call.id.clone(),
            tool_id: None,
            tool_name: call.name.clone(),
            session_id: session_id.clone(),
            agent_id: agent.id.clone(),
        };

        let prepared = match self.prepare(call, agent) {
            Ok(prepared) => prepared,
            Err(e) => {
                debug!(tool = %call.name, error = %e, "Tool call could not be prepared");
                return ToolExecutionRecord::failed(
                    origin,
                    parse_arguments(&call.arguments),
                    e.to_string(),
                    0,
                );
            }
        };
        origin.tool_id = Some(prepared.tool.id.clone());
        origin.tool_name = prepared.tool.name.clone();

        let start = Instant::now();
        let outcome = prepared
            .backend
            .execute(&prepared.tool, &prepared.parameters)
            .await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let record = match outcome {
            Ok(result) => {
                debug!(tool = %prepared.tool.name, duration_ms, "Tool executed");
                ToolExecutionRecord::succeeded(origin, prepared.parameters, result, duration_ms)
            }
            Err(e) => {
                warn!(tool = %prepared.tool.name, error = %e, duration_ms, "Tool execution failed");
                ToolExecutionRecord::failed(origin, prepared.parameters, e.to_string(), duration_ms)
            }
        };

        if let Err(e) = self.log.record(&record).await {
            warn!(tool = %record.tool_name, error = %e, "Failed to write tool execution log");
        }
        record
    }
}

/// Parse a raw argument string. Anything that is not a JSON object (including
/// malformed or empty input) yields an empty map.
pub fn parse_arguments(raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            if !raw.trim().is_empty() {
                debug!(arguments = raw, "Tool arguments are not a JSON object, using empty map");
            }
            Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::agent::{LlmBinding, Prompt};
    use parley_core::error::{StoreError, ToolError};
    use parley_store::InMemoryExecutionLog;

    /// Returns its parameters, or fails when asked to.
    struct EchoBackend;

    #[async_trait]
    impl ToolBackend for EchoBackend {
        fn kind(&self) -> ToolKind {
            ToolKind::Native
        }

        async fn execute(
            &self,
            tool: &Tool,
            params: &Map<String, Value>,
        ) -> Result<Value, ToolError> {
            if params.contains_key("fail") {
                return Err(ToolError::ExecutionFailed {
                    tool_name: tool.name.clone(),
                    reason: "asked to fail".into(),
                });
            }
            Ok(Value::Object(params.clone()))
        }
    }

    struct BrokenLog;

    #[async_trait]
    impl ExecutionLog for BrokenLog {
        async fn record(&self, _record: &ToolExecutionRecord) -> Result<(), StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }
    }

    fn tool(name: &str, kind: ToolKind, active: bool) -> Tool {
        Tool {
            id: format!("bot:tool:{name}"),
            name: name.into(),
            description: String::new(),
            kind,
            active,
            parameters_schema: "{}".into(),
        }
    }

    fn agent() -> Agent {
        Agent {
            id: "bot".into(),
            name: "Bot".into(),
            prompts: vec![Prompt {
                id: "p".into(),
                content: "sys".into(),
                active: true,
            }],
            tools: vec![
                tool("echo", ToolKind::Native, true),
                tool("remote", ToolKind::Mcp, true),
                tool("retired", ToolKind::Native, false),
            ],
            llm: LlmBinding {
                model: "mock".into(),
                temperature: 0.7,
                max_tokens: None,
            },
        }
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn executor(log: Arc<dyn ExecutionLog>) -> ToolExecutor {
        ToolExecutor::new(BackendRegistry::new().with(Arc::new(EchoBackend)), log)
    }

    #[test]
    fn parse_arguments_is_lenient() {
        assert_eq!(parse_arguments(r#"{"city":"Paris"}"#)["city"], "Paris");
        assert!(parse_arguments("").is_empty());
        assert!(parse_arguments("{\"city\": \"Par").is_empty());
        assert!(parse_arguments("[1, 2]").is_empty());
        assert!(parse_arguments("42").is_empty());
    }

    #[tokio::test]
    async fn bad_call_does_not_affect_neighbours() {
        let log = Arc::new(InMemoryExecutionLog::new());
        let exec = executor(log.clone());
        let calls = vec![
            call("c1", "echo", r#"{"n":1}"#),
            call("c2", "does_not_exist", "{}"),
            call("c3", "echo", r#"{"n":3}"#),
        ];

        let records = exec.execute_batch(&calls, &agent(), &SessionId::from("s")).await;

        assert_eq!(records.len(), 3);
        assert!(records[0].success);
        assert!(!records[1].success);
        assert!(records[2].success);
        assert_eq!(
            records[1].error.as_deref(),
            Some("Tool 'does_not_exist' not found or not assigned to this agent")
        );
        assert_eq!(records[1].tool_id, None);
        let ids: Vec<_> = records.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);

        // Only invoked calls reach the execution log.
        let logged: Vec<_> = log.records().into_iter().map(|r| r.call_id).collect();
        assert_eq!(logged, vec!["c1", "c3"]);
    }

    #[tokio::test]
    async fn lookup_ignores_case_and_inactive_tools() {
        let exec = executor(Arc::new(InMemoryExecutionLog::new()));
        let records = exec
            .execute_batch(
                &[call("a", "ECHO", "{}"), call("b", "retired", "{}")],
                &agent(),
                &SessionId::from("s"),
            )
            .await;

        assert!(records[0].success);
        assert_eq!(records[0].tool_name, "echo");
        assert_eq!(records[0].tool_id.as_deref(), Some("bot:tool:echo"));
        assert!(!records[1].success);
    }

    #[tokio::test]
    async fn malformed_arguments_still_execute() {
        let exec = executor(Arc::new(InMemoryExecutionLog::new()));
        let records = exec
            .execute_batch(&[call("a", "echo", "{\"n\": ")], &agent(), &SessionId::from("s"))
            .await;

        assert!(records[0].success);
        assert!(records[0].parameters.is_empty());
        assert_eq!(records[0].result, Some(Value::Object(Map::new())));
    }

    #[tokio::test]
    async fn missing_backend_fails_preparation() {
        let exec = executor(Arc::new(InMemoryExecutionLog::new()));
        let err = exec.prepare(&call("a", "remote", "{}"), &agent()).err().unwrap();
        assert_eq!(
            err,
            PreparationError::NoBackend {
                kind: ToolKind::Mcp
            }
        );
        assert_eq!(err.to_string(), "No provider found for tool type: mcp");
    }

    #[tokio::test]
    async fn backend_error_becomes_failed_record() {
        let log = Arc::new(InMemoryExecutionLog::new());
        let exec = executor(log.clone());
        let records = exec
            .execute_batch(
                &[call("a", "echo", r#"{"fail":true}"#)],
                &agent(),
                &SessionId::from("s"),
            )
            .await;

        assert!(!records[0].success);
        assert!(records[0].error.as_deref().unwrap().contains("asked to fail"));
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn log_failure_does_not_fail_the_call() {
        let exec = executor(Arc::new(BrokenLog));
        let records = exec
            .execute_batch(&[call("a", "echo", "{}")], &agent(), &SessionId::from("s"))
            .await;
        assert!(records[0].success);
    }

    #[tokio::test]
    async fn runaway_calculator_input_fails_only_its_record() {
        let mut bot = agent();
        bot.tools.push(tool("calculator", ToolKind::Native, true));
        let exec =
            ToolExecutor::new(crate::default_backends(), Arc::new(InMemoryExecutionLog::new()));

        let nested = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        let arguments = serde_json::json!({ "expression": nested }).to_string();
        let records = exec
            .execute_batch(
                &[
                    call("a", "calculator", &arguments),
                    call("b", "calculator", r#"{"expression":"6 * 7"}"#),
                ],
                &bot,
                &SessionId::from("s"),
            )
            .await;

        assert!(!records[0].success);
        assert!(records[0].error.as_deref().unwrap().contains("Expression longer than"));
        assert!(records[1].success);
        assert_eq!(records[1].result, Some(Value::from("42")));
    }

    #[tokio::test]
    async fn empty_batch_yields_no_records() {
        let exec = executor(Arc::new(InMemoryExecutionLog::new()));
        let records = exec.execute_batch(&[], &agent(), &SessionId::from("s")).await;
        assert!(records.is_empty());
    }
}

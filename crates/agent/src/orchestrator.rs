//! Turn orchestrator — the control loop for one conversational turn.
//!
//! A turn persists the user message, then runs levels: compose a prompt,
//! stream the model, forward content to the caller as it arrives, execute
//! any tool calls the model issued and feed their summaries back as the next
//! level's content. The turn ends at the first level without tool calls (or
//! at the depth cap) and persists one assistant message for the whole turn.
//!
//! Every turn runs in its own task. Dropping the returned [`TurnStream`]
//! cancels it at the next suspension point.

use parley_config::OrchestratorConfig;
use parley_core::agent::{Agent, AgentDirectory, Prompt};
use parley_core::error::{Error, ModelError, StoreError};
use parley_core::message::{NewMessage, SessionId};
use parley_core::model::{ModelGateway, ModelRequest};
use parley_core::session::{DEFAULT_HISTORY_LIMIT, SessionStore};
use parley_core::tool::ToolExecutionRecord;
use parley_tools::ToolExecutor;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::aggregator::StreamAggregator;
use crate::prompt::{PromptInput, compose, preview};

/// Chunks of one turn: content fragments and in-band `"Error: ..."` notices
/// as `Ok`, a collaborator fault as a terminal `Err`.
pub type TurnStream = mpsc::Receiver<Result<String, Error>>;

/// Characters of the first user message used as a new session's title.
pub const SESSION_TITLE_CHARS: usize = 60;

/// Tunables for every turn run by an orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSettings {
    pub history_limit: usize,
    pub preview_chars: usize,
    /// Model calls allowed per turn before it is stopped.
    pub max_depth: u32,
    pub stream_buffer: usize,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            preview_chars: 200,
            max_depth: 8,
            stream_buffer: 64,
        }
    }
}

impl From<&OrchestratorConfig> for TurnSettings {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            history_limit: config.history_limit,
            preview_chars: config.preview_chars,
            max_depth: config.max_depth.max(1),
            stream_buffer: config.stream_buffer.max(1),
        }
    }
}

/// An inbound user message.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub agent_id: Option<String>,
    pub content: String,
    /// Continue this session; a new one is created when absent.
    pub session_id: Option<SessionId>,
    pub user_id: Option<String>,
}

impl TurnRequest {
    pub fn new(agent_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn in_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// The caller went away.
#[derive(Debug)]
struct Cancelled;

/// Why a turn stopped early.
enum Interrupt {
    Cancelled,
    Fault(Error),
}

impl From<Cancelled> for Interrupt {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<Error> for Interrupt {
    fn from(e: Error) -> Self {
        Self::Fault(e)
    }
}

impl From<ModelError> for Interrupt {
    fn from(e: ModelError) -> Self {
        Self::Fault(e.into())
    }
}

impl From<StoreError> for Interrupt {
    fn from(e: StoreError) -> Self {
        Self::Fault(e.into())
    }
}

/// The sending half of a turn, aware of whether anyone is still listening.
struct Sink {
    tx: mpsc::Sender<Result<String, Error>>,
}

impl Sink {
    async fn send(&self, chunk: String) -> Result<(), Cancelled> {
        self.tx.send(Ok(chunk)).await.map_err(|_| Cancelled)
    }

    /// Await `fut` unless the receiver is dropped first.
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        tokio::select! {
            biased;
            _ = self.tx.closed() => Err(Cancelled),
            out = fut => Ok(out),
        }
    }

    async fn fail(&self, error: Error) {
        // Nobody left to tell if the receiver is gone.
        let _ = self.tx.send(Err(error)).await;
    }
}

/// A fully resolved turn, ready to run.
struct Turn {
    agent: Arc<Agent>,
    prompt: Prompt,
    content: String,
    session_id: Option<SessionId>,
    carried: Vec<ToolExecutionRecord>,
}

/// Runs turns against an agent directory, a session store, a model gateway
/// and a tool executor.
#[derive(Clone)]
pub struct TurnOrchestrator {
    agents: Arc<dyn AgentDirectory>,
    sessions: Arc<dyn SessionStore>,
    model: Arc<dyn ModelGateway>,
    tools: Arc<ToolExecutor>,
    settings: TurnSettings,
}

impl TurnOrchestrator {
    pub fn new(
        agents: Arc<dyn AgentDirectory>,
        sessions: Arc<dyn SessionStore>,
        model: Arc<dyn ModelGateway>,
        tools: Arc<ToolExecutor>,
    ) -> Self {
        Self {
            agents,
            sessions,
            model,
            tools,
            settings: TurnSettings::default(),
        }
    }

    /// Replace the turn settings. Every turn may call the model at least once.
    pub fn with_settings(mut self, settings: TurnSettings) -> Self {
        self.settings = TurnSettings {
            max_depth: settings.max_depth.max(1),
            stream_buffer: settings.stream_buffer.max(1),
            ..settings
        };
        self
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    /// Validate and resolve an inbound message, then run the turn.
    pub fn send_turn(&self, request: TurnRequest) -> TurnStream {
        let (tx, rx) = mpsc::channel(self.settings.stream_buffer.max(1));
        let span = info_span!(
            "turn",
            agent_id = request.agent_id.as_deref().unwrap_or_default(),
            session_id = tracing::field::Empty,
            user_id = request.user_id.as_deref().unwrap_or_default(),
        );
        if let Some(id) = &request.session_id {
            span.record("session_id", id.as_str());
        }

        let this = self.clone();
        tokio::spawn(
            async move {
                let sink = Sink { tx };
                let outcome = match this.resolve(request, &sink).await {
                    Ok(Some(turn)) => this.execute(turn, &sink).await,
                    Ok(None) => Ok(()),
                    Err(interrupt) => Err(interrupt),
                };
                finish(outcome, &sink).await;
            }
            .instrument(span),
        );
        rx
    }

    /// Run a turn for an already resolved agent and prompt. `carried` records
    /// count as executed in this turn when the assistant message is persisted.
    pub fn run_turn(
        &self,
        agent: Arc<Agent>,
        prompt: Prompt,
        content: String,
        session_id: Option<SessionId>,
        carried: Vec<ToolExecutionRecord>,
    ) -> TurnStream {
        let (tx, rx) = mpsc::channel(self.settings.stream_buffer.max(1));
        let span = info_span!(
            "turn",
            agent_id = %agent.id,
            session_id = tracing::field::Empty,
            user_id = tracing::field::Empty,
        );
        if let Some(id) = &session_id {
            span.record("session_id", id.as_str());
        }

        let turn = Turn {
            agent,
            prompt,
            content,
            session_id,
            carried,
        };
        let this = self.clone();
        tokio::spawn(
            async move {
                let sink = Sink { tx };
                let outcome = this.execute(turn, &sink).await;
                finish(outcome, &sink).await;
            }
            .instrument(span),
        );
        rx
    }

    /// Validation and agent resolution. `Ok(None)` means an in-band error
    /// chunk was sent and the turn is over.
    async fn resolve(&self, request: TurnRequest, sink: &Sink) -> Result<Option<Turn>, Interrupt> {
        let Some(agent_id) = request
            .agent_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            sink.send("Error: Agent ID is required".into()).await?;
            return Ok(None);
        };
        if request.content.trim().is_empty() {
            sink.send("Error: Message content is required".into()).await?;
            return Ok(None);
        }

        let Some(agent) = sink.guard(self.agents.get_agent(agent_id)).await?? else {
            debug!(agent_id, "Agent not found");
            sink.send("Error: Agent not found".into()).await?;
            return Ok(None);
        };
        let Some(prompt) = agent.active_prompt().cloned() else {
            debug!(agent_id, "Agent has no active prompt");
            sink.send("Error: Agent has no active prompt".into()).await?;
            return Ok(None);
        };

        Ok(Some(Turn {
            agent: Arc::new(agent),
            prompt,
            content: request.content,
            session_id: request.session_id,
            carried: Vec::new(),
        }))
    }

    async fn execute(&self, turn: Turn, sink: &Sink) -> Result<(), Interrupt> {
        let Turn {
            agent,
            prompt,
            content,
            session_id,
            carried,
        } = turn;

        let session_id = match session_id {
            Some(id) => id,
            None => {
                let title = preview(&content, SESSION_TITLE_CHARS);
                sink.guard(self.sessions.ensure_session(&agent.id, Some(title)))
                    .await??
            }
        };
        Span::current().record("session_id", session_id.as_str());
        info!(model = %agent.llm.model, "Turn started");

        sink.guard(
            self.sessions
                .append_message(&session_id, NewMessage::user(content.clone())),
        )
        .await??;

        let schemas = agent.tool_schemas();
        let mut records = carried;
        let mut text = String::new();
        let mut content = content;
        let mut depth: u32 = 1;

        loop {
            if depth > self.settings.max_depth {
                warn!(depth, max_depth = self.settings.max_depth, "Tool-call depth cap reached");
                sink.send(format!(
                    "Error: Maximum tool-call depth of {} exceeded",
                    self.settings.max_depth
                ))
                .await?;
                break;
            }

            let history = sink
                .guard(
                    self.sessions
                        .recent_history(&session_id, self.settings.history_limit),
                )
                .await??;
            let request = ModelRequest {
                model: agent.llm.model.clone(),
                temperature: agent.llm.temperature,
                max_tokens: agent.llm.max_tokens,
                prompt: compose(&PromptInput {
                    system: &prompt.content,
                    history: &history,
                    content: &content,
                    preview_chars: self.settings.preview_chars,
                }),
                tools: schemas.clone(),
            };
            debug!(depth, history = history.len(), "Calling model");

            let stream = sink.guard(self.model.stream_completion(request)).await??;
            let mut aggregator = StreamAggregator::new(stream);
            while let Some(chunk) = sink.guard(aggregator.next_content()).await? {
                let chunk = chunk?;
                text.push_str(&chunk);
                sink.send(chunk).await?;
            }

            let calls = aggregator.finish();
            if calls.is_empty() {
                debug!(depth, "Model answered without tool calls");
                break;
            }

            debug!(depth, calls = calls.len(), "Executing tool calls");
            let batch = sink
                .guard(self.tools.execute_batch(&calls, &agent, &session_id))
                .await?;
            content = follow_up(&batch);
            records.extend(batch);
            depth += 1;
        }

        if text.is_empty() && records.is_empty() {
            info!("Turn finished with nothing to persist");
            return Ok(());
        }

        let successful: Vec<_> = records.into_iter().filter(|r| r.success).collect();
        let tool_calls = successful.len();
        sink.guard(
            self.sessions
                .append_message(&session_id, NewMessage::assistant(text, successful)),
        )
        .await??;
        info!(tool_calls, "Turn finished");
        Ok(())
    }
}

async fn finish(outcome: Result<(), Interrupt>, sink: &Sink) {
    match outcome {
        Ok(()) => {}
        Err(Interrupt::Cancelled) => warn!("Turn cancelled, caller dropped the stream"),
        Err(Interrupt::Fault(e)) => {
            warn!(error = %e, "Turn failed");
            sink.fail(e).await;
        }
    }
}

/// The next level's content: one line per record, in batch order.
pub fn follow_up(records: &[ToolExecutionRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{}.", r.summary_line()))
        .collect::<Vec<_>>()
        .join("\n")
}

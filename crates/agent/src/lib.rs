//! # Parley Agent
//!
//! The turn engine. A [`TurnOrchestrator`] takes one user message for one
//! agent and drives it to completion:
//!
//! ```text
//! user message → persist → prompt → model stream ─┬─ content → caller
//!                                                  └─ tool calls → executor
//!                                                       → follow-up → next level
//! ... → persist assistant message
//! ```
//!
//! The [`StreamAggregator`] separates streamed content from tool-call
//! fragments, and [`ReplayGateway`] serves scripted model output for offline
//! runs and tests.

pub mod aggregator;
pub mod orchestrator;
pub mod prompt;
pub mod replay;

pub use aggregator::{StreamAggregator, ToolCallAccumulator};
pub use orchestrator::{
    SESSION_TITLE_CHARS, TurnOrchestrator, TurnRequest, TurnSettings, TurnStream, follow_up,
};
pub use replay::ReplayGateway;

//! Stream aggregator — splits a model delta stream into content and tool calls.
//!
//! Content fragments pass straight through to the caller. Tool-call fragments
//! are buffered per index until the stream ends, then materialized in index
//! order. Argument text is concatenated verbatim and never parsed here.

use parley_core::error::ModelError;
use parley_core::model::{Delta, ModelStream, ToolCallFragment};
use parley_core::tool::ToolCall;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Buffers tool-call fragments for one model call.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a fragment into the call at its index. The first non-empty id
    /// and name win; arguments append in arrival order.
    pub fn push(&mut self, fragment: ToolCallFragment) {
        let partial = self.calls.entry(fragment.index).or_default();

        if partial.id.is_none()
            && let Some(id) = fragment.id.filter(|id| !id.is_empty())
        {
            partial.id = Some(id);
        }
        if partial.name.is_none()
            && let Some(name) = fragment.name.filter(|name| !name.is_empty())
        {
            partial.name = Some(name);
        }
        if let Some(arguments) = fragment.arguments {
            partial.arguments.push_str(&arguments);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Completed calls in index order. Calls that never received a name are
    /// dropped; a missing id becomes `call_{index}`.
    pub fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .filter_map(|(index, partial)| {
                let Some(name) = partial.name else {
                    debug!(index, "Dropping tool call without a name");
                    return None;
                };
                Some(ToolCall {
                    id: partial.id.unwrap_or_else(|| format!("call_{index}")),
                    name,
                    arguments: partial.arguments,
                })
            })
            .collect()
    }
}

/// Drives one model stream.
pub struct StreamAggregator {
    stream: ModelStream,
    tool_calls: ToolCallAccumulator,
    done: bool,
}

impl StreamAggregator {
    pub fn new(stream: ModelStream) -> Self {
        Self {
            stream,
            tool_calls: ToolCallAccumulator::new(),
            done: false,
        }
    }

    /// The next non-empty content fragment, `None` once the stream is
    /// complete, or the error that interrupted it.
    pub async fn next_content(&mut self) -> Option<Result<String, ModelError>> {
        while !self.done {
            let Some(item) = self.stream.recv().await else {
                self.done = true;
                break;
            };
            let delta = match item {
                Ok(delta) => delta,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if let Some(content) = self.absorb(delta) {
                return Some(Ok(content));
            }
        }
        None
    }

    fn absorb(&mut self, delta: Delta) -> Option<String> {
        for fragment in delta.tool_calls {
            self.tool_calls.push(fragment);
        }
        if delta.done {
            self.done = true;
        }
        delta.content.filter(|c| !c.is_empty())
    }

    /// Consume the aggregator and return the completed tool calls.
    pub fn finish(self) -> Vec<ToolCall> {
        self.tool_calls.finish()
    }
}

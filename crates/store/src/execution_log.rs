//! In-memory tool execution log.
//!
//! Keeps every invoked record in order. The turn engine treats the log as
//! best-effort; this implementation never fails.

use async_trait::async_trait;
use parley_core::error::StoreError;
use parley_core::message::SessionId;
use parley_core::tool::{ExecutionLog, ToolExecutionRecord};
use std::sync::Mutex;

/// An append-only, in-process execution log.
pub struct InMemoryExecutionLog {
    records: Mutex<Vec<ToolExecutionRecord>>,
}

impl InMemoryExecutionLog {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// All records, in logging order.
    pub fn records(&self) -> Vec<ToolExecutionRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Records belonging to one session.
    pub fn for_session(&self, session_id: &SessionId) -> Vec<ToolExecutionRecord> {
        self.records()
            .into_iter()
            .filter(|r| &r.session_id == session_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryExecutionLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionLog for InMemoryExecutionLog {
    async fn record(&self, record: &ToolExecutionRecord) -> Result<(), StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| StoreError::Storage(format!("execution log poisoned: {e}")))?;
        records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop::NoopExecutionLog;
    use parley_core::tool::RecordOrigin;
    use serde_json::Map;

    fn failed(session: &str, call_id: &str) -> ToolExecutionRecord {
        ToolExecutionRecord::failed(
            RecordOrigin {
                call_id: call_id.into(),
                tool_id: None,
                tool_name: "calculator".into(),
                session_id: SessionId::from(session),
                agent_id: "bot".into(),
            },
            Map::new(),
            "division by zero",
            0,
        )
    }

    #[tokio::test]
    async fn records_in_order() {
        let log = InMemoryExecutionLog::new();
        assert!(log.is_empty());

        log.record(&failed("s1", "a")).await.unwrap();
        log.record(&failed("s2", "b")).await.unwrap();
        log.record(&failed("s1", "c")).await.unwrap();

        let ids: Vec<_> = log.records().into_iter().map(|r| r.call_id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(log.for_session(&SessionId::from("s1")).len(), 2);
    }

    #[tokio::test]
    async fn noop_accepts_everything() {
        NoopExecutionLog.record(&failed("s1", "a")).await.unwrap();
    }
}

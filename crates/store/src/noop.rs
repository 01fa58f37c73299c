//! No-op execution log — disables tool auditing entirely.

use async_trait::async_trait;
use parley_core::error::StoreError;
use parley_core::tool::{ExecutionLog, ToolExecutionRecord};

/// An execution log that records nothing.
pub struct NoopExecutionLog;

#[async_trait]
impl ExecutionLog for NoopExecutionLog {
    async fn record(&self, _record: &ToolExecutionRecord) -> Result<(), StoreError> {
        Ok(())
    }
}

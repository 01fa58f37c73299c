//! Native backend — executes tools implemented as in-process functions.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::tool::{Tool, ToolBackend, ToolKind};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// An in-process function that can back a native tool.
///
/// The agent's tool definition decides what the model sees.
#[async_trait]
pub trait NativeFunction: Send + Sync {
    /// The name agents bind to (matched case-insensitively).
    fn name(&self) -> &str;

    async fn call(&self, parameters: &Map<String, Value>) -> Result<Value, ToolError>;
}

/// The backend for [`ToolKind::Native`] tools.
#[derive(Default)]
pub struct NativeBackend {
    functions: HashMap<String, Arc<dyn NativeFunction>>,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function. Replaces any existing function with the same name.
    pub fn register(&mut self, function: Arc<dyn NativeFunction>) {
        self.functions
            .insert(function.name().to_ascii_lowercase(), function);
    }

    pub fn with(mut self, function: Arc<dyn NativeFunction>) -> Self {
        self.register(function);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn NativeFunction>> {
        self.functions.get(&name.to_ascii_lowercase())
    }

    /// Registered function names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.functions.values().map(|f| f.name()).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl ToolBackend for NativeBackend {
    fn kind(&self) -> ToolKind {
        ToolKind::Native
    }

    async fn execute(
        &self,
        tool: &Tool,
        parameters: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let function = self
            .get(&tool.name)
            .ok_or_else(|| ToolError::NotFound(tool.name.clone()))?;
        function.call(parameters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl NativeFunction for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        async fn call(&self, parameters: &Map<String, Value>) -> Result<Value, ToolError> {
            Ok(parameters.get("text").cloned().unwrap_or(Value::Null))
        }
    }

    fn tool(name: &str) -> Tool {
        Tool {
            id: format!("bot:tool:{name}"),
            name: name.into(),
            description: String::new(),
            kind: ToolKind::Native,
            active: true,
            parameters_schema: "{}".into(),
        }
    }

    #[tokio::test]
    async fn dispatches_case_insensitively() {
        let backend = NativeBackend::new().with(Arc::new(Echo));
        let mut params = Map::new();
        params.insert("text".into(), Value::from("hello"));

        let out = backend.execute(&tool("ECHO"), &params).await.unwrap();
        assert_eq!(out, "hello");
        assert_eq!(backend.names(), vec!["Echo"]);
    }

    #[tokio::test]
    async fn unimplemented_function_is_not_found() {
        let backend = NativeBackend::new();
        let err = backend.execute(&tool("missing"), &Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "missing"));
    }
}

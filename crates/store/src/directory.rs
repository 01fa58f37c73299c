//! Static agent directory built from configuration.

use async_trait::async_trait;
use parley_core::agent::{Agent, AgentDirectory};
use parley_core::error::StoreError;
use std::collections::HashMap;

/// Agents held in memory, keyed by id. Listing preserves insertion order.
#[derive(Default)]
pub struct StaticAgentDirectory {
    order: Vec<String>,
    agents: HashMap<String, Agent>,
}

impl StaticAgentDirectory {
    pub fn new(agents: impl IntoIterator<Item = Agent>) -> Self {
        let mut directory = Self::default();
        for agent in agents {
            directory.insert(agent);
        }
        directory
    }

    /// Add or replace an agent.
    pub fn insert(&mut self, agent: Agent) {
        if !self.agents.contains_key(&agent.id) {
            self.order.push(agent.id.clone());
        }
        self.agents.insert(agent.id.clone(), agent);
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[async_trait]
impl AgentDirectory for StaticAgentDirectory {
    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError> {
        Ok(self.agents.get(id).cloned())
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        Ok(self
            .order
            .iter()
            .filter_map(|id| self.agents.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::agent::LlmBinding;

    fn agent(id: &str, name: &str) -> Agent {
        Agent {
            id: id.into(),
            name: name.into(),
            prompts: vec![],
            tools: vec![],
            llm: LlmBinding {
                model: "mock".into(),
                temperature: 0.7,
                max_tokens: None,
            },
        }
    }

    #[tokio::test]
    async fn lookup_and_listing_order() {
        let dir = StaticAgentDirectory::new(vec![agent("b", "Bee"), agent("a", "Ay")]);

        assert_eq!(dir.get_agent("a").await.unwrap().unwrap().name, "Ay");
        assert!(dir.get_agent("missing").await.unwrap().is_none());

        let ids: Vec<_> = dir.list_agents().await.unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn insert_replaces_existing() {
        let mut dir = StaticAgentDirectory::new(vec![agent("a", "Old")]);
        dir.insert(agent("a", "New"));

        assert_eq!(dir.len(), 1);
        assert_eq!(dir.get_agent("a").await.unwrap().unwrap().name, "New");
    }
}

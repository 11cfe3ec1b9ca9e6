use crate::providers::base::Provider;
use crate::repository::ToolRepository;
use crate::tools::Tool;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Simple in-memory repository for tests and local usage.
///
/// Both maps are guarded independently, but every public mutator that
/// touches more than one of them (`save_provider_with_tools`,
/// `remove_provider`) takes both locks before releasing either, so a reader
/// never observes a provider with no tools entry or vice versa.
pub struct InMemoryToolRepository {
    tools: RwLock<HashMap<String, Vec<Tool>>>, // provider_name -> tools
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>, // provider_name -> Provider
}

impl Default for InMemoryToolRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryToolRepository {
    /// Create an empty repository instance.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            providers: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ToolRepository for InMemoryToolRepository {
    async fn save_provider_with_tools(
        &self,
        provider: Arc<dyn Provider>,
        tools: Vec<Tool>,
    ) -> Result<()> {
        let provider_name = provider.name();

        let mut providers_lock = self.providers.write().await;
        let mut tools_lock = self.tools.write().await;
        providers_lock.insert(provider_name.clone(), provider);
        tools_lock.insert(provider_name, tools);

        Ok(())
    }

    async fn get_provider(&self, name: &str) -> Result<Option<Arc<dyn Provider>>> {
        let providers = self.providers.read().await;
        Ok(providers.get(name).cloned())
    }

    async fn get_providers(&self) -> Result<Vec<Arc<dyn Provider>>> {
        let providers = self.providers.read().await;
        Ok(providers.values().cloned().collect())
    }

    async fn remove_provider(&self, name: &str) -> Result<()> {
        let mut providers = self.providers.write().await;
        let mut tools = self.tools.write().await;
        if providers.remove(name).is_none() {
            return Err(anyhow!("not_found: provider '{}' is not registered", name));
        }
        tools.remove(name);
        Ok(())
    }

    async fn add_tool(&self, tool: Tool) -> Result<()> {
        let provider_name = tool
            .name
            .split_once('.')
            .map(|(p, _)| p.to_string())
            .ok_or_else(|| anyhow!("tool name must be fully-qualified: {}", tool.name))?;

        let providers = self.providers.read().await;
        if !providers.contains_key(&provider_name) {
            return Err(anyhow!("unknown_provider: {}", provider_name));
        }
        drop(providers);

        let mut tools_lock = self.tools.write().await;
        tools_lock.entry(provider_name).or_default().push(tool);
        Ok(())
    }

    async fn get_tool(&self, fq_name: &str) -> Result<Option<Tool>> {
        let tools_map = self.tools.read().await;
        for tools in tools_map.values() {
            if let Some(found) = tools.iter().find(|t| t.name == fq_name) {
                return Ok(Some(found.clone()));
            }
        }
        Ok(None)
    }

    async fn remove_tool(&self, fq_name: &str) -> Result<()> {
        let mut tools_map = self.tools.write().await;
        for tools in tools_map.values_mut() {
            let before = tools.len();
            tools.retain(|t| t.name != fq_name);
            if tools.len() != before {
                return Ok(());
            }
        }
        Err(anyhow!("not_found: tool '{}' is not registered", fq_name))
    }

    async fn get_tools(&self) -> Result<Vec<Tool>> {
        let tools_map = self.tools.read().await;
        let mut all_tools = Vec::new();
        for tools in tools_map.values() {
            all_tools.extend(tools.clone());
        }
        Ok(all_tools)
    }

    async fn get_tools_by_provider(&self, provider_name: &str) -> Result<Vec<Tool>> {
        let tools_map = self.tools.read().await;
        match tools_map.get(provider_name) {
            Some(tools) => Ok(tools.clone()),
            None => Err(anyhow!("no tools found for provider {}", provider_name)),
        }
    }

    async fn search_tools(&self, query: &str, limit: usize) -> Result<Vec<Tool>> {
        let query_lower = query.to_lowercase();
        let tools_map = self.tools.read().await;
        let mut matched = Vec::new();
        for tools in tools_map.values() {
            for tool in tools {
                let haystack = format!(
                    "{} {} {}",
                    tool.name.to_lowercase(),
                    tool.description.to_lowercase(),
                    tool.tags.join(" ").to_lowercase()
                );
                if haystack.contains(&query_lower) {
                    matched.push(tool.clone());
                }
            }
        }
        if limit > 0 && matched.len() > limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn tool_count(&self) -> Result<usize> {
        let tools_map = self.tools.read().await;
        Ok(tools_map.values().map(|t| t.len()).sum())
    }

    async fn provider_count(&self) -> Result<usize> {
        let providers = self.providers.read().await;
        Ok(providers.len())
    }

    async fn clear(&self) -> Result<()> {
        self.providers.write().await.clear();
        self.tools.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::http::HttpProvider;
    use crate::tools::ToolInputOutputSchema;

    fn schema() -> ToolInputOutputSchema {
        ToolInputOutputSchema {
            type_: "object".to_string(),
            properties: None,
            required: None,
            description: None,
            title: None,
            items: None,
            enum_: None,
            minimum: None,
            maximum: None,
            format: None,
        }
    }

    fn sample_tool(name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            description: "does a thing".to_string(),
            inputs: schema(),
            outputs: schema(),
            tags: vec!["demo".to_string()],
            average_response_size: None,
            provider: None,
        }
    }

    #[tokio::test]
    async fn atomic_save_and_remove() {
        let repo = InMemoryToolRepository::new();
        let provider: Arc<dyn Provider> = Arc::new(HttpProvider::new(
            "svc".to_string(),
            "http://x".to_string(),
            "GET".to_string(),
            None,
        ));
        repo.save_provider_with_tools(provider, vec![sample_tool("svc.echo")])
            .await
            .unwrap();

        assert!(repo.get_provider("svc").await.unwrap().is_some());
        assert_eq!(repo.get_tools_by_provider("svc").await.unwrap().len(), 1);

        repo.remove_provider("svc").await.unwrap();
        assert!(repo.get_provider("svc").await.unwrap().is_none());
        assert!(repo.get_tools_by_provider("svc").await.is_err());
    }

    #[tokio::test]
    async fn add_tool_requires_known_provider() {
        let repo = InMemoryToolRepository::new();
        let err = repo.add_tool(sample_tool("ghost.echo")).await.unwrap_err();
        assert!(err.to_string().contains("unknown_provider"));
    }

    #[tokio::test]
    async fn counts_and_clear() {
        let repo = InMemoryToolRepository::new();
        let provider: Arc<dyn Provider> = Arc::new(HttpProvider::new(
            "svc".to_string(),
            "http://x".to_string(),
            "GET".to_string(),
            None,
        ));
        repo.save_provider_with_tools(
            provider,
            vec![sample_tool("svc.a"), sample_tool("svc.b")],
        )
        .await
        .unwrap();

        assert_eq!(repo.tool_count().await.unwrap(), 2);
        assert_eq!(repo.provider_count().await.unwrap(), 1);

        repo.clear().await.unwrap();
        assert_eq!(repo.tool_count().await.unwrap(), 0);
        assert_eq!(repo.provider_count().await.unwrap(), 0);
    }
}

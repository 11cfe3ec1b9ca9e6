pub mod in_memory;

use crate::providers::base::Provider;
use crate::tools::Tool;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// In-memory catalog of providers and the tools they expose. The kernel
/// exclusively owns one instance of this trait and serializes every mutator
/// through its own lock (`§5` of the design: writes are totally ordered,
/// reads take a consistent snapshot).
#[async_trait]
pub trait ToolRepository: Send + Sync {
    /// Atomically replace (or insert) a provider and its full tool list.
    async fn save_provider_with_tools(
        &self,
        prov: Arc<dyn Provider>,
        tools: Vec<Tool>,
    ) -> Result<()>;
    async fn get_provider(&self, name: &str) -> Result<Option<Arc<dyn Provider>>>;
    async fn get_providers(&self) -> Result<Vec<Arc<dyn Provider>>>;
    /// Removes a provider and every tool it owns. No-op error if absent.
    async fn remove_provider(&self, name: &str) -> Result<()>;

    /// Add a single tool to an already-registered provider. Fails with
    /// `unknown_provider` if the provider isn't present.
    async fn add_tool(&self, tool: Tool) -> Result<()>;
    /// Looks up a tool by fully-qualified name across every provider.
    async fn get_tool(&self, fq_name: &str) -> Result<Option<Tool>>;
    async fn remove_tool(&self, fq_name: &str) -> Result<()>;

    async fn get_tools(&self) -> Result<Vec<Tool>>;
    async fn get_tools_by_provider(&self, provider_name: &str) -> Result<Vec<Tool>>;

    /// Plain substring match over name/description/tags; the richer
    /// exact/fuzzy/semantic ranking lives in [`crate::search`].
    async fn search_tools(&self, query: &str, limit: usize) -> Result<Vec<Tool>>;

    async fn tool_count(&self) -> Result<usize>;
    async fn provider_count(&self) -> Result<usize>;
    async fn clear(&self) -> Result<()>;
}

//! Plugin execution: the dispatch port and an in-process registry.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{QueryError, Result};
use crate::types::{FunctionInvocation, ToolDefinition};

/// Content-type tag for text payloads.
pub const TEXT_CONTENT_TYPE: &str = "text";

/// Content-type tag for JSON payloads.
pub const JSON_CONTENT_TYPE: &str = "JSON";

/// What a plugin returned for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginOutput {
    pub content_type: String,
    pub payload: String,
}

impl PluginOutput {
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            content_type: TEXT_CONTENT_TYPE.to_string(),
            payload: payload.into(),
        }
    }

    pub fn json(value: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            content_type: JSON_CONTENT_TYPE.to_string(),
            payload: serde_json::to_string_pretty(value)?,
        })
    }
}

/// Dispatches function invocations to whatever implements them.
#[async_trait]
pub trait PluginExecutor: Send + Sync {
    async fn invoke(
        &self,
        invocation: &FunctionInvocation,
        cancel: &CancellationToken,
    ) -> Result<PluginOutput>;

    /// Definitions to advertise when the request names no tools.
    fn definitions(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }
}

/// A single callable function.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    async fn call(
        &self,
        parameters: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<PluginOutput>;
}

type PluginHandler = dyn Fn(
        serde_json::Value,
        CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<PluginOutput>> + Send>>
    + Send
    + Sync;

/// Closure-based plugin for quick plugin creation.
pub struct FnPlugin {
    definition: ToolDefinition,
    handler: Arc<PluginHandler>,
}

impl FnPlugin {
    pub fn new<F, Fut>(definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(serde_json::Value, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PluginOutput>> + Send + 'static,
    {
        Self {
            definition,
            handler: Arc::new(move |params, cancel| Box::pin(handler(params, cancel))),
        }
    }
}

#[async_trait]
impl Plugin for FnPlugin {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn call(
        &self,
        parameters: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<PluginOutput> {
        (self.handler)(parameters.clone(), cancel.clone()).await
    }
}

impl std::fmt::Debug for FnPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnPlugin")
            .field("name", &self.definition.name)
            .finish()
    }
}

/// Plugins looked up by function name, in registration order.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. A later plugin with the same name replaces the earlier one.
    pub fn register(&mut self, plugin: impl Plugin + 'static) -> &mut Self {
        let name = plugin.definition().name.clone();
        self.plugins.retain(|p| p.definition().name != name);
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn with(mut self, plugin: impl Plugin + 'static) -> Self {
        self.register(plugin);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.definition().name == name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[async_trait]
impl PluginExecutor for PluginRegistry {
    async fn invoke(
        &self,
        invocation: &FunctionInvocation,
        cancel: &CancellationToken,
    ) -> Result<PluginOutput> {
        let plugin = self
            .get(&invocation.name)
            .ok_or_else(|| QueryError::plugin(&invocation.name, "unknown function"))?;
        plugin.call(&invocation.parameters, cancel).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.plugins
            .iter()
            .map(|p| p.definition().clone())
            .collect()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| &p.definition().name))
            .finish()
    }
}

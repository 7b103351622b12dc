//! Tool registry and call dispatch.
//!
//! Registration order is preserved and the first handler whose name
//! matches an incoming call wins. A call naming an unregistered tool is
//! not an error; the registry reports it as not applicable and the
//! session moves on.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::args::ToolArguments;
use crate::error::ToolError;
use crate::schema::ToolDescriptor;

/// A call-by-name request extracted from the conversation stream.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub call_id: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(name: &str, call_id: &str, arguments: &str) -> Self {
        Self {
            name: name.to_string(),
            call_id: call_id.to_string(),
            arguments: arguments.to_string(),
        }
    }
}

/// Outcome of routing one call through the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolReply {
    /// No registered tool carries the requested name.
    NotApplicable,
    /// A handler matched but produced nothing usable.
    NoResult,
    /// The handler ran to completion.
    Completed { call_id: String, value: Value },
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: ToolArguments) -> Result<Value, ToolError>;
}

/// Adapter for synchronous closures; most local tools need no await.
pub struct FnTool<F>
where
    F: Fn(ToolArguments) -> Result<Value, ToolError> + Send + Sync,
{
    f: F,
}

impl<F> FnTool<F>
where
    F: Fn(ToolArguments) -> Result<Value, ToolError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ToolHandler for FnTool<F>
where
    F: Fn(ToolArguments) -> Result<Value, ToolError> + Send + Sync,
{
    async fn call(&self, args: ToolArguments) -> Result<Value, ToolError> {
        (self.f)(args)
    }
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique across the registry.
    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), ToolError> {
        if self.tools.iter().any(|t| t.descriptor.name == descriptor.name) {
            return Err(ToolError::DuplicateTool(descriptor.name));
        }
        debug!(tool = %descriptor.name, "Registered tool");
        self.tools.push(RegisteredTool { descriptor, handler });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors in registration order, for session configuration.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    /// Route a call to the first handler matching its name.
    ///
    /// Argument or handler failures are logged and contained as
    /// [`ToolReply::NoResult`] rather than propagated.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolReply {
        for tool in &self.tools {
            if tool.descriptor.name != call.name {
                continue;
            }
            let args = match ToolArguments::parse(&call.arguments) {
                Ok(args) => args,
                Err(e) => {
                    warn!(tool = %call.name, call_id = %call.call_id, %e,
                        "Malformed tool arguments, returning no result");
                    return ToolReply::NoResult;
                }
            };
            return match tool.handler.call(args).await {
                Ok(value) => ToolReply::Completed {
                    call_id: call.call_id.clone(),
                    value,
                },
                Err(e) => {
                    warn!(tool = %call.name, call_id = %call.call_id, %e,
                        "Tool handler failed, returning no result");
                    ToolReply::NoResult
                }
            };
        }
        ToolReply::NotApplicable
    }
}

//! The conversation-ending tool.
//!
//! The assistant calls this when the user says goodbye; an affirmative
//! result tells the dispatcher to end the session cleanly.

use std::sync::Arc;

use serde_json::Value;
use voxloop_tools::{FnTool, ParameterSchema, ToolDescriptor, ToolHandler};

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "finish_conversation",
        "Invoked when the user says goodbye or otherwise indicates the conversation is over.",
        ParameterSchema::new(),
    )
}

pub fn handler() -> Arc<dyn ToolHandler> {
    Arc::new(FnTool::new(|_args| Ok(Value::Bool(true))))
}

//! Local capabilities offered to the remote service as callable tools.
//!
//! A tool is registered once with a name, a description, and an explicit
//! parameter schema, plus a handler. Incoming call-by-name requests are
//! routed through the registry, their JSON arguments marshalled into typed
//! values, and the handler's result wrapped for the conversation. Handler
//! faults are contained: they are logged and reported as "no result" so a
//! broken tool cannot abort a live session.

pub mod args;
pub mod error;
pub mod registry;
pub mod schema;

pub use args::ToolArguments;
pub use error::ToolError;
pub use registry::{FnTool, ToolCall, ToolHandler, ToolRegistry, ToolReply};
pub use schema::{ParamKind, ParameterSchema, ParameterSpec, ToolDescriptor};

//! Demo weather tool.
//!
//! There is no weather backend; the report is made up on the spot. It
//! exists to give the assistant something callable with a real argument.

use std::sync::Arc;

use serde_json::json;
use voxloop_tools::{FnTool, ParamKind, ParameterSchema, ToolDescriptor, ToolHandler};

const CONDITIONS: &[&str] = &["sunny", "cloudy", "rainy", "windy", "foggy", "snowy"];

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "get_weather",
        "Gets the current weather for a location.",
        ParameterSchema::new().param(
            "location",
            ParamKind::String,
            "The city to get the weather for.",
        ),
    )
}

pub fn handler() -> Arc<dyn ToolHandler> {
    Arc::new(FnTool::new(|args| {
        let location = args.str("location")?;
        let condition = CONDITIONS[fastrand::usize(..CONDITIONS.len())];
        let temperature = fastrand::i32(-5..35);
        Ok(json!(format!(
            "The weather in {location} is {condition} with a temperature of {temperature} degrees Celsius."
        )))
    }))
}

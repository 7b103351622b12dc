//! Tools this application offers to the assistant.

pub mod finish;
pub mod weather;

use voxloop_tools::{ToolError, ToolRegistry};

/// Registry with the built-in tools, finish first.
pub fn default_registry() -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(finish::descriptor(), finish::handler())?;
    registry.register(weather::descriptor(), weather::handler())?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxloop_tools::{ToolCall, ToolReply};

    #[tokio::test]
    async fn built_in_tools_are_registered() {
        let registry = default_registry().unwrap();
        let names: Vec<String> = registry.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["finish_conversation", "get_weather"]);
    }

    #[tokio::test]
    async fn weather_reports_for_the_requested_location() {
        let registry = default_registry().unwrap();
        let call = ToolCall::new("get_weather", "c1", r#"{"location":"Lisbon"}"#);
        match registry.dispatch(&call).await {
            ToolReply::Completed { value, .. } => {
                let report = value.as_str().unwrap();
                assert!(report.contains("Lisbon"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn finish_confirms() {
        let registry = default_registry().unwrap();
        let call = ToolCall::new("finish_conversation", "c2", "{}");
        match registry.dispatch(&call).await {
            ToolReply::Completed { value, .. } => assert_eq!(value, serde_json::json!(true)),
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}

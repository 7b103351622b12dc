use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("tool `{0}` is already registered")]
    DuplicateTool(String),

    #[error("missing required argument `{0}`")]
    MissingArgument(String),

    #[error("argument `{name}` has the wrong type, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },

    #[error("arguments must be a JSON object")]
    NotAnObject,

    #[error("malformed arguments payload: {0}")]
    BadArguments(#[from] serde_json::Error),

    #[error("handler failed: {0}")]
    Handler(String),
}

//! Call-argument marshalling.
//!
//! Arguments arrive as a flat JSON object keyed by parameter name. A
//! parameter absent from the payload is reported as missing, never
//! defaulted to a zero value.

use serde_json::Value;

use crate::error::ToolError;

#[derive(Debug, Clone, Default)]
pub struct ToolArguments {
    values: serde_json::Map<String, Value>,
}

impl ToolArguments {
    /// Parse the raw arguments JSON of a call request.
    pub fn parse(raw: &str) -> Result<Self, ToolError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        match serde_json::from_str::<Value>(trimmed)? {
            Value::Object(values) => Ok(Self { values }),
            Value::Null => Ok(Self::default()),
            _ => Err(ToolError::NotAnObject),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value by parameter name, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    fn require(&self, name: &str) -> Result<&Value, ToolError> {
        self.values
            .get(name)
            .ok_or_else(|| ToolError::MissingArgument(name.to_string()))
    }

    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| ToolError::TypeMismatch {
                name: name.to_string(),
                expected: "string",
            })
    }

    pub fn f64(&self, name: &str) -> Result<f64, ToolError> {
        self.require(name)?
            .as_f64()
            .ok_or_else(|| ToolError::TypeMismatch {
                name: name.to_string(),
                expected: "number",
            })
    }

    pub fn i64(&self, name: &str) -> Result<i64, ToolError> {
        self.require(name)?
            .as_i64()
            .ok_or_else(|| ToolError::TypeMismatch {
                name: name.to_string(),
                expected: "integer",
            })
    }

    pub fn bool(&self, name: &str) -> Result<bool, ToolError> {
        self.require(name)?
            .as_bool()
            .ok_or_else(|| ToolError::TypeMismatch {
                name: name.to_string(),
                expected: "boolean",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_object_round_trips() {
        let args = ToolArguments::parse(r#"{"location":"Utrecht","count":3}"#).unwrap();
        assert_eq!(args.str("location").unwrap(), "Utrecht");
        assert_eq!(args.i64("count").unwrap(), 3);
    }

    #[test]
    fn empty_and_null_payloads_are_empty() {
        assert!(ToolArguments::parse("").unwrap().is_empty());
        assert!(ToolArguments::parse("{}").unwrap().is_empty());
        assert!(ToolArguments::parse("null").unwrap().is_empty());
    }

    #[test]
    fn absent_parameter_is_missing_not_defaulted() {
        let args = ToolArguments::parse(r#"{"other": 1}"#).unwrap();
        assert!(matches!(
            args.str("location"),
            Err(ToolError::MissingArgument(name)) if name == "location"
        ));
    }

    #[test]
    fn wrong_type_is_reported() {
        let args = ToolArguments::parse(r#"{"location": 5}"#).unwrap();
        assert!(matches!(
            args.str("location"),
            Err(ToolError::TypeMismatch { expected: "string", .. })
        ));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(
            ToolArguments::parse("[1,2]"),
            Err(ToolError::NotAnObject)
        ));
        assert!(matches!(
            ToolArguments::parse("not json"),
            Err(ToolError::BadArguments(_))
        ));
    }
}

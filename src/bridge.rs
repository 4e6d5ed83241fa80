//! Tool transfer between the palette and the composer
//!
//! A pick in the palette produces a [`ToolTransfer`]; dropping it into the
//! composer turns it into a token. The value carries everything the composer
//! needs, so neither side knows about the other's widgets.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::Tool;

/// Identity of one tool in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolTransfer {
    pub category: String,
    /// The tool's `data`, already encoded as text
    pub payload: String,
    pub display_name: String,
}

impl ToolTransfer {
    pub fn new(category: impl Into<String>, payload: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            payload: payload.into(),
            display_name: display_name.into(),
        }
    }

    pub fn from_tool(tool: &Tool) -> Self {
        Self::new(tool.category.clone(), encode_data(&tool.data), tool.name.clone())
    }

    /// Text form for carrying a transfer outside the process. `steer tools
    /// --wire` prints it; pasting it into the composer drops the tool.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_wire(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Encode a tool payload the way the backend expects it inside a goal:
/// compact JSON, keys in their original order.
pub fn encode_data(data: &Value) -> String {
    data.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_tool_encodes_compact_json() {
        let tool = Tool {
            category: "web".into(),
            name: "Fetch".into(),
            data: json!({"url": "x.com", "depth": 2}),
        };
        let t = ToolTransfer::from_tool(&tool);
        assert_eq!(t.category, "web");
        assert_eq!(t.payload, r#"{"url":"x.com","depth":2}"#);
        assert_eq!(t.display_name, "Fetch");
    }

    #[test]
    fn test_string_payload_is_quoted() {
        assert_eq!(encode_data(&json!("plain")), r#""plain""#);
    }

    #[test]
    fn test_wire_form_survives_payload_with_quotes() {
        let t = ToolTransfer::new("web", r#"{"url":"x.com"}"#, "Fetch \"page\"");
        let back = ToolTransfer::from_wire(&t.to_wire()).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_from_wire_rejects_garbage() {
        assert!(ToolTransfer::from_wire("not json").is_err());
        assert!(ToolTransfer::from_wire(r#"{"category":"web","payload":"{}"}"#).is_err());
        assert!(ToolTransfer::from_wire(
            r#"{"category":"web","payload":"{}","display_name":"F","extra":1}"#
        )
        .is_err());
    }
}

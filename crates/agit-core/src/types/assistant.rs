use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Assistant {
    /// Hash of the commit that created the assistant.
    pub id: String,
    pub object: String,
    pub created_at: i64,
    pub name: String,
    pub description: Option<String>,
    pub model: String,
    pub instructions: Option<String>,
    #[schema(value_type = Vec<Object>)]
    pub tools: Vec<Value>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateAssistantRequest {
    pub name: Option<String>,
    pub model: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub tools: Vec<Value>,
    #[schema(value_type = Option<Object>)]
    pub tool_resources: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub response_format: Option<ResponseFormat>,
}

/// `"auto"` or an explicit `{ "type": ... }` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ResponseFormat {
    Mode(ResponseFormatMode),
    Object(ResponseFormatObject),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormatMode {
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormatObject {
    Text,
    JsonObject,
    JsonSchema {
        #[schema(value_type = Object)]
        json_schema: Value,
    },
}

impl Default for ResponseFormat {
    fn default() -> Self {
        Self::Mode(ResponseFormatMode::Auto)
    }
}

impl ResponseFormat {
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Mode(ResponseFormatMode::Auto))
    }
}

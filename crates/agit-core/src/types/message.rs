use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateMessageRequest {
    /// Only `user` is writable.
    pub role: String,
    pub content: MessageContentInput,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub attachments: Vec<Value>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

impl CreateMessageRequest {
    pub fn user(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContentInput::Text(text.to_string()),
            attachments: Vec::new(),
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum MessageContentInput {
    Text(String),
    Parts(Vec<MessageContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContentPart {
    Text {
        text: String,
    },
    ImageFile {
        #[schema(value_type = Object)]
        image_file: Value,
    },
    ImageUrl {
        #[schema(value_type = Object)]
        image_url: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    /// Hash of the commit that wrote the message.
    pub id: String,
    pub object: String,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    pub thread_id: String,
    pub status: String,
    pub role: MessageRole,
    pub content: Vec<MessageContent>,
    pub assistant_id: Option<String>,
    pub run_id: Option<String>,
    #[schema(value_type = Vec<Object>)]
    pub attachments: Vec<Value>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

impl Message {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|part| match part {
                MessageContent::Text { text } => text.value.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TextContent {
    pub value: String,
    #[schema(value_type = Vec<Object>)]
    pub annotations: Vec<Value>,
}

impl MessageContent {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            text: TextContent {
                value: value.into(),
                annotations: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_accepts_string_or_parts() {
        let plain: CreateMessageRequest =
            serde_json::from_str(r#"{"role":"user","content":"fix it"}"#).unwrap();
        assert_eq!(plain.content, MessageContentInput::Text("fix it".to_string()));

        let parts: CreateMessageRequest = serde_json::from_str(
            r#"{"role":"user","content":[{"type":"text","text":"a"},{"type":"image_url","image_url":{"url":"x"}}]}"#,
        )
        .unwrap();
        let MessageContentInput::Parts(parts) = parts.content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[1], MessageContentPart::ImageUrl { .. }));
    }

    #[test]
    fn serializes_text_content() {
        let value = serde_json::to_value(MessageContent::text("hello")).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"]["value"], "hello");
    }
}

use crate::types::diff::DiffLine;
use crate::types::message::CreateMessageRequest;
use crate::types::thread::CreateThreadRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Run {
    /// Hash of the commit holding the run's net effect.
    pub id: String,
    pub object: String,
    pub created_at: i64,
    pub thread_id: String,
    pub assistant_id: String,
    pub status: RunStatus,
    pub model: String,
    pub instructions: Option<String>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub failed_at: Option<i64>,
    pub last_error: Option<RunError>,
    #[schema(value_type = Vec<Object>)]
    pub tools: Vec<Value>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateRunRequest {
    pub assistant_id: String,
    pub model: Option<String>,
    pub instructions: Option<String>,
    pub additional_instructions: Option<String>,
    #[serde(default)]
    pub additional_messages: Vec<CreateMessageRequest>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub tools: Vec<Value>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateThreadAndRunRequest {
    pub assistant_id: String,
    pub thread: Option<CreateThreadRequest>,
    pub model: Option<String>,
    pub instructions: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub tools: Vec<Value>,
    #[schema(value_type = Option<Object>)]
    pub tool_resources: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
    pub stream: Option<bool>,
}

impl CreateThreadAndRunRequest {
    pub fn into_parts(self) -> (Option<CreateThreadRequest>, CreateRunRequest) {
        let mut thread = self.thread;
        if let (Some(thread), Some(resources)) = (thread.as_mut(), self.tool_resources) {
            thread.tool_resources.get_or_insert(resources);
        }
        let run = CreateRunRequest {
            assistant_id: self.assistant_id,
            model: self.model,
            instructions: self.instructions,
            additional_instructions: None,
            additional_messages: Vec::new(),
            temperature: self.temperature,
            top_p: self.top_p,
            tools: self.tools,
            metadata: self.metadata,
            stream: self.stream,
        };
        (thread, run)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStepType {
    MessageCreation,
    FileEdit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunStep {
    /// Zero-based ordinal of the hunk within the run's diff.
    pub id: String,
    pub object: String,
    pub created_at: i64,
    pub run_id: String,
    pub thread_id: String,
    pub assistant_id: String,
    #[serde(rename = "type")]
    pub step_type: RunStepType,
    pub status: RunStatus,
    pub step_details: StepDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StepDetails {
    pub path: String,
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub header: String,
    pub lines: Vec<DiffLine>,
}

pub mod assistant;
pub mod diff;
pub mod list;
pub mod message;
pub mod run;
pub mod thread;

pub use assistant::*;
pub use diff::*;
pub use list::*;
pub use message::*;
pub use run::*;
pub use thread::*;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeletionStatus {
    pub id: String,
    pub object: String,
    pub deleted: bool,
}

impl DeletionStatus {
    pub fn new(id: impl Into<String>, object: &str) -> Self {
        Self {
            id: id.into(),
            object: object.to_string(),
            deleted: true,
        }
    }
}

/// Whether an optional JSON field carries anything worth acting on.
pub(crate) fn is_present(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Object(map)) => !map.is_empty(),
        Some(serde_json::Value::Array(items)) => !items.is_empty(),
        Some(serde_json::Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    }
}

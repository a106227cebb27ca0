use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use retire_core::plan::CanonicalPlan;

pub const CALCULATE_PATH: &str = "api/calculate";
pub const CHAT_PATH: &str = "api/chat";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub plan_data: &'a CanonicalPlan,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChatReply {
    pub response: Option<String>,
    pub error: Option<String>,
    pub details: Option<Value>,
}

/// Error envelope either endpoint may send, on any status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub code: Option<String>,
}

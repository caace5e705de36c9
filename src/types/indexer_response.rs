use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct GraphQLBody {
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub hash: String,
    #[serde(default)]
    pub index: i64,
    pub block_height: i64,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<TxMessage>,
    #[serde(default)]
    pub response: Option<TxResponse>,
}

fn default_success() -> bool {
    true
}

impl Transaction {
    pub fn caller(&self) -> Option<&str> {
        self.messages
            .iter()
            .filter_map(|message| message.value.as_ref())
            .find_map(|value| value.caller.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxMessage {
    #[serde(default)]
    pub value: Option<MessageValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageValue {
    #[serde(default)]
    pub caller: Option<String>,
    #[serde(default)]
    pub pkg_path: Option<String>,
    #[serde(default)]
    pub func: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxResponse {
    #[serde(default)]
    pub events: Vec<TxEvent>,
}

/// Events that are not `GnoEvent`s come back as empty objects because the
/// selection only spreads on that type.
#[derive(Debug, Clone, Deserialize)]
pub struct TxEvent {
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub pkg_path: Option<String>,
    #[serde(default)]
    pub func: Option<String>,
    #[serde(default)]
    pub attrs: Vec<Attributes>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attributes {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockTime {
    pub height: i64,
    pub time: DateTime<Utc>,
}

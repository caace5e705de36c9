use serde::Deserialize;
use serde_json::Value;

/// JSON-RPC reply of a gno.land node to an `abci_query` call.
#[derive(Debug, Deserialize)]
pub struct AbciQueryBody {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Option<AbciQueryResult>,
    #[serde(default)]
    pub error: Option<BodyError>,
}

#[derive(Debug, Deserialize)]
pub struct AbciQueryResult {
    pub response: AbciQueryResponse,
}

#[derive(Debug, Deserialize)]
pub struct AbciQueryResponse {
    #[serde(rename = "ResponseBase")]
    pub response_base: ResponseBase,
    #[serde(rename = "Height", default)]
    pub height: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseBase {
    #[serde(rename = "Error", default)]
    pub error: Option<Value>,
    #[serde(rename = "Data", default)]
    pub data: Option<String>,
    #[serde(rename = "Log", default)]
    pub log: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BodyError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

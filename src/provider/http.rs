use base64::{engine::general_purpose, Engine};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::{
    configuration::Config,
    error::{truncate, Error, TransportError},
    provider::{IndexerTransport, RequestOptions, StateTransport},
    types::AbciQueryBody,
};

const QEVAL_PATH: &str = "vm/qeval";

#[derive(Debug, Clone)]
pub struct HTTP {
    pub config: Config,
    pub http: Client,
}

impl HTTP {
    pub fn new(config: Config) -> Result<HTTP, Error> {
        let http = match Client::builder()
            .timeout(config.request_timeout())
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                return Err(Error::ConfigurationError(e.to_string()));
            },
        };

        Ok(HTTP { config, http })
    }

    async fn check_status(
        endpoint: &str,
        response: Response,
    ) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let body = truncate(&body);
        error!(endpoint, status = status.as_u16(), body = %body, "remote request failed");

        Err(TransportError::Status {
            endpoint: endpoint.to_owned(),
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json(
        endpoint: &str,
        response: Response,
    ) -> Result<Value, TransportError> {
        let text =
            response
                .text()
                .await
                .map_err(|source| TransportError::Request {
                    endpoint: endpoint.to_owned(),
                    source,
                })?;

        serde_json::from_str(&text).map_err(|e| {
            error!(endpoint, body = %truncate(&text), "response is not json");
            TransportError::envelope(endpoint, e)
        })
    }

    async fn abci_query(
        &self,
        endpoint: &str,
        data: String,
    ) -> Result<String, TransportError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "abci_query",
            "params": [QEVAL_PATH, data, "0", false]
        });

        let response = self
            .http
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                endpoint: endpoint.to_owned(),
                source,
            })?;

        let response = Self::check_status(endpoint, response).await?;
        let value = Self::read_json(endpoint, response).await?;

        decode_abci_body(endpoint, value)
    }
}

/// Unwraps the JSON-RPC envelope of an `abci_query` reply into the UTF-8
/// text the node produced.
pub fn decode_abci_body(
    endpoint: &str,
    value: Value,
) -> Result<String, TransportError> {
    let body: AbciQueryBody = serde_json::from_value(value)
        .map_err(|e| TransportError::envelope(endpoint, e))?;

    if let Some(err) = body.error {
        return Err(TransportError::envelope(
            endpoint,
            format!("rpc error {}: {}", err.code, err.message),
        ));
    }

    let result = body.result.ok_or_else(|| {
        TransportError::envelope(endpoint, "missing `result` in rpc reply")
    })?;
    let base = result.response.response_base;

    if let Some(err) = base.error.filter(|err| !err.is_null()) {
        let log = base.log.unwrap_or_default();
        error!(endpoint, error = %err, log = %log, "node rejected query");
        return Err(TransportError::envelope(
            endpoint,
            format!("node error {}: {}", err, log),
        ));
    }

    let data = match base.data {
        Some(data) => data,
        None => return Ok(String::new()),
    };

    let bytes = general_purpose::STANDARD
        .decode(data.as_bytes())
        .map_err(|e| TransportError::envelope(endpoint, e))?;

    String::from_utf8(bytes).map_err(|e| TransportError::envelope(endpoint, e))
}

#[async_trait::async_trait]
impl StateTransport for HTTP {
    async fn evaluate(
        &self,
        realm_path: &str,
        expression: &str,
        options: &RequestOptions,
    ) -> Result<String, TransportError> {
        let endpoint = self.config.get_rpc_url();
        let data = general_purpose::STANDARD
            .encode(format!("{}.{}", realm_path, expression));

        debug!(realm_path, expression, "evaluating");
        options.run(&endpoint, self.abci_query(&endpoint, data)).await
    }
}

#[async_trait::async_trait]
impl IndexerTransport for HTTP {
    async fn post_graphql(
        &self,
        query: &str,
        operation_name: &str,
        variables: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<Value, TransportError> {
        let endpoint = self.config.get_graphql_url();
        let request = json!({
            "query": query,
            "operationName": operation_name,
            "variables": variables,
        });

        debug!(operation_name, "posting indexer query");

        let call = async {
            let response = self
                .http
                .post(&endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|source| {
                    error!(endpoint = %endpoint, error = %source, "indexer request failed");
                    TransportError::Request {
                        endpoint: endpoint.to_owned(),
                        source,
                    }
                })?;

            let response = Self::check_status(&endpoint, response).await?;
            Self::read_json(&endpoint, response).await
        };

        options.run(&endpoint, call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "http://127.0.0.1:26657";

    fn body(response_base: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "response": {
                    "ResponseBase": response_base,
                    "Height": "0"
                }
            }
        })
    }

    #[test]
    fn test_decode_abci_body() {
        let data = general_purpose::STANDARD.encode("(\"gno\" string)");
        let value = body(json!({ "Error": null, "Data": data, "Log": "" }));

        assert_eq!(decode_abci_body(ENDPOINT, value).unwrap(), "(\"gno\" string)");
    }

    #[test]
    fn test_decode_abci_node_error() {
        let value = body(json!({
            "Error": { "@type": "/std.InternalError" },
            "Data": null,
            "Log": "name ApiGetMarket not declared"
        }));

        match decode_abci_body(ENDPOINT, value) {
            Err(TransportError::Envelope { message, .. }) => {
                assert!(message.contains("not declared"))
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_rpc_error() {
        let value = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32603, "message": "Internal error" }
        });

        assert!(matches!(
            decode_abci_body(ENDPOINT, value),
            Err(TransportError::Envelope { .. })
        ));
    }

    #[test]
    fn test_decode_missing_data_is_empty() {
        let value = body(json!({ "Error": null, "Data": null }));
        assert_eq!(decode_abci_body(ENDPOINT, value).unwrap(), "");
    }
}

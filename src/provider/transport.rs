use std::{fmt, future::Future, time::Duration};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// Per call limits. A fired timeout or cancellation aborts the in-flight
/// request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub async fn run<F, T>(
        &self,
        endpoint: &str,
        future: F,
    ) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        let timed = async {
            match self.timeout {
                Some(timeout) => {
                    match tokio::time::timeout(timeout, future).await {
                        Ok(result) => result,
                        Err(_) => Err(TransportError::Timeout {
                            endpoint: endpoint.to_owned(),
                            timeout_ms: timeout.as_millis(),
                        }),
                    }
                },
                None => future.await,
            }
        };

        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(TransportError::Cancelled {
                        endpoint: endpoint.to_owned(),
                    }),
                    result = timed => result,
                }
            },
            None => timed.await,
        }
    }
}

/// Read-only expression evaluation against a realm.
#[async_trait::async_trait]
pub trait StateTransport: fmt::Debug + Send + Sync {
    /// Returns the raw textual result of evaluating `expression` inside
    /// `realm_path`.
    async fn evaluate(
        &self,
        realm_path: &str,
        expression: &str,
        options: &RequestOptions,
    ) -> Result<String, TransportError>;
}

#[async_trait::async_trait]
pub trait IndexerTransport: fmt::Debug + Send + Sync {
    /// Returns the full GraphQL response body, `data` and `errors` included.
    async fn post_graphql(
        &self,
        query: &str,
        operation_name: &str,
        variables: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<Value, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "http://127.0.0.1:26657";

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let options = RequestOptions::default();
        let result = options.run(ENDPOINT, async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let options =
            RequestOptions::default().with_timeout(Duration::from_millis(10));
        let result = options
            .run(ENDPOINT, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(TransportError::Timeout { timeout_ms: 10, .. })
        ));
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let options = RequestOptions::default().with_cancel(token);

        let result = options.run(ENDPOINT, async { Ok(1) }).await;

        assert!(matches!(result, Err(TransportError::Cancelled { .. })));
    }
}

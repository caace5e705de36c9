use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error};

use crate::{
    error::{Error, TransportError},
    handler::{
        aggregation::{self, Bucket},
        event_parsing::{attach_timestamps, parse_transactions, ParseOptions},
    },
    helpers::{is_gno_address, EventKind},
    model::{
        AprHistory, IndexedEvent, MarketActivity, ParsedEvents,
        PositionSnapshot, TimeSeriesPoint,
    },
    provider::{IndexerTransport, QueryBuilder, RequestOptions},
    types::{schema::index_path, BlockTime, GraphQLBody},
};

const MARKET_EVENTS_OPERATION: &str = "getMarketEvents";
const APR_EVENTS_OPERATION: &str = "getMarketAprEvents";
const BLOCKS_OPERATION: &str = "getBlocks";
const BLOCKS_PER_QUERY: usize = 100;

/// Selects exactly `heights`, one equality filter each.
fn blocks_query(heights: &[i64]) -> String {
    let filters = heights
        .iter()
        .map(|height| format!("{{ height: {{ eq: {} }} }}", height))
        .collect::<Vec<String>>()
        .join(", ");

    format!(
        "query {} {{\n  getBlocks(\n    where: {{ _or: [{}] }}\n  ) {{\n    height\n    time\n  }}\n}}",
        BLOCKS_OPERATION, filters
    )
}

/// Checks a GraphQL response body and returns its `data` object.
fn graphql_data(
    operation_name: &str,
    body: Value,
) -> Result<Value, TransportError> {
    let endpoint = format!("graphql:{}", operation_name);
    let body: GraphQLBody = serde_json::from_value(body)
        .map_err(|e| TransportError::envelope(&endpoint, e))?;

    if let Some(errors) = body.errors.filter(|errors| !errors.is_empty()) {
        let message = errors
            .iter()
            .map(|err| err.message.as_str())
            .collect::<Vec<&str>>()
            .join("; ");
        return Err(TransportError::envelope(&endpoint, message));
    }

    body.data
        .filter(|data| !data.is_null())
        .ok_or_else(|| TransportError::envelope(&endpoint, "missing `data`"))
}

fn data_list(
    operation_name: &str,
    data: &Value,
    key: &str,
) -> Result<Vec<Value>, TransportError> {
    data.get(key)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| {
            TransportError::envelope(
                &format!("graphql:{}", operation_name),
                format!("missing `data.{}`", key),
            )
        })
}

fn check_market_id(market_id: &str) -> Result<(), Error> {
    if market_id.trim().is_empty() {
        return Err(Error::QueryConstruction(String::from(
            "market id must not be empty",
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct IndexerClient {
    transport: Arc<dyn IndexerTransport>,
    options: RequestOptions,
}

impl IndexerClient {
    pub fn new(transport: Arc<dyn IndexerTransport>) -> Self {
        IndexerClient {
            transport,
            options: RequestOptions::default(),
        }
    }

    pub fn with_options(&self, options: RequestOptions) -> Self {
        IndexerClient {
            transport: self.transport.clone(),
            options,
        }
    }

    async fn post(
        &self,
        query: &str,
        operation_name: &str,
        variables: Option<&Value>,
        key: &str,
    ) -> Result<Vec<Value>, Error> {
        let result: Result<Vec<Value>, TransportError> = async {
            let body = self
                .transport
                .post_graphql(query, operation_name, variables, &self.options)
                .await?;
            let data = graphql_data(operation_name, body)?;
            data_list(operation_name, &data, key)
        }
        .await;

        result.map_err(|e| {
            error!(
                operation_name,
                status = ?e.status(),
                "Indexer query failed: {}", e
            );
            Error::IndexerQuery(e)
        })
    }

    /// Raw `getTransactions` items of `builder`'s query.
    pub async fn execute(
        &self,
        builder: &QueryBuilder,
        variables: Option<&Value>,
    ) -> Result<Vec<Value>, Error> {
        let query = builder.build();
        debug!(operation_name = builder.operation_name(), "executing indexer query");

        self.post(&query, builder.operation_name(), variables, "getTransactions")
            .await
    }

    /// Block times of `heights` the indexer knows, fetched in chunks of
    /// `BLOCKS_PER_QUERY`.
    pub async fn get_block_times(
        &self,
        heights: &[i64],
    ) -> Result<HashMap<i64, DateTime<Utc>>, Error> {
        let mut times = HashMap::with_capacity(heights.len());

        for chunk in heights.chunks(BLOCKS_PER_QUERY) {
            let query = blocks_query(chunk);
            let blocks =
                self.post(&query, BLOCKS_OPERATION, None, "getBlocks").await?;

            for (index, block) in blocks.into_iter().enumerate() {
                let path = index_path("$.data.getBlocks", index);
                let block: BlockTime = serde_json::from_value(block.clone())
                    .map_err(|_| Error::schema(path, &block))?;
                times.insert(block.height, block.time);
            }
        }

        Ok(times)
    }

    /// Executes `builder`, parses the transactions with `options` and
    /// resolves the block time of every kept event.
    pub async fn get_events(
        &self,
        builder: &QueryBuilder,
        options: &ParseOptions,
    ) -> Result<ParsedEvents, Error> {
        let transactions = self.execute(builder, None).await?;
        let mut parsed = parse_transactions(&transactions, options);

        let heights = parsed.heights();
        if !heights.is_empty() {
            let times = self.get_block_times(&heights).await?;
            attach_timestamps(&mut parsed, &times);
        }

        Ok(parsed)
    }

    /// Recognized events of one market.
    async fn market_events(
        &self,
        market_id: &str,
    ) -> Result<Vec<IndexedEvent>, Error> {
        check_market_id(market_id)?;

        let builder = QueryBuilder::new(MARKET_EVENTS_OPERATION)?
            .success(true)
            .market_id(market_id);

        let options = ParseOptions::market(market_id);
        Ok(self.get_events(&builder, &options).await?.events)
    }

    /// Borrow APR after each interest accrual of the market, with the
    /// 7, 30 and 90 day variations of the latest rate.
    pub async fn get_apr_history(
        &self,
        market_id: &str,
        bucket: Bucket,
    ) -> Result<AprHistory, Error> {
        check_market_id(market_id)?;

        let kind = EventKind::AccrueInterest;
        let builder = QueryBuilder::new(APR_EVENTS_OPERATION)?
            .success(true)
            .event_type("AccrueInterest")
            .market_id(market_id);
        let options = ParseOptions::market(market_id).with_kinds(&[kind]);

        let events = self.get_events(&builder, &options).await?.events;
        let history = aggregation::apr_history(&events, bucket).points;
        let variations = aggregation::apr_variations(&history);

        Ok(AprHistory {
            history,
            variations,
        })
    }

    pub async fn get_net_supply_history(
        &self,
        market_id: &str,
        bucket: Bucket,
    ) -> Result<Vec<TimeSeriesPoint>, Error> {
        let events = self.market_events(market_id).await?;
        Ok(aggregation::net_supply_history(&events, bucket).points)
    }

    pub async fn get_net_borrow_history(
        &self,
        market_id: &str,
        bucket: Bucket,
    ) -> Result<Vec<TimeSeriesPoint>, Error> {
        let events = self.market_events(market_id).await?;
        Ok(aggregation::net_borrow_history(&events, bucket).points)
    }

    pub async fn get_utilization_history(
        &self,
        market_id: &str,
        bucket: Bucket,
    ) -> Result<Vec<TimeSeriesPoint>, Error> {
        let events = self.market_events(market_id).await?;
        Ok(aggregation::utilization_history(&events, bucket).points)
    }

    pub async fn get_market_activity(
        &self,
        market_id: &str,
    ) -> Result<Vec<MarketActivity>, Error> {
        let events = self.market_events(market_id).await?;
        Ok(aggregation::market_activity(&events).points)
    }

    pub async fn get_position_history(
        &self,
        market_id: &str,
        user: &str,
        bucket: Bucket,
    ) -> Result<Vec<PositionSnapshot>, Error> {
        if !is_gno_address(user) {
            return Err(Error::QueryConstruction(format!(
                "invalid user address {:?}",
                user
            )));
        }

        let events = self.market_events(market_id).await?;
        Ok(aggregation::position_history(&events, user, bucket).points)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bigdecimal::BigDecimal;
    use serde_json::json;

    use super::*;
    use crate::handler::event_parsing::tests::{gno_event, tx};

    const USER: &str = "g1jg8mtutu9khhfwc4nxmuhcpftf0pajdhfvsqf5";

    #[derive(Debug, Default)]
    struct MockIndexer {
        transactions: Vec<Value>,
        blocks: Vec<Value>,
        errors: Option<Value>,
        fail_status: Option<u16>,
        queries: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl IndexerTransport for MockIndexer {
        async fn post_graphql(
            &self,
            query: &str,
            operation_name: &str,
            _variables: Option<&Value>,
            _options: &RequestOptions,
        ) -> Result<Value, TransportError> {
            self.queries
                .lock()
                .unwrap()
                .push((operation_name.to_owned(), query.to_owned()));

            if let Some(status) = self.fail_status {
                return Err(TransportError::Status {
                    endpoint: String::from("http://localhost:3100/graphql/query"),
                    status,
                    body: String::from("internal server error"),
                });
            }

            if let Some(errors) = &self.errors {
                return Ok(json!({ "data": null, "errors": errors }));
            }

            Ok(match operation_name {
                BLOCKS_OPERATION => json!({ "data": { "getBlocks": self.blocks } }),
                _ => json!({ "data": { "getTransactions": self.transactions } }),
            })
        }
    }

    fn block(height: i64, time: &str) -> Value {
        json!({ "height": height, "time": time })
    }

    fn market_mock() -> MockIndexer {
        MockIndexer {
            transactions: vec![
                tx("a", 10, USER, vec![
                    gno_event("Supply", &[("market_id", "1"), ("assets", "100"), ("shares", "100")]),
                ]),
                tx("b", 11, USER, vec![
                    gno_event("Withdraw", &[("market_id", "1"), ("assets", "30"), ("shares", "30")]),
                    gno_event("Supply", &[("market_id", "2"), ("assets", "5")]),
                ]),
            ],
            blocks: vec![
                block(10, "2024-06-10T06:13:20Z"),
                block(11, "2024-06-10T06:13:25Z"),
            ],
            ..Default::default()
        }
    }

    fn new_client(mock: MockIndexer) -> (Arc<MockIndexer>, IndexerClient) {
        let mock = Arc::new(mock);
        (mock.clone(), IndexerClient::new(mock))
    }

    #[tokio::test]
    async fn test_net_supply_history() {
        let (mock, client) = new_client(market_mock());

        let series = client
            .get_net_supply_history("1", Bucket::Timestamp)
            .await
            .unwrap();

        let values: Vec<(String, BigDecimal)> = series
            .iter()
            .map(|p| (p.timestamp.unwrap().to_rfc3339(), p.value.clone()))
            .collect();
        assert_eq!(
            values,
            vec![
                (String::from("2024-06-10T06:13:20+00:00"), BigDecimal::from(100)),
                (String::from("2024-06-10T06:13:25+00:00"), BigDecimal::from(70)),
            ]
        );

        let queries = mock.queries.lock().unwrap();
        assert_eq!(queries[0].0, MARKET_EVENTS_OPERATION);
        assert!(queries[0].1.contains("value: { eq: \"1\" }"));
        assert_eq!(queries[1].0, BLOCKS_OPERATION);
        assert!(queries[1]
            .1
            .contains("_or: [{ height: { eq: 10 } }, { height: { eq: 11 } }]"));
    }

    #[tokio::test]
    async fn test_position_history() {
        let (_, client) = new_client(market_mock());

        let history = client
            .get_position_history("1", USER, Bucket::Block)
            .await
            .unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].supply_shares.as_str(), "70");

        assert!(matches!(
            client.get_position_history("1", "nobody", Bucket::Block).await,
            Err(Error::QueryConstruction(_))
        ));
    }

    #[tokio::test]
    async fn test_server_error_fails_whole_series() {
        let (_, client) = new_client(MockIndexer {
            fail_status: Some(500),
            ..market_mock()
        });

        let err = client.get_market_activity("1").await.unwrap_err();

        assert!(err.is_retryable());
        assert!(matches!(
            err,
            Error::IndexerQuery(TransportError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_graphql_errors_are_envelope_errors() {
        let (_, client) = new_client(MockIndexer {
            errors: Some(json!([{ "message": "unknown field" }])),
            ..Default::default()
        });

        match client.get_market_activity("1").await {
            Err(Error::IndexerQuery(TransportError::Envelope { message, .. })) => {
                assert_eq!(message, "unknown field")
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_block_time_keeps_running_total() {
        let (_, client) = new_client(MockIndexer {
            blocks: vec![block(11, "2024-06-10T06:13:25Z")],
            ..market_mock()
        });

        let series = client
            .get_net_supply_history("1", Bucket::Timestamp)
            .await
            .unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].value, BigDecimal::from(70));

        let blocks = client
            .get_net_supply_history("1", Bucket::Block)
            .await
            .unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].timestamp, None);
        assert_eq!(blocks[0].value, BigDecimal::from(100));
        assert_eq!(blocks[1].label.as_deref(), Some("11"));
        assert_eq!(blocks[1].value, BigDecimal::from(70));
    }

    #[tokio::test]
    async fn test_block_times_only_query_event_heights() {
        let (mock, client) = new_client(MockIndexer {
            transactions: vec![
                tx("a", 10, USER, vec![
                    gno_event("Supply", &[("market_id", "1"), ("assets", "1")]),
                ]),
                tx("b", 5_000_000, USER, vec![
                    gno_event("Supply", &[("market_id", "1"), ("assets", "1")]),
                ]),
                tx("c", 10, USER, vec![
                    gno_event("Supply", &[("market_id", "1"), ("assets", "1")]),
                ]),
            ],
            ..Default::default()
        });

        client
            .get_net_supply_history("1", Bucket::Block)
            .await
            .unwrap();

        let queries = mock.queries.lock().unwrap();
        assert_eq!(queries.len(), 2);
        assert!(queries[1].1.contains(
            "where: { _or: [{ height: { eq: 10 } }, { height: { eq: 5000000 } }] }"
        ));
        assert!(!queries[1].1.contains("gt:"));
    }

    #[tokio::test]
    async fn test_block_times_are_chunked() {
        let (mock, client) = new_client(MockIndexer::default());
        let heights: Vec<i64> = (1..=BLOCKS_PER_QUERY as i64 + 1).collect();

        let times = client.get_block_times(&heights).await.unwrap();

        assert!(times.is_empty());
        let queries = mock.queries.lock().unwrap();
        assert_eq!(queries.len(), 2);
        assert!(queries[1].1.contains(&format!(
            "_or: [{{ height: {{ eq: {} }} }}]",
            BLOCKS_PER_QUERY + 1
        )));
    }

    #[tokio::test]
    async fn test_extreme_block_height_does_not_overflow() {
        let (mock, client) = new_client(MockIndexer {
            transactions: vec![tx("a", i64::MAX, USER, vec![
                gno_event("Supply", &[("market_id", "1"), ("assets", "100")]),
            ])],
            ..Default::default()
        });

        let series = client
            .get_net_supply_history("1", Bucket::Block)
            .await
            .unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label, Some(i64::MAX.to_string()));
        let queries = mock.queries.lock().unwrap();
        assert!(queries[1].1.contains("eq: 9223372036854775807"));
    }

    #[tokio::test]
    async fn test_apr_history() {
        let (mock, client) = new_client(MockIndexer {
            transactions: vec![
                tx("a", 10, USER, vec![
                    gno_event("AccrueInterest", &[
                        ("market_id", "1"),
                        ("borrow_apr", "40000000000000000"),
                    ]),
                    gno_event("Supply", &[("market_id", "1"), ("assets", "5")]),
                ]),
                tx("b", 11, USER, vec![
                    gno_event("AccrueInterest", &[
                        ("market_id", "1"),
                        ("borrow_apr", "50000000000000000"),
                    ]),
                ]),
            ],
            ..market_mock()
        });

        let apr = client.get_apr_history("1", Bucket::Timestamp).await.unwrap();

        let values: Vec<String> =
            apr.history.iter().map(|p| p.value.normalized().to_string()).collect();
        assert_eq!(values, vec!["0.04", "0.05"]);
        assert_eq!(apr.variations.seven_day, None);

        let queries = mock.queries.lock().unwrap();
        assert_eq!(queries[0].0, APR_EVENTS_OPERATION);
        assert!(queries[0].1.contains("type: { eq: \"AccrueInterest\" }"));

        drop(queries);
        assert!(matches!(
            client.get_apr_history(" ", Bucket::Timestamp).await,
            Err(Error::QueryConstruction(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_history() {
        let (mock, client) = new_client(MockIndexer::default());

        let activity = client.get_market_activity("1").await.unwrap();

        assert!(activity.is_empty());
        assert_eq!(mock.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_block_payload() {
        let (_, client) = new_client(MockIndexer {
            blocks: vec![json!({ "height": 10, "time": "yesterday" })],
            ..market_mock()
        });

        match client.get_block_times(&[10, 11]).await {
            Err(Error::SchemaValidation { path, .. }) => {
                assert_eq!(path, "$.data.getBlocks[0]")
            },
            other => panic!("unexpected {:?}", other),
        }
    }
}

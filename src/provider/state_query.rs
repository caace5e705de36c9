use std::{fmt, sync::Arc};

use tracing::debug;

use crate::{
    error::Error,
    helpers::{is_gno_address, is_identifier, quote_string, EvalResult},
    provider::{RequestOptions, StateTransport},
    types::{
        parse_validated, schema::ROOT, HealthFactor, LoanAmount, Market,
        MarketInfo, MarketInfoList, MarketList, MarketParams, Position,
        UserLoan, Validate,
    },
};

/// A call of one exported realm function with string arguments. Arguments
/// are kept apart from the function name and only rendered as escaped
/// literals, never spliced in as raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    function: String,
    args: Vec<String>,
}

impl Expression {
    pub fn call(function: &str) -> Self {
        Expression {
            function: function.to_owned(),
            args: vec![],
        }
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn render(&self) -> Result<String, Error> {
        if !is_identifier(&self.function) {
            return Err(Error::QueryConstruction(format!(
                "invalid function name {:?}",
                self.function
            )));
        }

        let args = self
            .args
            .iter()
            .map(|arg| quote_string(arg))
            .collect::<Result<Vec<String>, Error>>()?;

        Ok(format!("{}({})", self.function, args.join(", ")))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.render() {
            Ok(expression) => write!(f, "{}", expression),
            Err(_) => write!(f, "{}(<invalid>)", self.function),
        }
    }
}

fn market_arg(market_id: &str) -> Result<&str, Error> {
    if market_id.trim().is_empty() {
        return Err(Error::QueryConstruction(String::from(
            "market id must not be empty",
        )));
    }
    Ok(market_id)
}

fn user_arg(user: &str) -> Result<&str, Error> {
    if !is_gno_address(user) {
        return Err(Error::QueryConstruction(format!(
            "invalid user address {:?}",
            user
        )));
    }
    Ok(user)
}

#[derive(Debug, Clone)]
pub struct StateQueryClient {
    transport: Arc<dyn StateTransport>,
    realm_path: String,
    options: RequestOptions,
}

impl StateQueryClient {
    pub fn new(transport: Arc<dyn StateTransport>, realm_path: String) -> Self {
        StateQueryClient {
            transport,
            realm_path,
            options: RequestOptions::default(),
        }
    }

    /// Same client, every call bounded by `options`.
    pub fn with_options(&self, options: RequestOptions) -> Self {
        StateQueryClient {
            transport: self.transport.clone(),
            realm_path: self.realm_path.to_owned(),
            options,
        }
    }

    pub fn realm_path(&self) -> &str {
        &self.realm_path
    }

    async fn evaluate(&self, expression: &Expression) -> Result<String, Error> {
        let rendered = expression.render()?;
        debug!(realm_path = %self.realm_path, expression = %rendered, "qeval");

        self.transport
            .evaluate(&self.realm_path, &rendered, &self.options)
            .await
            .map_err(Error::RemoteQuery)
    }

    /// `None` when the function returned nothing or `nil`.
    async fn evaluate_string(
        &self,
        expression: &Expression,
    ) -> Result<Option<String>, Error> {
        let raw = self.evaluate(expression).await?;

        if raw.trim().is_empty() {
            return Ok(None);
        }

        let result =
            EvalResult::parse(&raw).ok_or_else(|| Error::schema(ROOT, &raw))?;

        if result.is_nil() {
            return Ok(None);
        }

        result
            .as_string()
            .map(Some)
            .ok_or_else(|| Error::schema(ROOT, &raw))
    }

    async fn evaluate_json<T: Validate>(
        &self,
        expression: &Expression,
    ) -> Result<T, Error> {
        match self.evaluate_string(expression).await? {
            Some(json) => parse_validated(&json),
            None => Err(Error::schema(ROOT, "<empty>")),
        }
    }

    pub async fn get_market(&self, market_id: &str) -> Result<Market, Error> {
        let expression =
            Expression::call("ApiGetMarket").arg(market_arg(market_id)?);
        self.evaluate_json(&expression).await
    }

    pub async fn get_market_params(
        &self,
        market_id: &str,
    ) -> Result<MarketParams, Error> {
        let expression =
            Expression::call("ApiGetMarketParams").arg(market_arg(market_id)?);
        self.evaluate_json(&expression).await
    }

    pub async fn get_market_info(
        &self,
        market_id: &str,
    ) -> Result<MarketInfo, Error> {
        let expression =
            Expression::call("ApiGetMarketInfo").arg(market_arg(market_id)?);
        self.evaluate_json(&expression).await
    }

    pub async fn get_position(
        &self,
        market_id: &str,
        user: &str,
    ) -> Result<Position, Error> {
        let expression = Expression::call("ApiGetPosition")
            .arg(market_arg(market_id)?)
            .arg(user_arg(user)?);
        self.evaluate_json(&expression).await
    }

    /// A user without a position has no health factor on chain, reported as
    /// [`HealthFactor::zero`].
    pub async fn get_health_factor(
        &self,
        market_id: &str,
        user: &str,
    ) -> Result<HealthFactor, Error> {
        let expression = Expression::call("ApiGetHealthFactor")
            .arg(market_arg(market_id)?)
            .arg(user_arg(user)?);

        match self.evaluate_string(&expression).await? {
            Some(json) if !json.trim().is_empty() => parse_validated(&json),
            _ => Ok(HealthFactor::zero()),
        }
    }

    pub async fn get_loan_amount(
        &self,
        market_id: &str,
        user: &str,
    ) -> Result<LoanAmount, Error> {
        let expression = Expression::call("ApiGetLoanAmount")
            .arg(market_arg(market_id)?)
            .arg(user_arg(user)?);
        self.evaluate_json(&expression).await
    }

    pub async fn list_markets(&self) -> Result<MarketList, Error> {
        self.evaluate_json(&Expression::call("ApiListMarkets")).await
    }

    pub async fn list_markets_info(&self) -> Result<MarketInfoList, Error> {
        self.evaluate_json(&Expression::call("ApiListMarketsInfo")).await
    }

    pub async fn get_user_loans(
        &self,
        user: &str,
    ) -> Result<Vec<UserLoan>, Error> {
        let expression = Expression::call("ApiGetUserLoans").arg(user_arg(user)?);
        self.evaluate_json(&expression).await
    }

    pub async fn get_fee_recipient(&self) -> Result<String, Error> {
        self.evaluate_string(&Expression::call("GetFeeRecipient"))
            .await?
            .ok_or_else(|| Error::schema(ROOT, "<empty>"))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{error::TransportError, types::market_info_json};

    const USER: &str = "g1jg8mtutu9khhfwc4nxmuhcpftf0pajdhfvsqf5";
    const REALM: &str = "gno.land/r/gnolend";

    #[derive(Debug, Default)]
    struct MockState {
        reply: Option<String>,
        fail_status: Option<u16>,
        expressions: Mutex<Vec<String>>,
    }

    impl MockState {
        fn json(value: Value) -> Self {
            MockState {
                reply: Some(format!(
                    "({} string)",
                    quote_string(&value.to_string()).unwrap()
                )),
                ..Default::default()
            }
        }

        fn raw(reply: &str) -> Self {
            MockState {
                reply: Some(reply.to_owned()),
                ..Default::default()
            }
        }

        fn last_expression(&self) -> String {
            self.expressions.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl StateTransport for MockState {
        async fn evaluate(
            &self,
            realm_path: &str,
            expression: &str,
            options: &RequestOptions,
        ) -> Result<String, TransportError> {
            assert_eq!(realm_path, REALM);
            self.expressions.lock().unwrap().push(expression.to_owned());

            let reply = self.reply.clone();
            let status = self.fail_status;

            options
                .run("mock", async move {
                    if let Some(status) = status {
                        return Err(TransportError::Status {
                            endpoint: String::from("mock"),
                            status,
                            body: String::from("unavailable"),
                        });
                    }
                    if reply.is_none() {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Ok(reply.unwrap_or_default())
                })
                .await
        }
    }

    fn new_client(mock: MockState) -> (Arc<MockState>, StateQueryClient) {
        let mock = Arc::new(mock);
        let client = StateQueryClient::new(mock.clone(), String::from(REALM));
        (mock, client)
    }

    #[test]
    fn test_expression_render() {
        let expression = Expression::call("ApiGetPosition").arg("1").arg(USER);
        assert_eq!(
            expression.render().unwrap(),
            format!("ApiGetPosition(\"1\", \"{}\")", USER)
        );
        assert_eq!(Expression::call("ApiListMarkets").render().unwrap(), "ApiListMarkets()");
    }

    #[test]
    fn test_expression_rejects_bad_input() {
        assert!(matches!(
            Expression::call("Api.Get()//").render(),
            Err(Error::QueryConstruction(_))
        ));
        assert!(matches!(
            Expression::call("").render(),
            Err(Error::QueryConstruction(_))
        ));
        assert!(matches!(
            Expression::call("ApiGetMarket").arg("a\0").render(),
            Err(Error::QueryConstruction(_))
        ));
    }

    #[tokio::test]
    async fn test_get_market_info() {
        let raw = market_info_json("gno.land/r/demo/market1");
        let (mock, client) = new_client(MockState::json(raw.clone()));

        let info = client.get_market_info("gno.land/r/demo/market1").await.unwrap();

        assert_eq!(info.pool_path(), "gno.land/r/demo/market1");
        assert_eq!(
            info.market.total_supply_assets.as_str(),
            raw["totalSupplyAssets"].as_str().unwrap()
        );
        assert_eq!(info.params.lltv.as_str(), raw["lltv"].as_str().unwrap());
        assert_eq!(
            mock.last_expression(),
            "ApiGetMarketInfo(\"gno.land/r/demo/market1\")"
        );
    }

    #[tokio::test]
    async fn test_market_id_cannot_escape_argument() {
        let (mock, client) = new_client(MockState::json(json!({
            "totalSupplyAssets": "0",
            "totalSupplyShares": "0",
            "totalBorrowAssets": "0",
            "totalBorrowShares": "0",
            "lastUpdate": 0,
            "fee": "0"
        })));

        client.get_market("1\") + Evil(\"").await.unwrap();

        assert_eq!(
            mock.last_expression(),
            r#"ApiGetMarket("1\") + Evil(\"")"#
        );
    }

    #[tokio::test]
    async fn test_invalid_user_fails_before_network() {
        let (mock, client) = new_client(MockState::raw(""));

        let result = client.get_position("1", "g1\"); Withdraw(\"").await;

        assert!(matches!(result, Err(Error::QueryConstruction(_))));
        assert!(mock.expressions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_position() {
        let (_, client) = new_client(MockState::json(json!({
            "supplyShares": "0",
            "borrowShares": "0",
            "collateral": "0"
        })));

        let position = client.get_position("1", USER).await.unwrap();
        assert!(!position.has_position());
    }

    #[tokio::test]
    async fn test_health_factor_sentinel() {
        let (_, client) = new_client(MockState::raw(""));
        assert!(client.get_health_factor("1", USER).await.unwrap().is_zero());

        let (_, client) = new_client(MockState::raw("(\"\" string)"));
        assert!(client.get_health_factor("1", USER).await.unwrap().is_zero());

        let (_, client) = new_client(MockState::json(json!({ "healthFactor": "1.5" })));
        let hf = client.get_health_factor("1", USER).await.unwrap();
        assert_eq!(hf.health_factor, "1.5");
    }

    #[tokio::test]
    async fn test_list_markets() {
        let (_, client) = new_client(MockState::json(json!({
            "markets": [
                { "1": {
                    "totalSupplyAssets": "5",
                    "totalSupplyShares": "5",
                    "totalBorrowAssets": "1",
                    "totalBorrowShares": "1",
                    "lastUpdate": 10,
                    "fee": "0"
                } }
            ]
        })));

        let markets = client.list_markets().await.unwrap();
        assert_eq!(markets.0.len(), 1);
        assert_eq!(markets.0[0].market_id, "1");
    }

    #[tokio::test]
    async fn test_schema_error_is_not_retryable() {
        let (_, client) = new_client(MockState::json(json!({ "amount": 12 })));

        let err = client.get_loan_amount("1", USER).await.unwrap_err();
        assert!(matches!(err, Error::SchemaValidation { ref path, .. } if path == "$.amount"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unexpected_result_type() {
        let (_, client) = new_client(MockState::raw("(12 int)"));
        assert!(matches!(
            client.get_fee_recipient().await,
            Err(Error::SchemaValidation { .. })
        ));

        let (_, client) = new_client(MockState::raw(&format!("(\"{}\" string)", USER)));
        assert_eq!(client.get_fee_recipient().await.unwrap(), USER);

        let (_, client) = new_client(MockState::raw(r#"("g1\xff" string)"#));
        assert!(matches!(
            client.get_fee_recipient().await,
            Err(Error::SchemaValidation { .. })
        ));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let (_, client) = new_client(MockState {
            fail_status: Some(503),
            ..Default::default()
        });

        let err = client.get_user_loans(USER).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, Error::RemoteQuery(TransportError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_timeout_and_cancel() {
        let (_, client) = new_client(MockState::default());

        let timed = client.with_options(
            RequestOptions::default().with_timeout(Duration::from_millis(20)),
        );
        assert!(matches!(
            timed.list_markets_info().await,
            Err(Error::RemoteQuery(TransportError::Timeout { .. }))
        ));

        let token = CancellationToken::new();
        let cancellable =
            client.with_options(RequestOptions::default().with_cancel(token.clone()));
        token.cancel();
        assert!(matches!(
            cancellable.list_markets_info().await,
            Err(Error::RemoteQuery(TransportError::Cancelled { .. }))
        ));
    }
}

//! Market state endpoints
//!
//! Read straight from the realm, one `vm/qeval` per request.

use actix_web::{get, web, Responder};
use serde::Deserialize;

use crate::{
    configuration::{AppState, State},
    error::Error,
    helpers::required_param,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketQuery {
    market_id: Option<String>,
}

#[get("/market")]
pub async fn market(
    state: web::Data<AppState<State>>,
    query: web::Query<MarketQuery>,
) -> Result<impl Responder, Error> {
    let market_id = required_param(&query.market_id, "marketId")?;
    let data = state.state_query.get_market(market_id).await?;
    Ok(web::Json(data))
}

#[get("/market-params")]
pub async fn market_params(
    state: web::Data<AppState<State>>,
    query: web::Query<MarketQuery>,
) -> Result<impl Responder, Error> {
    let market_id = required_param(&query.market_id, "marketId")?;
    let data = state.state_query.get_market_params(market_id).await?;
    Ok(web::Json(data))
}

#[get("/market-info")]
pub async fn market_info(
    state: web::Data<AppState<State>>,
    query: web::Query<MarketQuery>,
) -> Result<impl Responder, Error> {
    let market_id = required_param(&query.market_id, "marketId")?;
    let data = state.state_query.get_market_info(market_id).await?;
    Ok(web::Json(data))
}

#[get("/markets")]
pub async fn markets(
    state: web::Data<AppState<State>>,
) -> Result<impl Responder, Error> {
    let data = state.state_query.list_markets().await?;
    Ok(web::Json(data))
}

#[get("/markets-info")]
pub async fn markets_info(
    state: web::Data<AppState<State>>,
) -> Result<impl Responder, Error> {
    let data = state.state_query.list_markets_info().await?;
    Ok(web::Json(data))
}

#[get("/fee-recipient")]
pub async fn fee_recipient(
    state: web::Data<AppState<State>>,
) -> Result<impl Responder, Error> {
    let data = state.state_query.get_fee_recipient().await?;
    Ok(web::Json(data))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};

    use super::*;
    use crate::configuration::{Config, DEFAULT_REALM_PATH};

    fn app_state() -> AppState<State> {
        let config = Config {
            rpc_host: String::from("http://127.0.0.1:1"),
            indexer_host: String::from("http://127.0.0.1:1"),
            realm_path: String::from(DEFAULT_REALM_PATH),
            timeout: 1,
            server_host: String::from("127.0.0.1"),
            port: 0,
            allowed_origins: vec![],
        };
        AppState::new(State::new(config).unwrap())
    }

    #[actix_web::test]
    async fn test_missing_market_id_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .service(web::scope("/api").service(market_info)),
        )
        .await;

        let request = test::TestRequest::get().uri("/api/market-info").to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

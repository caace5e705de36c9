//! Indexer backed history endpoints
//!
//! Every series is rebuilt from the market's events on each request.

use actix_web::{get, web, Responder};
use serde::Deserialize;

use crate::{
    configuration::{AppState, State},
    error::Error,
    handler::aggregation::Bucket,
    helpers::required_param,
};

// =============================================================================
// Market Series
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesQuery {
    market_id: Option<String>,
    bucket: Option<Bucket>,
}

#[get("/net-supply-history")]
pub async fn net_supply_history(
    state: web::Data<AppState<State>>,
    query: web::Query<SeriesQuery>,
) -> Result<impl Responder, Error> {
    let market_id = required_param(&query.market_id, "marketId")?;
    let data = state
        .indexer
        .get_net_supply_history(market_id, query.bucket.unwrap_or_default())
        .await?;
    Ok(web::Json(data))
}

#[get("/net-borrow-history")]
pub async fn net_borrow_history(
    state: web::Data<AppState<State>>,
    query: web::Query<SeriesQuery>,
) -> Result<impl Responder, Error> {
    let market_id = required_param(&query.market_id, "marketId")?;
    let data = state
        .indexer
        .get_net_borrow_history(market_id, query.bucket.unwrap_or_default())
        .await?;
    Ok(web::Json(data))
}

#[get("/utilization-history")]
pub async fn utilization_history(
    state: web::Data<AppState<State>>,
    query: web::Query<SeriesQuery>,
) -> Result<impl Responder, Error> {
    let market_id = required_param(&query.market_id, "marketId")?;
    let data = state
        .indexer
        .get_utilization_history(market_id, query.bucket.unwrap_or_default())
        .await?;
    Ok(web::Json(data))
}

#[get("/market-activity")]
pub async fn market_activity(
    state: web::Data<AppState<State>>,
    query: web::Query<SeriesQuery>,
) -> Result<impl Responder, Error> {
    let market_id = required_param(&query.market_id, "marketId")?;
    let data = state.indexer.get_market_activity(market_id).await?;
    Ok(web::Json(data))
}

#[get("/apr-history")]
pub async fn apr_history(
    state: web::Data<AppState<State>>,
    query: web::Query<SeriesQuery>,
) -> Result<impl Responder, Error> {
    let market_id = required_param(&query.market_id, "marketId")?;
    let data = state
        .indexer
        .get_apr_history(market_id, query.bucket.unwrap_or_default())
        .await?;
    Ok(web::Json(data))
}

// =============================================================================
// Position History
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionHistoryQuery {
    market_id: Option<String>,
    user: Option<String>,
    bucket: Option<Bucket>,
}

#[get("/position-history")]
pub async fn position_history(
    state: web::Data<AppState<State>>,
    query: web::Query<PositionHistoryQuery>,
) -> Result<impl Responder, Error> {
    let market_id = required_param(&query.market_id, "marketId")?;
    let user = required_param(&query.user, "user")?;
    let data = state
        .indexer
        .get_position_history(market_id, user, query.bucket.unwrap_or_default())
        .await?;
    Ok(web::Json(data))
}

//! Position-related API endpoints

use actix_web::{get, web, Responder};
use serde::Deserialize;

use crate::{
    configuration::{AppState, State},
    error::Error,
    helpers::required_param,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionQuery {
    market_id: Option<String>,
    user: Option<String>,
}

#[get("/position")]
pub async fn position(
    state: web::Data<AppState<State>>,
    query: web::Query<PositionQuery>,
) -> Result<impl Responder, Error> {
    let market_id = required_param(&query.market_id, "marketId")?;
    let user = required_param(&query.user, "user")?;
    let data = state.state_query.get_position(market_id, user).await?;
    Ok(web::Json(data))
}

#[get("/health-factor")]
pub async fn health_factor(
    state: web::Data<AppState<State>>,
    query: web::Query<PositionQuery>,
) -> Result<impl Responder, Error> {
    let market_id = required_param(&query.market_id, "marketId")?;
    let user = required_param(&query.user, "user")?;
    let data = state
        .state_query
        .get_health_factor(market_id, user)
        .await?;
    Ok(web::Json(data))
}

#[get("/loan-amount")]
pub async fn loan_amount(
    state: web::Data<AppState<State>>,
    query: web::Query<PositionQuery>,
) -> Result<impl Responder, Error> {
    let market_id = required_param(&query.market_id, "marketId")?;
    let user = required_param(&query.user, "user")?;
    let data = state.state_query.get_loan_amount(market_id, user).await?;
    Ok(web::Json(data))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    user: Option<String>,
}

#[get("/user-loans")]
pub async fn user_loans(
    state: web::Data<AppState<State>>,
    query: web::Query<UserQuery>,
) -> Result<impl Responder, Error> {
    let user = required_param(&query.user, "user")?;
    let data = state.state_query.get_user_loans(user).await?;
    Ok(web::Json(data))
}

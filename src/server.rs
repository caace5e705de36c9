use actix_cors::Cors;
use actix_web::{dev::Server, http::header, middleware, web, App, HttpServer};
use tracing::info;

use crate::{
    configuration::{AppState, State},
    controller::{history, markets, positions},
    error::Error,
};

pub async fn server_task(app_state: &AppState<State>) -> Result<(), Error> {
    let app = app_state.clone();
    tokio::spawn(async move {
        let server = init_server(app)?;
        server.await?;
        Ok(())
    })
    .await?
}

fn init_server(app_state: AppState<State>) -> Result<Server, Error> {
    let host = app_state.config.server_host.to_owned();
    let port = app_state.config.port;

    info!("Listening on {}:{}", host, port);

    let server = HttpServer::new(move || {
        let app = app_state.clone();
        let allowed_cors = String::from("*");
        let cors_access_all =
            app.config.allowed_origins.contains(&allowed_cors);
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                if cors_access_all {
                    return true;
                }
                let allowed = &app.config.allowed_origins;
                if let Ok(origin) = origin.to_str() {
                    return allowed.contains(&origin.to_owned());
                }
                false
            })
            .allowed_methods(vec!["GET"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT])
            .allowed_header(header::CONTENT_TYPE);

        App::new()
            .wrap(cors)
            .wrap(middleware::Compress::default())
            .app_data(web::Data::new(app_state.clone()))
            .service(
                web::scope("/api")
                    .service(markets::market)
                    .service(markets::market_params)
                    .service(markets::market_info)
                    .service(markets::markets)
                    .service(markets::markets_info)
                    .service(markets::fee_recipient)
                    .service(positions::position)
                    .service(positions::health_factor)
                    .service(positions::loan_amount)
                    .service(positions::user_loans)
                    .service(history::net_supply_history)
                    .service(history::net_borrow_history)
                    .service(history::utilization_history)
                    .service(history::market_activity)
                    .service(history::apr_history)
                    .service(history::position_history),
            )
    })
    .bind((host, port))?
    .disable_signals()
    .run();
    Ok(server)
}

use axum::{
    Router,
    routing::get,
    extract::{State, Json},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use crate::api::websocket::websocket_handler;
use crate::error::Error;
use crate::observability::metrics;
use crate::oracle::{OracleHealth, PriceOracle};
use crate::types::Quote;

pub fn create_router(oracle: Arc<PriceOracle>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/price", get(get_price))
        .route("/price/details", get(get_price_details))
        .route("/metrics", get(get_metrics))
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(oracle)
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

struct ApiError(Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_no_quorum() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

async fn health_check(State(oracle): State<Arc<PriceOracle>>) -> Json<OracleHealth> {
    Json(oracle.get_health())
}

#[derive(serde::Serialize)]
struct PriceResponse {
    price: f64,
}

async fn get_price(
    State(oracle): State<Arc<PriceOracle>>,
) -> Result<Json<PriceResponse>, ApiError> {
    let price = oracle.get_price().await.map_err(ApiError)?;
    Ok(Json(PriceResponse { price }))
}

async fn get_price_details(
    State(oracle): State<Arc<PriceOracle>>,
) -> Result<Json<Quote>, ApiError> {
    oracle.get_price_with_details().await.map(Json).map_err(ApiError)
}

async fn get_metrics() -> Result<Response, ApiError> {
    let body = metrics::render().map_err(ApiError)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}

//! Warp filters for the gateway's HTTP surface
//!
//! - `GET /` → `200 pong`
//! - `GET /notification?name=<s>` → `200` with the greeting as JSON, or an
//!   error status with `{"error": "..."}`

use crate::gateway::{Gateway, NotificationQuery};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Every gateway route
pub fn routes(
    gateway: Arc<Gateway>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    ping()
        .or(notification(gateway))
        .with(warp::trace::request())
}

/// `GET /`
pub fn ping() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::get().and(warp::path::end()).map(|| "pong")
}

/// `GET /notification?name=<s>`
pub fn notification(
    gateway: Arc<Gateway>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path("notification"))
        .and(warp::path::end())
        .and(warp::query::<NotificationQuery>())
        .and(with_gateway(gateway))
        .and_then(handle_notification)
}

fn with_gateway(
    gateway: Arc<Gateway>,
) -> impl Filter<Extract = (Arc<Gateway>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&gateway))
}

async fn handle_notification(
    query: NotificationQuery,
    gateway: Arc<Gateway>,
) -> Result<warp::reply::Response, Infallible> {
    let response = match gateway.handle(query).await {
        Ok(greeting) => {
            warp::reply::with_status(warp::reply::json(&greeting), StatusCode::OK).into_response()
        }
        Err(e) => warp::reply::with_status(
            warp::reply::json(&json!({ "error": e.to_string() })),
            e.status(),
        )
        .into_response(),
    };
    Ok(response)
}

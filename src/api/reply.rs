//! Turning operation results into HTTP replies

use crate::error::{DashboardError, DashboardResult};
use crate::observability::metrics::metrics;
use crate::request_span;
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use tracing::{error, warn, Instrument};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

/// Run one API operation inside a request span and render its outcome
pub(crate) async fn handle<T, F>(route: &'static str, operation: F) -> Result<Response, Infallible>
where
    T: Serialize,
    F: Future<Output = DashboardResult<T>>,
{
    let span = request_span!(route);
    let result = operation.instrument(span.clone()).await;
    Ok(span.in_scope(|| respond(route, result)))
}

pub(crate) fn respond<T: Serialize>(route: &'static str, result: DashboardResult<T>) -> Response {
    match result {
        Ok(value) => {
            metrics().api_request(route, true);
            warp::reply::json(&value).into_response()
        }
        Err(e) => {
            metrics().api_request(route, false);
            log_failure(route, &e);
            error_reply(&e)
        }
    }
}

pub(crate) fn error_reply(e: &DashboardError) -> Response {
    warp::reply::with_status(warp::reply::json(&e.to_error_body()), e.status_code()).into_response()
}

fn log_failure(route: &str, e: &DashboardError) {
    if e.status_code().is_server_error() {
        error!(route, error = %e, "Request failed");
    } else {
        warn!(route, error = %e, "Request rejected");
    }
}

/// Login failures keep the `{ ok: false, message }` shape the login form reads
#[derive(Debug, Serialize)]
struct LoginFailure {
    ok: bool,
    message: String,
}

pub(crate) fn login_reply<T: Serialize>(result: DashboardResult<T>) -> Response {
    match result {
        Ok(value) => {
            metrics().api_request("login", true);
            warp::reply::json(&value).into_response()
        }
        Err(e) => {
            metrics().api_request("login", false);
            let body = LoginFailure {
                ok: false,
                message: e.to_error_body().error,
            };
            warp::reply::with_status(warp::reply::json(&body), e.status_code()).into_response()
        }
    }
}

/// Map warp's own rejections onto the JSON error body
pub async fn handle_rejection(rejection: warp::Rejection) -> Result<Response, Infallible> {
    let (status, error) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, DashboardError::not_found("Route not found"))
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            DashboardError::invalid_input(format!("Invalid request body: {e}")),
        )
    } else if let Some(e) = rejection.find::<warp::reject::InvalidQuery>() {
        (
            StatusCode::BAD_REQUEST,
            DashboardError::invalid_input(format!("Invalid query string: {e}")),
        )
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            DashboardError::invalid_input("Request body is too large"),
        )
    } else if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DashboardError::invalid_input("Unsupported content type"),
        )
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            DashboardError::invalid_input("Method not allowed"),
        )
    } else {
        error!(?rejection, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            DashboardError::internal_error("Unhandled request"),
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&error.to_error_body()), status).into_response())
}

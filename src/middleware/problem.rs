//! ProblemDetails instance stamping
//!
//! `AppError` responses leave their ProblemDetails in the response extensions.
//! This layer fills in `instance` with the request path and re-renders the body.

use axum::{
    body::Body,
    extract::Request,
    http::header::{CONTENT_LENGTH, CONTENT_TYPE},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::models::ProblemDetails;

pub async fn problem_instance_middleware(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    if response.extensions().get::<ProblemDetails>().is_none() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let problem = match parts.extensions.remove::<ProblemDetails>() {
        Some(problem) => problem.with_instance(path),
        None => return Response::from_parts(parts, body),
    };

    match serde_json::to_vec(&problem) {
        Ok(bytes) => {
            parts.headers.remove(CONTENT_LENGTH);
            parts
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/problem+json"));
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            warn!(error = %e, "Failed to re-render problem details");
            Response::from_parts(parts, body)
        }
    }
}

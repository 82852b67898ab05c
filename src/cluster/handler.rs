//! Request dispatch for `_api/cluster/endpoints`.

use super::LeaderResolver;
use crate::error::ApplierError;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointEntry {
    pub endpoint: String,
}

/// Result of an endpoints request, ready to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointsResponse {
    Endpoints(Vec<EndpointEntry>),
    Error {
        status: StatusCode,
        error_num: i32,
        message: String,
    },
}

impl EndpointsResponse {
    fn from_error(error: &ApplierError) -> Self {
        let message = match error {
            ApplierError::Forbidden(message) => message.clone(),
            ApplierError::ConsensusUnavailable { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self::Error {
            status: error.http_status(),
            error_num: error.code().0,
            message,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Endpoints(_) => StatusCode::OK,
            Self::Error { status, .. } => *status,
        }
    }

    /// JSON body in the database's REST envelope.
    pub fn body(&self) -> Value {
        match self {
            Self::Endpoints(endpoints) => json!({
                "error": false,
                "code": StatusCode::OK.as_u16(),
                "endpoints": endpoints,
            }),
            Self::Error {
                status,
                error_num,
                message,
            } => json!({
                "error": true,
                "code": status.as_u16(),
                "errorNum": error_num,
                "errorMessage": message,
            }),
        }
    }
}

impl IntoResponse for EndpointsResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Dispatch a request below `_api/cluster`.
///
/// Method and path are checked before any consensus read.
pub async fn handle_endpoints_request(
    resolver: &LeaderResolver,
    method: &Method,
    suffixes: &[String],
) -> EndpointsResponse {
    if method != Method::GET {
        debug!(%method, "Rejecting non-GET cluster request");
        return EndpointsResponse::from_error(&ApplierError::Forbidden(
            "only the GET method is allowed".to_string(),
        ));
    }
    if suffixes.first().map(String::as_str) != Some("endpoints") {
        return EndpointsResponse::from_error(&ApplierError::Forbidden(
            "expecting _api/cluster/endpoints".to_string(),
        ));
    }

    match resolver.endpoints().await {
        Ok(endpoints) => EndpointsResponse::Endpoints(
            endpoints
                .into_iter()
                .map(|endpoint| EndpointEntry { endpoint })
                .collect(),
        ),
        Err(e) => EndpointsResponse::from_error(&e),
    }
}

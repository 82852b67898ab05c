//! HTTP surface for endpoint discovery.
//!
//! ```text
//! ANY /_api/cluster            → 403 expecting _api/cluster/endpoints
//! ANY /_api/cluster/{*suffix}  → handle_endpoints_request
//! ```
//!
//! Every method is routed so that non-GET requests get the database's 403
//! envelope instead of a bare 405.

use crate::cluster::{handle_endpoints_request, EndpointsResponse, LeaderResolver};
use axum::extract::{Path, State};
use axum::http::Method;
use axum::routing::any;
use axum::Router;
use std::sync::Arc;

/// Router exposing `_api/cluster`.
pub fn router(resolver: Arc<LeaderResolver>) -> Router {
    Router::new()
        .route("/_api/cluster", any(cluster_root))
        .route("/_api/cluster/{*suffix}", any(cluster_suffix))
        .with_state(resolver)
}

async fn cluster_root(
    State(resolver): State<Arc<LeaderResolver>>,
    method: Method,
) -> EndpointsResponse {
    handle_endpoints_request(&resolver, &method, &[]).await
}

async fn cluster_suffix(
    State(resolver): State<Arc<LeaderResolver>>,
    method: Method,
    Path(suffix): Path<String>,
) -> EndpointsResponse {
    let suffixes: Vec<String> = suffix
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    handle_endpoints_request(&resolver, &method, &suffixes).await
}

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::services::auth_service;
use crate::state::AppState;

/// Require a valid token on the request and expose the resolved identity
/// to downstream handlers via request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let identity = match auth_service::resolve_identity(req.headers(), &state.config) {
        Some(identity) => identity,
        None => {
            warn!("Rejecting unauthenticated API request to {}", req.uri().path());
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

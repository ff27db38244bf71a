use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use tracing::{debug, warn};

use crate::config::Config;

/// Authenticated caller of a connection or request.
#[derive(Clone, Debug)]
pub struct UserIdentity {
    pub user_id: String,
    pub roles: Vec<String>,
}

// Get the auth token from request headers
pub fn get_auth_token(headers: &HeaderMap) -> Result<String, String> {
    // 1. Try to get token from Authorization header
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| "Invalid Authorization header".to_string())?;
        Ok(auth_str
            .strip_prefix("Bearer ")
            .unwrap_or(auth_str)
            .to_string())
    }
    // 2. Try to get token from cookies
    else {
        let cookie_header = headers
            .get(header::COOKIE)
            .ok_or_else(|| "Missing Authorization header or Cookie".to_string())?
            .to_str()
            .map_err(|_| "Invalid Cookie header".to_string())?;

        for cookie in cookie::Cookie::split_parse(cookie_header) {
            if let Ok(c) = cookie {
                if c.name() == "auth_token" {
                    return Ok(c.value().to_string());
                }
            }
        }
        Err("auth_token cookie not found".to_string())
    }
}

// Validate a JWT token and return the token data
pub fn validate_jwt(
    token: &str,
    secret: &str,
) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<serde_json::Value>(token, &decoding_key, &validation)
}

/// Resolve the caller's identity from transport credentials, or `None`
/// for an anonymous caller. The identity comes entirely from the signed
/// token: `sub` is the user id, `roles` is an optional string array.
pub fn resolve_identity(headers: &HeaderMap, config: &Config) -> Option<UserIdentity> {
    let token = match get_auth_token(headers) {
        Ok(token) => token,
        Err(e) => {
            debug!("No credentials on request: {}", e);
            return None;
        }
    };

    let secret = match &config.auth_jwt_secret {
        Some(secret) => secret,
        None => {
            warn!("No JWT secret configured, treating all callers as anonymous");
            return None;
        }
    };

    let token_data = match validate_jwt(&token, secret) {
        Ok(token_data) => token_data,
        Err(e) => {
            warn!("JWT validation failed: {}", e);
            return None;
        }
    };

    let user_id = match token_data.claims.get("sub").and_then(|v| v.as_str()) {
        Some(sub) => sub.to_string(),
        None => {
            warn!("JWT token does not contain 'sub' claim");
            return None;
        }
    };

    let roles = match token_data.claims.get("roles").and_then(|v| v.as_array()) {
        Some(roles_array) => roles_array
            .iter()
            .filter_map(|r| r.as_str().map(|s| s.to_string()))
            .collect::<Vec<String>>(),
        None => Vec::new(),
    };

    debug!("JWT token validated successfully for user: {}", user_id);
    Some(UserIdentity { user_id, roles })
}

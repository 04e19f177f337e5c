//! Bearer-token authentication for trigger routes.
//!
//! Trigger callers (the platform's event relay, the scheduler) present an
//! HS256 JWT signed with the shared trigger secret. `sub` names the caller and
//! ends up in the request's log fields.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use pulse_common::error::AppError;

use crate::state::AppState;

/// JWT claims carried by a trigger token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Caller name, e.g. `event-relay`
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated trigger caller.
#[derive(Debug, Clone)]
pub struct TriggerCaller {
    pub name: String,
    pub claims: Claims,
}

/// Sign a trigger token for `caller`, valid for `expiry_hours`.
pub fn encode_jwt(caller: &str, secret: &str, expiry_hours: u64) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: caller.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Auth(format!("Failed to encode JWT: {}", e)))
}

/// Decode and validate a trigger token.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}

impl FromRequestParts<AppState> for TriggerCaller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                AppError::Auth("Missing or invalid Authorization header. Use 'Bearer <JWT>'".to_string())
            })?;

        let claims = decode_jwt(token, &state.trigger_secret)?;
        if claims.sub.is_empty() {
            return Err(AppError::Auth("Token has no caller".to_string()));
        }

        Ok(TriggerCaller {
            name: claims.sub.clone(),
            claims,
        })
    }
}

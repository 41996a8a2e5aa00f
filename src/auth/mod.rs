pub mod password;
pub mod tokens;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

/// Identity decoded from the bearer token. Requests without a token are
/// rejected with 401, requests with a bad or expired token with 403.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedEmployee {
    pub employee_id: Uuid,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedEmployee {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized("Access token required"))?;

        let claims = state
            .tokens
            .verify_access(bearer.token())
            .map_err(|_| AppError::forbidden("Invalid or expired token"))?;

        Ok(AuthenticatedEmployee {
            employee_id: claims.sub,
            email: claims.email,
        })
    }
}

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;
use tracing::warn;

use super::{cookies, repo_types::User};
use crate::{errors::AuthError, state::AppState};

/// Reads the access-token cookie, verifies it and resolves the user.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let access = cookies::extract(&jar)
            .access
            .ok_or(AuthError::Unauthenticated)?;

        let user = state.auth.authenticate(&access).await.map_err(|e| {
            warn!(error = %e, "access token rejected");
            e
        })?;
        Ok(AuthUser(user))
    }
}

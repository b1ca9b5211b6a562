use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{CookieJar, WithRejection};
use serde_json::Value;
use tracing::instrument;

use crate::{
    auth::{
        cookies,
        dto::{ChangePasswordRequest, LoginRequest, RegisterRequest, UserData},
        extractors::AuthUser,
        repo_types::ProfileUpdate,
    },
    errors::AuthError,
    response::{api_response, ApiResponse},
    state::AppState,
};

type JsonBody<T> = WithRejection<Json<T>, AuthError>;
type Reply<T> = Result<(StatusCode, CookieJar, Json<ApiResponse<T>>), AuthError>;
type Plain<T> = Result<(StatusCode, Json<ApiResponse<T>>), AuthError>;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/change-password", post(change_password))
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): JsonBody<RegisterRequest>,
) -> Reply<UserData> {
    let (user, tokens) = state.auth.register(payload).await?;
    let jar = cookies::emit_token_pair(jar, &state.cookies, tokens.access, tokens.refresh);
    let (status, body) = api_response(StatusCode::CREATED, "User registered successfully", UserData { user });
    Ok((status, jar, body))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): JsonBody<LoginRequest>,
) -> Reply<UserData> {
    let (user, tokens) = state.auth.login(payload).await?;
    let jar = cookies::emit_token_pair(jar, &state.cookies, tokens.access, tokens.refresh);
    let (status, body) = api_response(StatusCode::OK, "User logged in successfully", UserData { user });
    Ok((status, jar, body))
}

#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Reply<Value> {
    let tokens = cookies::extract(&jar);
    state
        .auth
        .logout(tokens.access.as_deref(), tokens.refresh.as_deref())
        .await?;
    let jar = cookies::clear(jar);
    let (status, body) = api_response(StatusCode::OK, "User logged out successfully", Value::Null);
    Ok((status, jar, body))
}

#[instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> Reply<Value> {
    let tokens = cookies::extract(&jar);
    let access = state
        .auth
        .refresh_access_token(tokens.refresh.as_deref())
        .await?;
    let jar = cookies::emit_access_only(jar, &state.cookies, access);
    let (status, body) = api_response(StatusCode::OK, "Token refreshed successfully", Value::Null);
    Ok((status, jar, body))
}

#[instrument(skip_all)]
pub async fn get_profile(State(state): State<AppState>, AuthUser(user): AuthUser) -> Plain<UserData> {
    let user = state.auth.get_profile(user.id).await?;
    Ok(api_response(StatusCode::OK, "User profile fetched successfully", UserData { user }))
}

#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(Json(update), _): JsonBody<ProfileUpdate>,
) -> Plain<UserData> {
    let user = state.auth.update_profile(user.id, update).await?;
    Ok(api_response(StatusCode::OK, "User profile updated successfully", UserData { user }))
}

#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(Json(payload), _): JsonBody<ChangePasswordRequest>,
) -> Plain<UserData> {
    let user = state.auth.change_password(user.id, payload).await?;
    Ok(api_response(StatusCode::OK, "Password changed successfully", UserData { user }))
}

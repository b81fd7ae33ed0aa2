//! Account endpoints: registration, activation, sessions, passwords.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use domain::{RegisterRequest, UserProfile};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::auth::resolve_actor;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct DetailResponse {
    pub detail: &'static str,
}

#[derive(Deserialize)]
pub struct RegisterBody {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// POST /account/register — create an inactive account and mail a code.
pub async fn register<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let profile = state
        .accounts
        .register(RegisterRequest {
            email: body.email,
            password: body.password,
            password_confirm: body.password_confirm,
            first_name: body.first_name,
            last_name: body.last_name,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Deserialize)]
pub struct ActivationBody {
    pub email: String,
    pub code: String,
}

/// POST /account/activation — activate an account with a mailed code.
pub async fn activation<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<ActivationBody>,
) -> Result<Json<DetailResponse>, ApiError> {
    state.accounts.activate(&body.email, &body.code).await?;
    Ok(Json(DetailResponse {
        detail: "account activated",
    }))
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /account/login — exchange credentials for a session token.
pub async fn login<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>, ApiError> {
    let token = state.accounts.login(&body.email, &body.password).await?;
    Ok(Json(LoginResponse { token }))
}

/// POST /account/logout — invalidate every session of the caller.
pub async fn logout<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<DetailResponse>, ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    state.accounts.logout(&actor).await?;
    Ok(Json(DetailResponse {
        detail: "logged out",
    }))
}

#[derive(Deserialize)]
pub struct ResetPasswordBody {
    pub email: String,
}

/// POST /account/reset_password — mail a password-reset code.
pub async fn reset_password<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<ResetPasswordBody>,
) -> Result<Json<DetailResponse>, ApiError> {
    state.accounts.request_password_reset(&body.email).await?;
    Ok(Json(DetailResponse {
        detail: "reset code sent",
    }))
}

#[derive(Deserialize)]
pub struct ResetPasswordCompleteBody {
    pub code: String,
    pub password: String,
    pub password_confirm: String,
}

/// POST /account/reset_password_complete — set a new password via a code.
pub async fn reset_password_complete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<ResetPasswordCompleteBody>,
) -> Result<Json<DetailResponse>, ApiError> {
    state
        .accounts
        .complete_password_reset(&body.code, &body.password, &body.password_confirm)
        .await?;
    Ok(Json(DetailResponse {
        detail: "password updated",
    }))
}

#[derive(Deserialize)]
pub struct ChangePasswordBody {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

/// POST /account/change_password — replace the caller's password.
pub async fn change_password<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordBody>,
) -> Result<Json<DetailResponse>, ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    state
        .accounts
        .change_password(
            &actor,
            &body.old_password,
            &body.new_password,
            &body.new_password_confirm,
        )
        .await?;
    Ok(Json(DetailResponse {
        detail: "password updated",
    }))
}

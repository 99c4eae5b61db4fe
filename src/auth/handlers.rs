use axum::{extract::State, http::StatusCode, routing::post, Form, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::Role,
        dto::{CreateUserRequest, TokenForm, TokenResponse},
        extractors::CurrentUser,
        password::hash_password_blocking,
        services::{authenticate, issue_token, normalize_email, validate_email, validate_password},
    },
    error::ApiError,
    extract::JsonBody,
    state::AppState,
    store::NewUser,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/", post(create_user))
        .route("/auth/token", post(login_for_access_token))
}

/// Registers a user with a full profile. Granting `admin` requires the
/// caller to already hold an admin token.
#[instrument(skip(state, caller, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    caller: Option<CurrentUser>,
    JsonBody(payload): JsonBody<CreateUserRequest>,
) -> Result<StatusCode, ApiError> {
    if payload.role == Role::Admin && !matches!(&caller, Some(CurrentUser(id)) if id.is_admin()) {
        warn!("admin registration without admin token");
        return Err(ApiError::Unauthorized);
    }

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("name", "must not be empty"));
    }
    let email = normalize_email(&payload.email);
    validate_email("email", &email)?;
    validate_password("password", &payload.password)?;

    let hashed_password = hash_password_blocking(payload.password).await?;
    let user = state
        .users
        .create(NewUser {
            name,
            email,
            photo_url: payload.photo_url,
            short_term_goal: Some(payload.short_term_goal),
            long_term_goal: Some(payload.long_term_goal),
            hashed_password,
            role: payload.role,
        })
        .await
        .map_err(ApiError::conflict_on_duplicate)?;

    info!(user_id = user.id, role = %user.role, "user created");
    Ok(StatusCode::CREATED)
}

/// OAuth2-style password form. The `username` field is matched against the
/// account email.
#[instrument(skip(state, form))]
pub async fn login_for_access_token(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = authenticate(&state, &form.username, &form.password).await?;
    let access_token = issue_token(&state, &user)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

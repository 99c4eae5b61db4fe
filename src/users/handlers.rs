use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{debug, info, instrument, warn};

use super::dto::{ChangeEmailRequest, ChangePasswordRequest, CredentialsRequest, UpdateUserRequest};
use crate::{
    auth::{
        claims::Role,
        extractors::CurrentUser,
        password::{hash_password_blocking, verify_password_blocking},
        services::{authenticate, issue_token, normalize_email, validate_email, validate_password},
        TokenResponse,
    },
    error::{ensure_positive_id, ApiError},
    extract::JsonBody,
    state::AppState,
    store::{NewUser, ProfileUpdate, StoreError, User},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/", get(get_user))
        .route("/user/sign_up", post(sign_up))
        .route("/user/sign_in", post(sign_in))
        .route("/user/email", put(change_email))
        .route("/user/password", put(change_password))
        .route("/user/:user_id", put(update_user).delete(delete_user))
}

/// Loads the caller's own record. A valid token without a backing row means
/// the account was deleted after the token was issued.
async fn load_self(state: &AppState, identity_id: i64) -> Result<User, ApiError> {
    state
        .users
        .find_by_id(identity_id)
        .await?
        .ok_or(ApiError::NotFound("User"))
}

#[instrument(skip(state, identity), fields(user_id = identity.id))]
pub async fn get_user(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(load_self(&state, identity.id).await?))
}

const NAME_ATTEMPTS: usize = 3;

/// Display name for accounts created without one. Never contains `@`, so it
/// cannot shadow an email someone may sign up with later.
fn generated_name() -> String {
    format!("user-{:08x}", rand::random::<u32>())
}

/// Creates an account from email + password and signs it in right away.
#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CredentialsRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    validate_email("email", &email)?;
    validate_password("password", &payload.password)?;

    if state.users.find_by_email(&email).await?.is_some() {
        warn!("sign-up with registered email");
        return Err(ApiError::BadRequest("Email already registered".into()));
    }

    let hashed_password = hash_password_blocking(payload.password).await?;
    let mut attempt = 0;
    // The unique constraint still decides if two sign-ups race past the check.
    let user = loop {
        attempt += 1;
        let created = state
            .users
            .create(NewUser {
                name: generated_name(),
                email: email.clone(),
                photo_url: String::new(),
                short_term_goal: Some(String::new()),
                long_term_goal: Some(String::new()),
                hashed_password: hashed_password.clone(),
                role: Role::User,
            })
            .await;
        match created {
            Ok(user) => break user,
            Err(StoreError::Duplicate("email")) => {
                warn!("sign-up lost race on email");
                return Err(ApiError::BadRequest("Email already registered".into()));
            }
            Err(StoreError::Duplicate("name")) if attempt < NAME_ATTEMPTS => {
                debug!(attempt, "generated name taken");
            }
            Err(e) => return Err(ApiError::conflict_on_duplicate(e)),
        }
    };

    info!(user_id = user.id, "user signed up");
    Ok(Json(TokenResponse {
        access_token: issue_token(&state, &user)?,
        token_type: "Bearer",
    }))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CredentialsRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = authenticate(&state, &payload.email, &payload.password).await?;
    Ok(Json(TokenResponse {
        access_token: issue_token(&state, &user)?,
        token_type: "Bearer",
    }))
}

/// Requires the current email as proof before switching to the new one.
#[instrument(skip(state, identity, payload), fields(user_id = identity.id))]
pub async fn change_email(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ChangeEmailRequest>,
) -> Result<StatusCode, ApiError> {
    let user = load_self(&state, identity.id).await?;
    if user.email != normalize_email(&payload.email) {
        warn!("email change with wrong current email");
        return Err(ApiError::Unauthorized);
    }

    let new_email = normalize_email(&payload.new_email);
    validate_email("new_email", &new_email)?;

    state
        .users
        .update_email(user.id, &new_email)
        .await
        .map_err(ApiError::conflict_on_duplicate)?;
    info!("email changed");
    Ok(StatusCode::NO_CONTENT)
}

/// Requires the current password before storing a hash of the new one.
#[instrument(skip(state, identity, payload), fields(user_id = identity.id))]
pub async fn change_password(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let user = load_self(&state, identity.id).await?;
    if !verify_password_blocking(payload.password, user.hashed_password).await? {
        warn!("password change with wrong current password");
        return Err(ApiError::Unauthorized);
    }
    validate_password("new_password", &payload.new_password)?;

    let hashed = hash_password_blocking(payload.new_password).await?;
    state.users.update_password_hash(user.id, &hashed).await?;
    info!("password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// Updates profile fields of `user_id`. Only the account itself or an admin
/// may do so; anyone else sees a plain 404.
#[instrument(skip(state, identity, payload), fields(caller_id = identity.id))]
pub async fn update_user(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<StatusCode, ApiError> {
    let user_id = ensure_positive_id("user_id", user_id)?;
    if !identity.can_act_on(user_id) {
        warn!(user_id, "profile update on foreign account");
        return Err(ApiError::NotFound("User"));
    }

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("name", "must not be empty"));
    }

    let updated = state
        .users
        .update_profile(
            user_id,
            ProfileUpdate {
                name,
                photo_url: payload.photo_url,
                short_term_goal: payload.short_term_goal,
                long_term_goal: payload.long_term_goal,
                health_data_integration_status: payload.health_data_integration_status,
                birth_date: payload.birth_date,
            },
        )
        .await
        .map_err(ApiError::conflict_on_duplicate)?;
    if !updated {
        return Err(ApiError::NotFound("User"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, identity), fields(caller_id = identity.id))]
pub async fn delete_user(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user_id = ensure_positive_id("user_id", user_id)?;
    if !identity.can_act_on(user_id) {
        warn!(user_id, "delete on foreign account");
        return Err(ApiError::NotFound("User"));
    }
    if !state.users.delete(user_id).await? {
        return Err(ApiError::NotFound("User"));
    }
    info!(user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

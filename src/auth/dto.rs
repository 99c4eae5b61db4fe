use serde::{Deserialize, Serialize};

use super::claims::Role;

/// Request body for `POST /auth/`, which takes the full profile.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub short_term_goal: String,
    #[serde(default)]
    pub long_term_goal: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// Form body for `POST /auth/token`. `username` carries the email.
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub username: String,
    pub password: String,
}

/// Response returned by every sign-in path.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

use serde::Deserialize;
use time::OffsetDateTime;

/// Body of `/user/sign_up` and `/user/sign_in`.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeEmailRequest {
    pub email: String,
    pub new_email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    pub photo_url: String,
    pub short_term_goal: String,
    pub long_term_goal: String,
    pub health_data_integration_status: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub birth_date: Option<OffsetDateTime>,
}

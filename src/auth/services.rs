use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::password::{hash_password_blocking, verify_password_blocking};
use crate::{error::ApiError, state::AppState, store::User};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_EMAIL_LEN: usize = 6;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

// Verified against when the email is unknown, so both failure paths cost one
// Argon2 run.
static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

/// Computes the dummy hash on the blocking pool the first time it is needed.
/// Startup calls this too so the first sign-in does not pay for it.
pub async fn dummy_hash() -> anyhow::Result<&'static str> {
    let hash = DUMMY_HASH
        .get_or_try_init(|| hash_password_blocking("timing-equalizer".to_string()))
        .await?;
    Ok(hash.as_str())
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_email(field: &'static str, email: &str) -> Result<(), ApiError> {
    if email.len() < MIN_EMAIL_LEN || !is_valid_email(email) {
        return Err(ApiError::validation(field, "Invalid email"));
    }
    Ok(())
}

pub(crate) fn validate_password(field: &'static str, password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(
            field,
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

/// Checks email + password. Unknown email, wrong password and disabled
/// accounts all yield the same `Unauthorized`.
pub async fn authenticate(state: &AppState, email: &str, password: &str) -> Result<User, ApiError> {
    let email = normalize_email(email);
    let user = state.users.find_by_email(&email).await?;

    let hash = match &user {
        Some(u) => u.hashed_password.clone(),
        None => dummy_hash().await?.to_string(),
    };
    let ok = verify_password_blocking(password.to_string(), hash).await?;

    match user {
        Some(u) if ok && u.is_active => {
            info!(user_id = u.id, "user signed in");
            Ok(u)
        }
        Some(u) if ok => {
            warn!(user_id = u.id, "sign-in on inactive account");
            Err(ApiError::Unauthorized)
        }
        Some(u) => {
            warn!(user_id = u.id, "sign-in invalid password");
            Err(ApiError::Unauthorized)
        }
        None => {
            warn!("sign-in unknown email");
            Err(ApiError::Unauthorized)
        }
    }
}

pub fn issue_token(state: &AppState, user: &User) -> Result<String, ApiError> {
    Ok(state.keys.issue(&user.name, user.id, user.role)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(validate_email("email", "a@x.c").is_err());
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[tokio::test]
    async fn dummy_hash_is_computed_once_and_never_matches() {
        let first = dummy_hash().await.unwrap();
        let second = dummy_hash().await.unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(first.starts_with("$argon2"));
        assert!(!crate::auth::password::verify_password("secret1", first));
    }

    #[test]
    fn password_length_is_counted_in_chars() {
        assert!(validate_password("password", "12345").is_err());
        assert!(validate_password("password", "123456").is_ok());
        assert!(validate_password("password", "ääääää").is_ok());
    }
}

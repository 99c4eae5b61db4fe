use serde::Deserialize;
use time::OffsetDateTime;

use crate::{error::ApiError, store::TodoFields};

const TITLE_MIN: usize = 3;
const DESCRIPTION_MIN: usize = 3;
const DESCRIPTION_MAX: usize = 100;

/// Body of create and full update. Ownership is not part of it.
#[derive(Debug, Deserialize)]
pub struct TodoRequest {
    pub title: String,
    pub description: String,
    pub complete: bool,
    pub category_id: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub notification_time: Option<OffsetDateTime>,
}

impl TryFrom<TodoRequest> for TodoFields {
    type Error = ApiError;

    fn try_from(r: TodoRequest) -> Result<Self, Self::Error> {
        if r.title.chars().count() < TITLE_MIN {
            return Err(ApiError::validation(
                "title",
                format!("must be at least {TITLE_MIN} characters"),
            ));
        }
        let len = r.description.chars().count();
        if !(DESCRIPTION_MIN..=DESCRIPTION_MAX).contains(&len) {
            return Err(ApiError::validation(
                "description",
                format!("must be {DESCRIPTION_MIN} to {DESCRIPTION_MAX} characters"),
            ));
        }
        Ok(Self {
            title: r.title,
            description: r.description,
            complete: r.complete,
            category_id: r.category_id,
            notification_time: r.notification_time,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub complete: bool,
}

/// `null` or a missing field switches the notification off.
#[derive(Debug, Deserialize)]
pub struct NotificationRequest {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub notification_time: Option<OffsetDateTime>,
}

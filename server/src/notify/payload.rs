use serde::{Deserialize, Serialize};

use crate::directory::{EventSummary, UserProfile};

/// Notification kinds — discriminate how the payload is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Subscription,
    Invite,
    NewEvent,
    EventReminder,
}

impl NotificationKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "subscription" => Some(Self::Subscription),
            "invite" => Some(Self::Invite),
            "new_event" => Some(Self::NewEvent),
            "event_reminder" => Some(Self::EventReminder),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Invite => "invite",
            Self::NewEvent => "new_event",
            Self::EventReminder => "event_reminder",
        }
    }
}

impl rusqlite::types::FromSql for NotificationKind {
    fn column_result(
        value: rusqlite::types::ValueRef<'_>,
    ) -> rusqlite::types::FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::from_str(s).ok_or(rusqlite::types::FromSqlError::InvalidType)
    }
}

/// Wire payload pushed to a live connection.
///
/// Built only from resolved directory data, never from caller-supplied free
/// text, so a client cannot spoof notification content. The event fields are
/// omitted for subscription notifications.
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "userSurname")]
    pub user_surname: String,
    #[serde(rename = "userImgUrl")]
    pub user_img_url: String,
    #[serde(rename = "eventId", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(rename = "eventTitle", skip_serializing_if = "Option::is_none")]
    pub event_title: Option<String>,
}

impl PushPayload {
    /// Payload for a new-subscriber notification.
    pub fn subscription(actor: &UserProfile) -> Self {
        Self {
            kind: NotificationKind::Subscription,
            user_id: actor.id.clone(),
            user_name: actor.name.clone(),
            user_surname: actor.surname.clone(),
            user_img_url: actor.image_url.clone(),
            event_id: None,
            event_title: None,
        }
    }

    /// Payload for the event-related notification kinds.
    pub fn for_event(kind: NotificationKind, actor: &UserProfile, event: &EventSummary) -> Self {
        Self {
            kind,
            user_id: actor.id.clone(),
            user_name: actor.name.clone(),
            user_surname: actor.surname.clone(),
            user_img_url: actor.image_url.clone(),
            event_id: Some(event.id.clone()),
            event_title: Some(event.title.clone()),
        }
    }
}

//! Toast-style notifications for mutation outcomes.

use std::time::Duration;

use serde::Serialize;
use tracing::{Level, event};

use crate::core::ClientError;
use crate::mutation::MutationAction;

const DEFAULT_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastPosition {
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub status: NotificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub position: ToastPosition,
    #[serde(serialize_with = "as_millis")]
    pub duration: Duration,
    pub is_closable: bool,
}

fn as_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl Notification {
    fn new(status: NotificationStatus) -> Self {
        Self {
            status,
            title: None,
            description: None,
            position: ToastPosition::Bottom,
            duration: DEFAULT_DURATION,
            is_closable: true,
        }
    }

    /// `"Member role created"`
    pub fn success(subject: &str, action: MutationAction) -> Self {
        let mut notification = Self::new(NotificationStatus::Success);
        notification.description = Some(format!("{} {}", capitalize(subject), action.past_tense()));
        notification
    }

    /// `"Failed to delete member role"` with the error detail underneath.
    pub fn failure(subject: &str, action: MutationAction, error: &ClientError) -> Self {
        let mut notification = Self::new(NotificationStatus::Error);
        notification.title = Some(format!("Failed to {} {}", action.verb(), subject));
        notification.description = Some(error.detail());
        notification
    }

    /// A failure that is not tied to a mutation kind, e.g. `"Sign-in failed!"`.
    pub fn error(title: &str, error: &ClientError) -> Self {
        let mut notification = Self::new(NotificationStatus::Error);
        notification.title = Some(title.to_string());
        notification.description = Some(error.detail());
        notification
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_position(mut self, position: ToastPosition) -> Self {
        self.position = position;
        self
    }
}

/// Notification for a finished mutation.
pub fn describe(subject: &str, action: MutationAction, error: Option<&ClientError>) -> Notification {
    match error {
        None => Notification::success(subject, action),
        Some(error) => Notification::failure(subject, action, error),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Where notifications are shown.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        let title = notification.title.as_deref().unwrap_or_default();
        let description = notification.description.as_deref().unwrap_or_default();
        match notification.status {
            NotificationStatus::Success => {
                event!(Level::INFO, title, description, "notification")
            }
            NotificationStatus::Error => {
                event!(Level::WARN, title, description, "notification")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_description() {
        let notification = describe("member role", MutationAction::Create, None);
        assert_eq!(notification.status, NotificationStatus::Success);
        assert_eq!(notification.description.as_deref(), Some("Member role created"));
        assert_eq!(notification.title, None);
        assert_eq!(notification.duration, Duration::from_secs(3));
        assert!(notification.is_closable);
    }

    #[test]
    fn test_failure_title_and_detail() {
        let error = ClientError::Transport("role in use".into());
        let notification = describe("member role", MutationAction::Delete, Some(&error));
        assert_eq!(notification.status, NotificationStatus::Error);
        assert_eq!(
            notification.title.as_deref(),
            Some("Failed to delete member role")
        );
        assert_eq!(notification.description.as_deref(), Some("role in use"));
    }

    #[test]
    fn test_serializes_like_a_toast() {
        let notification = Notification::success("user", MutationAction::Update);
        assert_eq!(
            serde_json::to_value(&notification).unwrap(),
            json!({
                "status": "success",
                "description": "User updated",
                "position": "bottom",
                "duration": 3000,
                "isClosable": true
            })
        );
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("membership"), "Membership");
        assert_eq!(capitalize(""), "");
    }
}

//! Push messages and notification clicks.

use serde::Serialize;
use tether_core::config::NotificationConfig;

use super::{Agent, Effect, Outcome};

const OPEN_ACTION: &str = "open";
const DISMISS_ACTION: &str = "dismiss";

/// A notification to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationData {
    /// Path opened when the notification is activated.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

impl Notification {
    /// Render a push payload. Empty or missing payloads get the default body.
    pub fn from_payload(config: &NotificationConfig, payload: Option<&str>) -> Self {
        let body = match payload.map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => config.default_body.clone(),
        };

        Self {
            title: config.title.clone(),
            body,
            icon: config.icon.clone(),
            badge: config.badge.clone(),
            data: NotificationData { url: "/".into() },
            actions: vec![
                NotificationAction { action: OPEN_ACTION.into(), title: "Open".into() },
                NotificationAction { action: DISMISS_ACTION.into(), title: "Dismiss".into() },
            ],
        }
    }
}

impl Agent {
    pub(crate) fn on_push(&self, payload: Option<&str>) -> Outcome {
        let notification = Notification::from_payload(&self.inner.notification, payload);
        tracing::debug!(title = %notification.title, "showing notification");
        Outcome::effect(Effect::ShowNotification { notification })
    }

    pub(crate) fn on_notification_click(&self, action: Option<&str>) -> Outcome {
        let mut effects = vec![Effect::CloseNotification];
        if action == Some(OPEN_ACTION) {
            effects.push(Effect::OpenWindow { url: self.inner.root.to_string() });
        }
        Outcome { effects, ..Default::default() }
    }
}

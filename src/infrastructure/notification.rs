use crate::infrastructure::error::PlannerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPermission {
    Default,
    Granted,
    Denied,
}

#[async_trait]
pub trait NotificationClient: Send + Sync {
    fn permission_state(&self) -> NotificationPermission;

    async fn request_permission(&self) -> Result<NotificationPermission, PlannerError>;

    async fn notify(&self, title: &str, body: &str) -> Result<(), PlannerError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredNotification {
    pub title: String,
    pub body: String,
}

#[derive(Debug)]
pub struct InMemoryNotificationClient {
    permission: Mutex<NotificationPermission>,
    delivered: Mutex<Vec<DeliveredNotification>>,
}

impl InMemoryNotificationClient {
    pub fn new(permission: NotificationPermission) -> Self {
        Self {
            permission: Mutex::new(permission),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn granted() -> Self {
        Self::new(NotificationPermission::Granted)
    }

    pub fn set_permission(&self, permission: NotificationPermission) {
        if let Ok(mut state) = self.permission.lock() {
            *state = permission;
        }
    }

    pub fn delivered(&self) -> Vec<DeliveredNotification> {
        self.delivered
            .lock()
            .map(|delivered| delivered.clone())
            .unwrap_or_default()
    }
}

impl Default for InMemoryNotificationClient {
    fn default() -> Self {
        Self::new(NotificationPermission::Default)
    }
}

#[async_trait]
impl NotificationClient for InMemoryNotificationClient {
    fn permission_state(&self) -> NotificationPermission {
        self.permission
            .lock()
            .map(|state| *state)
            .unwrap_or(NotificationPermission::Denied)
    }

    async fn request_permission(&self) -> Result<NotificationPermission, PlannerError> {
        let mut state = self.permission.lock().map_err(|error| {
            PlannerError::Notification(format!("permission lock poisoned: {error}"))
        })?;
        // An unprompted client accepts; a denied one stays denied.
        if *state == NotificationPermission::Default {
            *state = NotificationPermission::Granted;
        }
        Ok(*state)
    }

    async fn notify(&self, title: &str, body: &str) -> Result<(), PlannerError> {
        if self.permission_state() != NotificationPermission::Granted {
            return Err(PlannerError::Notification(
                "notification permission not granted".to_string(),
            ));
        }
        let mut delivered = self.delivered.lock().map_err(|error| {
            PlannerError::Notification(format!("delivery log lock poisoned: {error}"))
        })?;
        delivered.push(DeliveredNotification {
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

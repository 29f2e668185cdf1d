use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{NotificationDispatcher, NotificationOutcome, NotificationRequest};

/// Keeps every notification instead of sending it. Used for dry runs and tests.
#[derive(Default, Clone)]
pub struct RecordingDispatcher {
    sent: Arc<Mutex<Vec<NotificationRequest>>>,
    failing_users: Arc<Mutex<HashSet<Uuid>>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications to `user_id` are recorded but reported as failed.
    pub async fn fail_for(&self, user_id: Uuid) {
        self.failing_users.lock().await.insert(user_id);
    }

    pub async fn requests(&self) -> Vec<NotificationRequest> {
        self.sent.lock().await.clone()
    }

    pub async fn requests_for(&self, booking_id: Uuid) -> Vec<NotificationRequest> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|r| r.booking_id == booking_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn notify(&self, request: &NotificationRequest) -> NotificationOutcome {
        self.sent.lock().await.push(request.clone());
        tracing::debug!(
            booking_id = %request.booking_id,
            user_id = %request.user_id,
            status = %request.status_label,
            "Recorded notification"
        );

        if self.failing_users.lock().await.contains(&request.user_id) {
            return NotificationOutcome::failed("delivery disabled for user");
        }

        NotificationOutcome {
            email_sent: true,
            push_sent: true,
            record_created: true,
            errors: Vec::new(),
        }
    }
}

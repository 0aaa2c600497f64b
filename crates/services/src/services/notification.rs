//! In-app notification creation plus outbound mail delivery.
//!
//! The in-app row is the durable record; mail is fire-and-forget through a
//! pluggable channel, so a dead gateway never fails the caller.

use std::sync::Arc;

use async_trait::async_trait;
use db::{
    DBService,
    models::{
        notification::{CreateNotification, Notification},
        user::User,
    },
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("recipient {0} not found")]
    RecipientNotFound(Uuid),
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail gateway request failed: {0}")]
    Gateway(#[from] reqwest::Error),
    #[error("{0}")]
    Channel(String),
}

/// Outbound mail payload handed to the delivery channel.
#[derive(Debug, Clone, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery channel for outbound mail. Failures are reported to the caller
/// for logging, never retried here.
#[async_trait]
pub trait MailChannel: Send + Sync {
    async fn deliver(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// POSTs messages to an HTTP mail gateway.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpMailer {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl MailChannel for HttpMailer {
    async fn deliver(&self, message: &MailMessage) -> Result<(), MailError> {
        self.client
            .post(self.endpoint.clone())
            .json(message)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Stands in when no mail gateway is configured.
pub struct NoopMailer;

#[async_trait]
impl MailChannel for NoopMailer {
    async fn deliver(&self, message: &MailMessage) -> Result<(), MailError> {
        debug!(
            to = %message.to,
            subject = %message.subject,
            "mail gateway not configured, dropping message"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationService {
    db: DBService,
    mailer: Arc<dyn MailChannel>,
}

impl NotificationService {
    pub fn new(db: DBService, mailer: Arc<dyn MailChannel>) -> Self {
        Self { db, mailer }
    }

    /// Persist an in-app notification for the recipient and hand a copy to
    /// the mail channel. Mail failures are logged and swallowed.
    pub async fn notify_user(
        &self,
        data: CreateNotification,
    ) -> Result<Notification, NotificationError> {
        let recipient = User::find_by_id(&self.db.pool, data.user_id)
            .await?
            .ok_or(NotificationError::RecipientNotFound(data.user_id))?;

        let notification = Notification::create(&self.db.pool, &data).await?;

        let message = MailMessage {
            to: recipient.email,
            subject: notification.title.clone(),
            body: notification.message.clone(),
        };
        if let Err(e) = self.mailer.deliver(&message).await {
            warn!(
                notification_id = %notification.id,
                user_id = %notification.user_id,
                error = %e,
                "mail delivery failed"
            );
        }

        Ok(notification)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// Records every message instead of delivering it.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<MailMessage>>,
    }

    #[async_trait]
    impl MailChannel for RecordingMailer {
        async fn deliver(&self, message: &MailMessage) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    /// Fails every delivery.
    pub struct FailingMailer;

    #[async_trait]
    impl MailChannel for FailingMailer {
        async fn deliver(&self, _message: &MailMessage) -> Result<(), MailError> {
            Err(MailError::Channel("gateway unreachable".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use db::models::notification::{NotificationPriority, NotificationType};
    use db::models::user::CreateUser;

    use super::{test_support::*, *};

    async fn seed_user(db: &DBService, email: &str) -> User {
        User::create(
            &db.pool,
            &CreateUser {
                email: email.to_string(),
                name: "Test".to_string(),
                role: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    fn payload(user_id: Uuid) -> CreateNotification {
        CreateNotification {
            user_id,
            notification_type: NotificationType::TaskOverdue,
            title: "Task overdue: pour footing".to_string(),
            message: "Task 'pour footing' is 2 day(s) overdue.".to_string(),
            priority: NotificationPriority::Critical,
            related_id: Some(Uuid::new_v4()),
            related_type: Some("task".to_string()),
            data: None,
        }
    }

    #[tokio::test]
    async fn notify_user_persists_row_and_sends_mail() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = seed_user(&db, "fore@example.com").await;
        let mailer = Arc::new(RecordingMailer::default());
        let service = NotificationService::new(db.clone(), mailer.clone());

        let notification = service.notify_user(payload(user.id)).await.unwrap();
        assert_eq!(notification.user_id, user.id);
        assert_eq!(notification.priority, NotificationPriority::Critical);
        assert!(!notification.read);

        let stored = Notification::find_by_user(&db.pool, user.id, true, 50)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "fore@example.com");
        assert_eq!(sent[0].subject, "Task overdue: pour footing");
    }

    #[tokio::test]
    async fn mail_failure_does_not_fail_the_caller() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = seed_user(&db, "super@example.com").await;
        let service = NotificationService::new(db.clone(), Arc::new(FailingMailer));

        let notification = service.notify_user(payload(user.id)).await.unwrap();
        assert_eq!(notification.user_id, user.id);

        let stored = Notification::find_by_user(&db.pool, user.id, false, 50)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn unknown_recipient_is_an_error() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = NotificationService::new(db.clone(), Arc::new(NoopMailer));

        let result = service.notify_user(payload(Uuid::new_v4())).await;
        assert!(matches!(result, Err(NotificationError::RecipientNotFound(_))));
    }
}

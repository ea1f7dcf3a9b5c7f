//! Outgoing notifications: confirmation mail, chat posts and the audit log
//! channel.
//!
//! Every delivery is best effort. Failures are logged and never reach the
//! caller, so a registration that committed is never reported as failed
//! because a mail bounced.

pub mod mail;
pub mod qr;
pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::NotifyConfig;
use crate::result_ext::ResultExt;

pub use mail::{Address, Mail, SendGridMailer};
pub use telegram::TelegramClient;

/// Posts messages to chats.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send an HTML formatted message.
    async fn send_message(&self, chat_id: &str, text: &str) -> anyhow::Result<()>;

    /// Show a transient status such as `typing` in the chat.
    async fn send_chat_action(&self, chat_id: &str, action: &str) -> anyhow::Result<()>;
}

/// Delivers mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Mail) -> anyhow::Result<()>;
}

/// Bundles the configured channels.
#[derive(Clone, Default)]
pub struct Notifier {
    messenger: Option<Arc<dyn Messenger>>,
    mailer: Option<Arc<dyn Mailer>>,
    log_chat: Option<String>,
    group_chat: Option<String>,
    from_email: String,
}

impl Notifier {
    pub fn new(
        messenger: Option<Arc<dyn Messenger>>,
        mailer: Option<Arc<dyn Mailer>>,
        log_chat: Option<String>,
        group_chat: Option<String>,
        from_email: String,
    ) -> Self {
        Self {
            messenger,
            mailer,
            log_chat,
            group_chat,
            from_email,
        }
    }

    /// Build the channels the configuration has credentials for.
    pub fn from_config(config: &NotifyConfig) -> Self {
        let messenger = config
            .bot_api_key
            .clone()
            .map(|token| Arc::new(TelegramClient::new(token)) as Arc<dyn Messenger>);
        let mailer = config
            .sendgrid_api_key
            .clone()
            .map(|key| Arc::new(SendGridMailer::new(key)) as Arc<dyn Mailer>);

        tracing::info!(
            chat = messenger.is_some(),
            mail = mailer.is_some(),
            log_channel = config.log_id.is_some(),
            "Notification channels configured"
        );

        Self::new(
            messenger,
            mailer,
            config.log_id.clone(),
            config.group_id.clone(),
            config.from_email.clone(),
        )
    }

    /// Sender address for outgoing mail.
    pub fn sender(&self) -> Address {
        Address::new(self.from_email.clone(), None)
    }

    pub fn group_chat(&self) -> Option<&str> {
        self.group_chat.as_deref()
    }

    pub fn can_mail(&self) -> bool {
        self.mailer.is_some()
    }

    /// Record an audit event locally and on the log channel.
    pub async fn log(&self, message: &str) {
        tracing::info!(target: "hades::audit", "{}", message);
        if let Some(chat) = self.log_chat.as_deref() {
            self.send_message(chat, &format!("<b>Hades</b>: {}", message))
                .await;
        }
    }

    /// Post to a chat. Returns whether the message was delivered.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> bool {
        let Some(messenger) = &self.messenger else {
            return false;
        };
        messenger
            .send_message(chat_id, text)
            .await
            .log_warn(format!("posting to chat {}", chat_id))
            .is_some()
    }

    pub async fn send_chat_action(&self, chat_id: &str, action: &str) {
        if let Some(messenger) = &self.messenger {
            messenger
                .send_chat_action(chat_id, action)
                .await
                .log_warn(format!("chat action {} in {}", action, chat_id));
        }
    }

    /// Send a mail. Returns whether the provider accepted it.
    pub async fn send_mail(&self, mail: &Mail) -> bool {
        let Some(mailer) = &self.mailer else {
            return false;
        };
        mailer
            .send(mail)
            .await
            .log_warn(format!("mailing {:?}", mail.subject))
            .is_some()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory channels for exercising code that notifies.

    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingMessenger {
        pub messages: Mutex<Vec<(String, String)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_message(&self, chat_id: &str, text: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("chat unavailable");
            }
            self.messages
                .lock()
                .await
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }

        async fn send_chat_action(&self, _chat_id: &str, _action: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<Mail>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, mail: &Mail) -> anyhow::Result<()> {
            self.sent.lock().await.push(mail.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn notifier(messenger: Arc<RecordingMessenger>, mailer: Arc<RecordingMailer>) -> Notifier {
        Notifier::new(
            Some(messenger),
            Some(mailer),
            Some("log".to_string()),
            Some("group".to_string()),
            "noreply@thescriptgroup.in".to_string(),
        )
    }

    #[tokio::test]
    async fn test_log_posts_to_log_channel() {
        let messenger = Arc::new(RecordingMessenger::default());
        let notifier = notifier(messenger.clone(), Arc::new(RecordingMailer::default()));

        notifier.log("alice deleted 3 from test_users").await;

        let messages = messenger.messages.lock().await;
        assert_eq!(
            messages.as_slice(),
            &[(
                "log".to_string(),
                "<b>Hades</b>: alice deleted 3 from test_users".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let messenger = Arc::new(RecordingMessenger {
            fail: true,
            ..Default::default()
        });
        let notifier = notifier(messenger, Arc::new(RecordingMailer::default()));

        assert!(!notifier.send_message("group", "hello").await);
        notifier.log("still fine").await;
    }

    #[tokio::test]
    async fn test_unconfigured_channels_are_skipped() {
        let notifier = Notifier::default();
        assert!(!notifier.can_mail());
        assert!(!notifier.send_message("group", "hello").await);

        let mail = Mail {
            from: notifier.sender(),
            to: vec![Address::new("a@example.com", None)],
            subject: "s".to_string(),
            html: "h".to_string(),
        };
        assert!(!notifier.send_mail(&mail).await);
    }

    #[tokio::test]
    async fn test_send_mail() {
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = notifier(Arc::new(RecordingMessenger::default()), mailer.clone());
        let mail = Mail {
            from: notifier.sender(),
            to: vec![Address::new("a@example.com", None)],
            subject: "s".to_string(),
            html: "h".to_string(),
        };

        assert!(notifier.send_mail(&mail).await);
        assert_eq!(mailer.sent.lock().await.len(), 1);
        assert_eq!(notifier.group_chat(), Some("group"));
    }
}

//! Notification channel configuration.

use serde::Deserialize;

/// Mail and chat settings, read from unprefixed environment variables:
/// - `SENDGRID_API_KEY`: SendGrid key; mail is disabled when unset
/// - `BOT_API_KEY`: Telegram bot token; chat is disabled when unset
/// - `LOG_ID`: Chat receiving audit log messages
/// - `GROUP_ID`: Default chat for registration notifications
/// - `FROM_EMAIL`: Sender address for confirmation mail
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub sendgrid_api_key: Option<String>,

    #[serde(default)]
    pub bot_api_key: Option<String>,

    #[serde(default)]
    pub log_id: Option<String>,

    #[serde(default)]
    pub group_id: Option<String>,

    #[serde(default = "default_from_email")]
    pub from_email: String,
}

fn default_from_email() -> String {
    "noreply@thescriptgroup.in".to_string()
}

impl NotifyConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env::<NotifyConfig>()
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            sendgrid_api_key: None,
            bot_api_key: None,
            log_id: None,
            group_id: None,
            from_email: default_from_email(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NotifyConfig::default();
        assert_eq!(config.from_email, "noreply@thescriptgroup.in");
        assert!(config.sendgrid_api_key.is_none());
        assert!(config.bot_api_key.is_none());
    }
}

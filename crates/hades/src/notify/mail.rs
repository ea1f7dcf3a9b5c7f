//! Outgoing mail through the SendGrid v3 HTTP API.

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

use super::Mailer;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// A mail recipient or sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Address {
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: email.into(),
            name,
        }
    }
}

/// An HTML mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub from: Address,
    pub to: Vec<Address>,
    pub subject: String,
    pub html: String,
}

#[derive(Serialize)]
struct SendGridPayload<'a> {
    personalizations: [Personalization<'a>; 1],
    from: &'a Address,
    subject: &'a str,
    content: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: &'a [Address],
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

impl Mail {
    fn sendgrid_payload(&self) -> SendGridPayload<'_> {
        SendGridPayload {
            personalizations: [Personalization { to: &self.to }],
            from: &self.from,
            subject: &self.subject,
            content: [Content {
                content_type: "text/html",
                value: &self.html,
            }],
        }
    }
}

/// SendGrid client.
#[derive(Clone, Debug)]
pub struct SendGridMailer {
    api_key: String,
    url: String,
    http: reqwest::Client,
}

impl SendGridMailer {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            url: SENDGRID_URL.to_string(),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, mail: &Mail) -> anyhow::Result<()> {
        let res = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&mail.sendgrid_payload())
            .send()
            .await
            .context("sendgrid: send")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("SendGrid rejected mail: {} - {}", status, body));
        }

        tracing::debug!(subject = %mail.subject, recipients = mail.to.len(), "Mail accepted by SendGrid");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sendgrid_payload_shape() {
        let mail = Mail {
            from: Address::new("noreply@thescriptgroup.in", None),
            to: vec![
                Address::new("a@example.com", Some("A".to_string())),
                Address::new("b@example.com", Some("B".to_string())),
            ],
            subject: "Registration".to_string(),
            html: "<b>done</b>".to_string(),
        };

        let json = serde_json::to_value(mail.sendgrid_payload()).unwrap();
        assert_eq!(json["from"]["email"], "noreply@thescriptgroup.in");
        assert!(json["from"].get("name").is_none());
        assert_eq!(json["personalizations"][0]["to"][1]["name"], "B");
        assert_eq!(json["content"][0]["type"], "text/html");
        assert_eq!(json["content"][0]["value"], "<b>done</b>");
        assert_eq!(json["subject"], "Registration");
    }
}

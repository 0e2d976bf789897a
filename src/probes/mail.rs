//! Mail catcher probe: send one plain-text email over unencrypted SMTP.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;
use tracing::info;

use super::{Probe, ProbeDetail, ServiceKind};
use crate::config::settings::DEFAULT_CONNECT_TIMEOUT_SECONDS;
use crate::config::MailConfig;
use crate::errors::{Error, Result};

pub const SUBJECT: &str = "Test MailCatcher";
pub const BODY: &str = "This is a test email sent via MailCatcher";

pub struct MailProbe {
    config: MailConfig,
}

impl MailProbe {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn mailbox(raw: &str, variable: &str) -> Result<Mailbox> {
        raw.parse::<Mailbox>().map_err(|e| {
            Error::config_var(format!("Invalid {} address '{}': {}", variable, raw, e), variable)
        })
    }

    pub fn build_message(&self) -> Result<Message> {
        Message::builder()
            .from(Self::mailbox(&self.config.from, "MAIL_FROM")?)
            .to(Self::mailbox(&self.config.to, "MAIL_TO")?)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(BODY.to_string())
            .map_err(|e| Error::mail("Failed to build test email", e))
    }

    /// Send through any transport; the probe itself uses plain SMTP
    pub async fn deliver<T>(&self, transport: &T) -> Result<ProbeDetail>
    where
        T: AsyncTransport + Sync,
        T::Error: std::error::Error + Send + Sync + 'static,
    {
        let message = self.build_message()?;
        transport.send(message).await.map_err(|e| {
            Error::mail(
                format!("Failed to send email via {}:{}", self.config.host, self.config.port),
                e,
            )
        })?;

        info!(
            host = %self.config.host,
            port = self.config.port,
            to = %self.config.to,
            "Email sent (check the mail catcher web UI)"
        );

        Ok(ProbeDetail::new(format!("sent '{}' to {}", SUBJECT, self.config.to)).with_data(json!({
            "from": self.config.from,
            "to": self.config.to,
            "subject": SUBJECT,
        })))
    }

    fn transport(&self) -> AsyncSmtpTransport<Tokio1Executor> {
        // Mail catchers speak plain SMTP without STARTTLS or auth
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
            .port(self.config.port)
            .timeout(Some(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS)))
            .build()
    }
}

#[async_trait]
impl Probe for MailProbe {
    fn service(&self) -> ServiceKind {
        ServiceKind::Mail
    }

    async fn run(&self) -> Result<ProbeDetail> {
        let transport = self.transport();
        self.deliver(&transport).await
    }
}

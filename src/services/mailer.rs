use std::sync::Mutex;

use async_trait::async_trait;

use crate::settings::Mail;

#[derive(Clone, Debug, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl Email {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Email {
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, email: Email) -> Result<(), anyhow::Error>;
}

/// Sends `email` and logs failures instead of returning them. Notifications
/// never fail the request that triggered them.
pub async fn send_best_effort(mailer: &dyn Mailer, email: Email) {
    let subject = email.subject.clone();
    if let Err(e) = mailer.send(email).await {
        log::error!("Failed to send \"{}\" email: {}", subject, e);
    }
}

/// Writes messages to the `mail` log target. Delivery happens outside the
/// service.
pub struct LogMailer {
    from: String,
    relay: String,
}

impl LogMailer {
    pub fn new(settings: &Mail) -> Self {
        let relay = match (&settings.smtp_user, &settings.smtp_pass) {
            (Some(user), Some(_)) => {
                format!("{}@{}:{}", user, settings.smtp_host, settings.smtp_port)
            }
            (Some(user), None) => {
                log::warn!("SMTP user {} has no password; relay is unauthenticated", user);
                format!("{}:{}", settings.smtp_host, settings.smtp_port)
            }
            (None, _) => format!("{}:{}", settings.smtp_host, settings.smtp_port),
        };

        LogMailer {
            from: settings.from.clone(),
            relay,
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), anyhow::Error> {
        log::info!(
            target: "mail",
            "[{}] {} -> {}: {}\n{}",
            self.relay,
            self.from,
            email.to,
            email.subject,
            email.text
        );
        Ok(())
    }
}

/// Keeps every message in an outbox instead of sending it.
#[derive(Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<Email>>,
    failing: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails.
    pub fn failing() -> Self {
        MemoryMailer {
            failing: true,
            ..Default::default()
        }
    }

    pub fn outbox(&self) -> Vec<Email> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: Email) -> Result<(), anyhow::Error> {
        if self.failing {
            anyhow::bail!("SMTP connection refused");
        }

        self.outbox
            .lock()
            .map_err(|_| anyhow::anyhow!("Outbox lock poisoned"))?
            .push(email);
        Ok(())
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use shared::{domain::Grievance, protocol::NotificationOutcome};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

/// A composed message ready for the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Transport seam over the SMTP relay. One call means one send attempt;
/// retries, if wanted, belong to the relay side.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<()>;
}

/// lettre-backed transport speaking STARTTLS to the configured relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> Result<Self> {
        let from = cfg
            .from_address
            .parse::<Mailbox>()
            .with_context(|| format!("invalid sender address '{}'", cfg.from_address))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .with_context(|| format!("invalid smtp relay host '{}'", cfg.host))?
            .port(cfg.port)
            .credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: OutboundEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email
                .to
                .parse()
                .with_context(|| format!("invalid recipient address '{}'", email.to))?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .context("failed to compose message")?;
        self.transport
            .send(message)
            .await
            .context("smtp send failed")?;
        Ok(())
    }
}

/// Notification sender. Best-effort: a transport failure is folded into the
/// returned outcome and logged, never raised.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
}

impl Notifier {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self { transport }
    }

    pub async fn send_status_update(&self, grievance: &Grievance) -> NotificationOutcome {
        if grievance.email.is_empty() {
            info!(id = %grievance.id, "no recipient on grievance, skipping notification");
            return NotificationOutcome::Skipped;
        }

        let email = status_update_email(grievance);
        match self.transport.send(email).await {
            Ok(()) => {
                info!(id = %grievance.id, status = %grievance.status, "status notification sent");
                NotificationOutcome::Sent
            }
            Err(error) => {
                warn!(id = %grievance.id, %error, "status notification failed");
                NotificationOutcome::Failed {
                    reason: error.to_string(),
                }
            }
        }
    }
}

pub fn status_update_email(grievance: &Grievance) -> OutboundEmail {
    OutboundEmail {
        to: grievance.email.clone(),
        subject: "Grievance Status Update".to_string(),
        body: format!(
            "Hello {},\n\n\
             Your grievance status has been updated to: {}.\n\
             Category: {}\n\
             Description: {}\n\n\
             Thank you,\n\
             Grievance Management Team\n",
            grievance.name, grievance.status, grievance.category, grievance.description
        ),
    }
}

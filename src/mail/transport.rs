//! SMTP transport seam and its lettre implementation.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use uuid::Uuid;

use super::OutgoingEmail;
use crate::config::SmtpSettings;

/// Port on which the server expects TLS from the first byte.
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// An open (not yet verified) session with the mail provider.
///
/// Errors are provider diagnostics coerced to strings; they never carry
/// credentials.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Connectivity handshake. Must not submit anything.
    async fn verify(&self) -> Result<(), String>;

    /// Submit one message to all of its recipients and return the
    /// message id the transport assigned.
    async fn send(&self, email: &OutgoingEmail) -> Result<String, String>;
}

/// Builds transports from resolved settings.
pub trait TransportConnector: Send + Sync {
    fn connect(&self, settings: &SmtpSettings) -> Result<Box<dyn MailTransport>, String>;
}

/// How the session is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte (SMTPS).
    Implicit,
    /// Plain connect, upgraded with STARTTLS when the server offers it.
    Opportunistic,
}

impl TlsMode {
    pub fn for_port(port: u16) -> Self {
        if port == IMPLICIT_TLS_PORT {
            Self::Implicit
        } else {
            Self::Opportunistic
        }
    }
}

// ── lettre ──────────────────────────────────────────────────────────

/// Connector producing lettre `AsyncSmtpTransport`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LettreConnector;

impl TransportConnector for LettreConnector {
    fn connect(&self, settings: &SmtpSettings) -> Result<Box<dyn MailTransport>, String> {
        let transport = build_transport(settings).map_err(|e| e.to_string())?;
        Ok(Box::new(LettreTransport {
            transport,
            message_domain: domain_of(&settings.from_address).to_string(),
        }))
    }
}

fn build_transport(
    settings: &SmtpSettings,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, lettre::transport::smtp::Error> {
    let builder = match TlsMode::for_port(settings.port) {
        TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?,
        TlsMode::Opportunistic => {
            // Certificates are still verified when the upgrade happens.
            let tls = TlsParameters::new(settings.host.clone())?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                .tls(Tls::Opportunistic(tls))
        }
    };

    let credentials = Credentials::new(
        settings.username.clone(),
        settings.password.expose_secret().to_string(),
    );

    Ok(builder
        .port(settings.port)
        .credentials(credentials)
        .timeout(Some(settings.timeout))
        .build())
}

struct LettreTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    message_domain: String,
}

#[async_trait]
impl MailTransport for LettreTransport {
    async fn verify(&self) -> Result<(), String> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err("SMTP server did not accept the connection".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<String, String> {
        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.message_domain);
        let message = build_message(email, &message_id)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| e.to_string())?;
        Ok(message_id)
    }
}

/// Build the MIME message: one `To` header listing every recipient and a
/// `multipart/alternative` body with text and HTML parts.
pub fn build_message(email: &OutgoingEmail, message_id: &str) -> Result<Message, String> {
    let from_address: Address = email
        .from_address
        .parse()
        .map_err(|e| format!("Invalid from address {}: {e}", email.from_address))?;

    let mut builder = Message::builder()
        .from(Mailbox::new(Some(email.from_name.clone()), from_address))
        .subject(email.subject.as_str())
        .message_id(Some(message_id.to_string()));

    for recipient in &email.to {
        let mailbox: Mailbox = recipient
            .parse()
            .map_err(|e| format!("Invalid recipient address {recipient}: {e}"))?;
        builder = builder.to(mailbox);
    }

    builder
        .multipart(MultiPart::alternative_plain_html(
            email.text.clone(),
            email.html.clone(),
        ))
        .map_err(|e| format!("Failed to build email: {e}"))
}

fn domain_of(address: &str) -> &str {
    address
        .rsplit_once('@')
        .map_or("localhost", |(_, domain)| domain)
}

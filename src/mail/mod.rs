//! Email dispatch: validate, resolve transport settings, verify, send.
//!
//! Each step can end the request with a [`DispatchError`]; nothing is
//! retried and there is no partial success.

pub mod transport;

pub use transport::{LettreConnector, MailTransport, TlsMode, TransportConnector};

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use validator::Validate;

use crate::config::MailConfig;
use crate::error::{DispatchError, FieldViolation};
use crate::recipients::RecipientList;

/// Display name used in the `From` header.
pub const FROM_DISPLAY_NAME: &str = "AI Email Assistant";

/// Longest subject prefix written to the send log.
const LOGGED_SUBJECT_CHARS: usize = 32;

/// Body of `POST /api/send`.
#[derive(Debug, Clone, Default, Validate)]
pub struct SendRequest {
    #[validate(length(min = 3, message = "Recipients must be at least 3 characters"))]
    pub recipients: String,

    #[validate(length(min = 1, max = 200, message = "Subject must be between 1 and 200 characters"))]
    pub subject: String,

    #[validate(length(min = 1, max = 10000, message = "Body must be between 1 and 10000 characters"))]
    pub body: String,
}

impl SendRequest {
    /// Read the request from a decoded JSON body.
    ///
    /// Missing or null fields become empty strings and fail their length rule.
    /// A field of the wrong type is reported together with every other
    /// field's violations.
    pub fn from_json(value: &Value) -> Result<Self, DispatchError> {
        let Some(object) = value.as_object() else {
            return Err(DispatchError::Validation(vec![FieldViolation::new(
                "request",
                "Request body must be a JSON object",
            )]));
        };

        let mut type_errors = Vec::new();
        let mut text_field = |name: &str| match object.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(_) => {
                type_errors.push(FieldViolation::new(name, format!("{name} must be a string")));
                String::new()
            }
        };

        let request = Self {
            recipients: text_field("recipients"),
            subject: text_field("subject"),
            body: text_field("body"),
        };
        if type_errors.is_empty() {
            return Ok(request);
        }

        let mut violations = match request.validate().map_err(DispatchError::from) {
            Err(DispatchError::Validation(found)) => found
                .into_iter()
                .filter(|v| !type_errors.iter().any(|t| t.field == v.field))
                .collect(),
            _ => Vec::new(),
        };
        violations.extend(type_errors);
        violations.sort_by(|a, b| a.field.cmp(&b.field));
        Err(DispatchError::Validation(violations))
    }
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub success: bool,
    pub message_id: String,
}

/// A fully rendered message ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from_name: String,
    pub from_address: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl OutgoingEmail {
    fn compose(from_address: &str, recipients: &RecipientList, subject: &str, body: &str) -> Self {
        Self {
            from_name: FROM_DISPLAY_NAME.to_string(),
            from_address: from_address.to_string(),
            to: recipients.as_slice().to_vec(),
            subject: subject.to_string(),
            text: body.to_string(),
            html: render_html(body),
        }
    }
}

/// Sends emails through whatever transport the connector produces.
#[derive(Clone)]
pub struct Dispatcher {
    config: MailConfig,
    connector: Arc<dyn TransportConnector>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(config: MailConfig, connector: Arc<dyn TransportConnector>) -> Self {
        Self { config, connector }
    }

    /// Dispatcher backed by lettre's SMTP transport.
    pub fn smtp(config: MailConfig) -> Self {
        Self::new(config, Arc::new(LettreConnector))
    }

    /// Deliver one email to every valid recipient in `request`.
    pub async fn send(&self, request: &SendRequest) -> Result<SendResult, DispatchError> {
        request.validate()?;

        let settings = self.config.settings().inspect_err(|_| {
            self.config.log_presence();
        })?;

        let recipients =
            RecipientList::parse(&request.recipients).ok_or(DispatchError::NoValidRecipients)?;

        let transport = self
            .connector
            .connect(&settings)
            .map_err(DispatchError::TransportConnect)?;

        if let Err(detail) = transport.verify().await {
            warn!(
                host = %settings.host,
                port = settings.port,
                tls = ?TlsMode::for_port(settings.port),
                error = %detail,
                "SMTP verification failed"
            );
            return Err(DispatchError::TransportConnect(detail));
        }

        let email = OutgoingEmail::compose(
            &settings.from_address,
            &recipients,
            &request.subject,
            &request.body,
        );

        let message_id = transport.send(&email).await.map_err(|detail| {
            warn!(error = %detail, "SMTP send failed");
            DispatchError::Send(detail)
        })?;

        info!(
            subject = %truncate_for_log(&request.subject),
            recipients = %recipients,
            message_id = %message_id,
            "Email sent"
        );

        Ok(SendResult {
            success: true,
            message_id,
        })
    }
}

/// Render the HTML alternative: escaped body, newlines as `<br>`, wrapped in
/// a minimal styled document.
pub fn render_html(body: &str) -> String {
    let escaped = escape_html(body)
        .replace("\r\n", "\n")
        .replace('\n', "<br>\n");
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><meta charset=\"utf-8\"></head>\n\
         <body style=\"font-family: Arial, sans-serif; line-height: 1.6; color: #333;\">\n\
         <div style=\"max-width: 600px; margin: 0 auto; padding: 20px;\">\n\
         {escaped}\n\
         </div>\n\
         </body>\n\
         </html>\n"
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn truncate_for_log(subject: &str) -> String {
    if subject.chars().count() > LOGGED_SUBJECT_CHARS {
        let head: String = subject.chars().take(LOGGED_SUBJECT_CHARS).collect();
        format!("{head}...")
    } else {
        subject.to_string()
    }
}

//! Configuration types, built once from the process environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Timeout for the language-model call.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for the SMTP connection and greeting.
pub const SMTP_TIMEOUT: Duration = Duration::from_secs(15);

const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SMTP_PORT: u16 = 465;
const DEFAULT_HTTP_PORT: u16 = 3000;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Language-model provider settings.
    pub llm: LlmConfig,
    /// Outbound mail settings.
    pub mail: MailConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds (`HOST`:`PORT`).
    pub bind_addr: SocketAddr,
}

/// Language-model provider configuration.
///
/// The API key is optional here; its absence is reported per request.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Bearer credential for the provider (`OPENAI_API_KEY`).
    pub api_key: Option<SecretString>,
    /// Base URL without trailing slash; `/chat/completions` is appended.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
    /// Upper bound on generated tokens per draft.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Timeout for the whole provider exchange.
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            max_tokens: 800,
            temperature: 0.7,
            timeout: LLM_TIMEOUT,
        }
    }
}

/// Outbound mail transport configuration, as read from the environment.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// SMTP server host name.
    pub host: Option<String>,
    /// SMTP port; 465 selects implicit TLS.
    pub port: u16,
    /// Login name for SMTP authentication.
    pub username: Option<String>,
    /// SMTP password (`SMTP_PASS`).
    pub password: Option<SecretString>,
    /// Envelope and `From` address, when it differs from the username.
    pub from_address: Option<String>,
    /// Timeout for connecting and each SMTP command.
    pub timeout: Duration,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_SMTP_PORT,
            username: None,
            password: None,
            from_address: None,
            timeout: SMTP_TIMEOUT,
        }
    }
}

/// Fully resolved SMTP settings; every required value is present.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    /// SMTP server host name, also used for TLS verification.
    pub host: String,
    /// SMTP port.
    pub port: u16,
    /// Login name.
    pub username: String,
    /// Login secret.
    pub password: SecretString,
    /// Address placed in the `From` header.
    pub from_address: String,
    /// Transport timeout.
    pub timeout: Duration,
}

impl MailConfig {
    /// Resolve the settings needed to open a transport.
    ///
    /// Every missing key is reported at once. The from-address falls back
    /// to the username.
    pub fn settings(&self) -> Result<SmtpSettings, ConfigError> {
        let (Some(host), Some(username), Some(password)) =
            (&self.host, &self.username, &self.password)
        else {
            let keys = [
                ("SMTP_HOST", self.host.is_none()),
                ("SMTP_USER", self.username.is_none()),
                ("SMTP_PASS", self.password.is_none()),
            ]
            .into_iter()
            .filter(|(_, missing)| *missing)
            .map(|(key, _)| key.to_string())
            .collect();
            return Err(ConfigError::MissingRequired { keys });
        };

        Ok(SmtpSettings {
            host: host.clone(),
            port: self.port,
            username: username.clone(),
            password: password.clone(),
            from_address: self
                .from_address
                .clone()
                .unwrap_or_else(|| username.clone()),
            timeout: self.timeout,
        })
    }

    /// Log which values are present. Never logs the password itself.
    pub fn log_presence(&self) {
        tracing::warn!(
            host_set = self.host.is_some(),
            port = self.port,
            user_set = self.username.is_some(),
            pass_set = self.password.is_some(),
            from_set = self.from_address.is_some(),
            "SMTP configuration incomplete"
        );
    }
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let http_port = parse_port(get("PORT"), "PORT", DEFAULT_HTTP_PORT)?;
        let host: IpAddr = match get("HOST") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: "HOST".into(),
                message: format!("{e}"),
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let llm = LlmConfig {
            api_key: get("OPENAI_API_KEY").map(SecretString::from),
            base_url: get("OPENAI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            ..LlmConfig::default()
        };

        let mail = MailConfig {
            host: get("SMTP_HOST"),
            port: parse_port(get("SMTP_PORT"), "SMTP_PORT", DEFAULT_SMTP_PORT)?,
            username: get("SMTP_USER"),
            password: get("SMTP_PASS").map(SecretString::from),
            from_address: get("SMTP_FROM"),
            ..MailConfig::default()
        };

        Ok(Self {
            server: ServerConfig {
                bind_addr: SocketAddr::new(host, http_port),
            },
            llm,
            mail,
        })
    }

    /// Log a redacted summary of the loaded configuration.
    pub fn log_summary(&self) {
        tracing::info!(
            bind = %self.server.bind_addr,
            model = %self.llm.model,
            llm_base_url = %self.llm.base_url,
            api_key_set = self.llm.api_key.is_some(),
            "Language model configured"
        );
        tracing::info!(
            smtp_host = self.mail.host.as_deref().unwrap_or("<unset>"),
            smtp_port = self.mail.port,
            user_set = self.mail.username.is_some(),
            pass_set = self.mail.password.is_some(),
            from_set = self.mail.from_address.is_some(),
            "Mail transport configured"
        );
    }
}

fn parse_port(raw: Option<String>, key: &str, default: u16) -> Result<u16, ConfigError> {
    match raw {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a port number, got {value:?}"),
        }),
        None => Ok(default),
    }
}

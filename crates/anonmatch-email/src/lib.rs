// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP mailer delivering one-time verification codes.
//!
//! Implements [`OtpMailer`] over lettre's async SMTP transport. Port 465
//! uses implicit TLS; every other port negotiates STARTTLS.

pub mod template;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use anonmatch_config::model::SmtpConfig;
use anonmatch_core::types::{AdapterType, HealthStatus};
use anonmatch_core::{AnonmatchError, OtpMailer, PluginAdapter};

const IMPLICIT_TLS_PORT: u16 = 465;

fn mail_err(action: &str, e: impl std::error::Error + Send + Sync + 'static) -> AnonmatchError {
    AnonmatchError::Mail {
        message: format!("failed to {action}: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Resolves the sender mailbox from `smtp.from`, falling back to `smtp.username`.
pub fn sender_mailbox(config: &SmtpConfig) -> Result<Mailbox, AnonmatchError> {
    let raw = config
        .from
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or(config.username.as_deref())
        .ok_or_else(|| {
            AnonmatchError::Config("smtp.from or smtp.username is required for email".into())
        })?;
    let (name, email) = template::split_sender(raw);
    let address = email.parse::<Address>().map_err(|e| {
        AnonmatchError::Config(format!("invalid smtp sender address {email:?}: {e}"))
    })?;
    Ok(Mailbox::new(Some(name), address))
}

/// SMTP-backed [`OtpMailer`].
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the transport. No connection is made until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self, AnonmatchError> {
        let from = sender_mailbox(config)?;
        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| mail_err("configure SMTP relay", e))?
        .port(config.port);

        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => {
                warn!(host = %config.host, "SMTP credentials not set, sending unauthenticated");
                builder
            }
        };

        info!(host = %config.host, port = config.port, "SMTP mailer configured");
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    pub fn from(&self) -> &Mailbox {
        &self.from
    }

    fn build_message(
        &self,
        email: &str,
        code: &str,
        expiry_minutes: u32,
    ) -> Result<Message, AnonmatchError> {
        let to = email
            .parse::<Address>()
            .map_err(|e| AnonmatchError::invalid("email", e.to_string()))?;
        Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(None, to))
            .subject(template::OTP_SUBJECT)
            .multipart(MultiPart::alternative_plain_html(
                template::render_otp_text(code, expiry_minutes),
                template::render_otp_html(code, expiry_minutes),
            ))
            .map_err(|e| mail_err("build message", e))
    }
}

#[async_trait]
impl PluginAdapter for SmtpMailer {
    fn name(&self) -> &str {
        "smtp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Mailer
    }

    async fn health_check(&self) -> Result<HealthStatus, AnonmatchError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(HealthStatus::Healthy),
            Ok(false) => Ok(HealthStatus::Degraded("SMTP server rejected NOOP".into())),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("SMTP unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), AnonmatchError> {
        debug!("SMTP mailer shutting down");
        Ok(())
    }
}

#[async_trait]
impl OtpMailer for SmtpMailer {
    async fn send_otp(
        &self,
        email: &str,
        code: &str,
        expiry_minutes: u32,
    ) -> Result<(), AnonmatchError> {
        let message = self.build_message(email, code, expiry_minutes)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| mail_err("send verification email", e))?;
        debug!("verification email sent");
        Ok(())
    }
}

//! Email service for sending password reset OTPs.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

use crate::{
    config::{EmailConfig, EmailTransport as TransportKind},
    errors::{Error, Upstream},
};

/// Sender used when neither `from_email` nor an SMTP username is configured
const FALLBACK_SENDER: &str = "imgscribe@localhost";

pub const OTP_EMAIL_SUBJECT: &str = "Password Reset OTP";

pub struct EmailService {
    transport: EmailTransport,
    from: Mailbox,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Result<Self, Error> {
        let transport = match config.transport() {
            TransportKind::Smtp => {
                let smtp = &config.smtp;
                if !smtp.use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if smtp.use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(smtp.port)
                .credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            TransportKind::File => {
                // Use file transport for development/testing
                let emails_dir = Path::new(&config.file_path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        let sender = match config.sender() {
            "" => FALLBACK_SENDER,
            sender => sender,
        };
        let from = format!("{} <{}>", config.from_name, sender)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        Ok(Self { transport, from })
    }

    /// Send the password reset OTP to `to_email`.
    #[tracing::instrument(skip(self, otp), err)]
    pub async fn send_otp_email(&self, to_email: &str, otp: &str) -> Result<(), Error> {
        let to = to_email.parse::<Mailbox>().map_err(|e| Error::upstream(Upstream::Email, e))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(OTP_EMAIL_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(otp_body(otp))
            .map_err(|e| Error::upstream(Upstream::Email, e))?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::upstream(Upstream::Email, e))?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::upstream(Upstream::Email, e))?;
            }
        }

        Ok(())
    }
}

fn otp_body(otp: &str) -> String {
    format!("Your OTP for password reset is: {otp}")
}

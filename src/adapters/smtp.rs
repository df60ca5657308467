use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::errors::AppError;
use crate::ports::{BoxFuture, Mailer, OutgoingEmail};

/// Implicit-TLS port; anything else upgrades with STARTTLS.
const SMTPS_PORT: u16 = 465;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::Configuration(format!("Invalid EMAIL_FROM: {}", e)))?;

        let builder = if config.port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| AppError::Configuration(format!("Invalid SMTP_HOST: {}", e)))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

impl Mailer for SmtpMailer {
    fn send<'a>(&'a self, email: &'a OutgoingEmail) -> BoxFuture<'a, Result<(), AppError>> {
        Box::pin(async move {
            let to = email
                .to
                .parse::<Mailbox>()
                .map_err(|e| AppError::Validation(format!("Invalid recipient {}: {}", email.to, e)))?;

            let message = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(email.subject.as_str())
                .header(ContentType::TEXT_HTML)
                .body(email.html.clone())
                .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

            self.transport
                .send(message)
                .await
                .map_err(|e| AppError::External(format!("SMTP send failed: {}", e)))?;
            Ok(())
        })
    }
}

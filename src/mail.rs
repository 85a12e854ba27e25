use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::config::{MailConfig, MailerKind};

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        // 465 is implicit TLS, anything else negotiates STARTTLS.
        let builder = if cfg.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
        }
        .with_context(|| format!("smtp relay {}", cfg.host))?
        .port(cfg.port);

        let builder = match (&cfg.username, &cfg.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        let from = format!("Support <{}>", cfg.from_address)
            .parse::<Mailbox>()
            .context("MAIL_FROM_ADDRESS is not a valid address")?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        let to = mail
            .to
            .parse::<Mailbox>()
            .with_context(|| format!("invalid recipient {}", mail.to))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(mail.html)
            .context("build message")?;

        let response = self.transport.send(message).await.context("smtp send")?;
        debug!(to = %mail.to, code = %response.code(), "mail delivered");
        Ok(())
    }
}

/// Development mailer: prints the message instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        info!(to = %mail.to, subject = %mail.subject, body = %mail.html, "mail (log mailer)");
        Ok(())
    }
}

pub fn from_config(cfg: &MailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    Ok(match cfg.mailer {
        MailerKind::Smtp => Arc::new(SmtpMailer::new(cfg)?),
        MailerKind::Log => Arc::new(LogMailer),
    })
}

pub fn verification_mail(to: &str, link: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Verify your email".into(),
        html: format!(
            "<p>Please verify your email address by clicking the link below:</p>\
             <p><a href=\"{link}\">Verify Email</a></p>\
             <p>This link expires in 24 hours.</p>"
        ),
    }
}

pub fn password_reset_mail(to: &str, new_password: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Your password has been reset".into(),
        html: format!(
            "<p>Your password has been reset.</p>\
             <p>Your new password is: <strong>{new_password}</strong></p>\
             <p>Please change it after logging in.</p>"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail_config(kind: MailerKind) -> MailConfig {
        MailConfig {
            mailer: kind,
            host: "smtp.example.com".into(),
            port: 587,
            username: Some("user".into()),
            password: Some("pass".into()),
            from_address: "support@example.com".into(),
        }
    }

    #[test]
    fn verification_mail_carries_the_link() {
        let mail = verification_mail("a@x.com", "http://app/email-verification?token=abc");
        assert_eq!(mail.to, "a@x.com");
        assert!(mail.html.contains("http://app/email-verification?token=abc"));
    }

    #[test]
    fn reset_mail_carries_the_password() {
        let mail = password_reset_mail("a@x.com", "123456");
        assert!(mail.html.contains("123456"));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let mailer = from_config(&mail_config(MailerKind::Log)).unwrap();
        mailer
            .send(password_reset_mail("a@x.com", "654321"))
            .await
            .expect("log mailer never fails");
    }

    #[tokio::test]
    async fn smtp_mailer_rejects_bad_sender() {
        let mut cfg = mail_config(MailerKind::Smtp);
        cfg.from_address = "not an address".into();
        assert!(SmtpMailer::new(&cfg).is_err());
    }
}

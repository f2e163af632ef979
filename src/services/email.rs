use anyhow::Context;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::config::Config;

const APP_NAME: &str = "Canteen";

pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    /// Returns None if SMTP is not fully configured.
    pub fn new(config: &Config) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let username = config.smtp_username.clone()?;
        let password = config.smtp_password.clone()?;
        let from_addr = config.smtp_from.as_deref()?;

        let port = config.smtp_port.unwrap_or(587);
        let creds = Credentials::new(username, password);

        let transport = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .ok()?
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()?
                .port(port)
                .credentials(creds)
                .build()
        };

        let from: Mailbox = from_addr.parse().ok()?;

        Some(Self { transport, from })
    }

    fn new_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain())
    }

    fn recipient(to_email: &str, to_name: &str) -> anyhow::Result<Mailbox> {
        match format!("{to_name} <{to_email}>").parse() {
            Ok(mailbox) => Ok(mailbox),
            Err(_) => to_email.parse().context("Invalid recipient address"),
        }
    }

    /// Single call-to-action layout shared by every mail we send.
    fn action_html(title: &str, greeting: &str, body: &str, button: &str, url: &str, footer: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{APP_NAME}</title></head>
<body style="margin:0;padding:40px 16px;background:#f1f5f9;font-family:-apple-system,'Segoe UI',Roboto,Helvetica,Arial,sans-serif">
  <div style="max-width:520px;margin:0 auto;background:#ffffff;border-radius:12px;padding:40px">
    <h1 style="margin:0 0 8px 0;font-size:22px;color:#0f172a">{title}</h1>
    <p style="margin:0 0 28px 0;font-size:15px;color:#64748b;line-height:1.6">{greeting}<br><br>{body}</p>
    <a href="{url}" style="display:inline-block;padding:13px 28px;background:#16a34a;color:#ffffff;text-decoration:none;font-weight:600;border-radius:8px">{button}</a>
    <p style="margin:28px 0 0 0;font-size:13px;color:#94a3b8">{footer}</p>
  </div>
</body>
</html>"#
        )
    }

    async fn send_email(&self, to: Mailbox, subject: &str, text: String, html: String) -> anyhow::Result<()> {
        let from = Mailbox::new(Some(APP_NAME.to_string()), self.from.email.clone());
        let email = Message::builder()
            .message_id(Some(self.new_message_id()))
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )
            .context("Failed to build email message")?;

        self.transport
            .send(email)
            .await
            .context("Failed to send email")?;

        Ok(())
    }

    pub async fn send_confirmation(&self, to_email: &str, to_name: &str, confirm_url: &str) -> anyhow::Result<()> {
        let to = Self::recipient(to_email, to_name)?;
        let subject = format!("Confirm your {APP_NAME} account");

        let text = format!(
            "Hi {to_name},\n\n\
            Confirm your email address to start ordering (link valid 24 hours):\n\
            {confirm_url}\n\n\
            If you did not sign up, ignore this email."
        );
        let html = Self::action_html(
            "Confirm your email",
            &format!("Hi <strong>{to_name}</strong>,"),
            "Confirm your email address to start pre-ordering from the canteen.",
            "Confirm email",
            confirm_url,
            "This link expires in 24 hours. If you did not sign up, ignore this email.",
        );

        self.send_email(to, &subject, text, html).await
    }

    pub async fn send_password_reset(&self, to_email: &str, to_name: &str, reset_url: &str) -> anyhow::Result<()> {
        let to = Self::recipient(to_email, to_name)?;
        let subject = format!("Reset your {APP_NAME} password");

        let text = format!(
            "Hi {to_name},\n\n\
            Use this link to choose a new password (valid 1 hour):\n\
            {reset_url}\n\n\
            If you did not ask for a reset, ignore this email."
        );
        let html = Self::action_html(
            "Reset your password",
            &format!("Hi <strong>{to_name}</strong>,"),
            "Someone asked to reset the password on your account. Click below to choose a new one.",
            "Reset password",
            reset_url,
            "This link expires in 1 hour. If you did not ask for a reset, ignore this email.",
        );

        self.send_email(to, &subject, text, html).await
    }
}

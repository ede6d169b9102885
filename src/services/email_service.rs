//! Transactional email: password-setup messages via Resend or `.eml` files.

use crate::config::{EmailConfig, EmailTransportConfig};
use lettre::{
    AsyncFileTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_FROM: &str = "GTI Notifications <onboarding@resend.dev>";
pub const SETUP_SUBJECT: &str = "Set your GTI Toolio password";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("invalid email address `{0}`")]
    InvalidAddress(String),
    #[error("could not build message: {0}")]
    Build(String),
    #[error("email provider rejected the message ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error("email transport failed: {0}")]
    Transport(String),
}

enum Transport {
    Resend {
        client: reqwest::Client,
        api_key: String,
        api_base: String,
    },
    File(AsyncFileTransport<Tokio1Executor>),
}

pub struct EmailService {
    transport: Transport,
    from: String,
    app_base_url: String,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl EmailService {
    pub fn new(cfg: &EmailConfig) -> anyhow::Result<Self> {
        let transport = match &cfg.transport {
            EmailTransportConfig::Resend { api_key, api_base } => Transport::Resend {
                client: reqwest::Client::new(),
                api_key: api_key.clone(),
                api_base: api_base.clone(),
            },
            EmailTransportConfig::File { dir } => {
                let dir = Path::new(dir);
                if !dir.exists() {
                    std::fs::create_dir_all(dir)?;
                    tracing::info!("Created email directory at {}", dir.display());
                }
                tracing::warn!("RESEND_API_KEY not set; emails are written to {}", dir.display());
                Transport::File(AsyncFileTransport::<Tokio1Executor>::new(dir))
            }
        };

        Ok(Self {
            transport,
            from: resolve_from_address(cfg.from.as_deref()),
            app_base_url: cfg.app_base_url.clone(),
        })
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    /// Link the recipient follows to choose a password.
    pub fn setup_link(&self, token: &str) -> String {
        format!("{}/set-password?token={}", self.app_base_url, token)
    }

    pub async fn send_password_setup_email(&self, to: &str, setup_link: &str) -> Result<(), EmailError> {
        let html = password_setup_body(setup_link);
        self.send_email(to, SETUP_SUBJECT, &html).await
    }

    /// Send one HTML message. Failures are logged and returned, never retried.
    pub async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError> {
        tracing::info!(to = %to, from = %self.from, "sending email");
        let result = self.deliver(to, subject, html).await;
        match &result {
            Ok(()) => tracing::info!(to = %to, "email sent"),
            Err(e) => tracing::error!(to = %to, "error sending email: {}", e),
        }
        result
    }

    async fn deliver(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError> {
        let to_mailbox = to
            .trim()
            .parse::<Mailbox>()
            .map_err(|_| EmailError::InvalidAddress(to.to_string()))?;

        match &self.transport {
            Transport::Resend {
                client,
                api_key,
                api_base,
            } => {
                let to_address = to_mailbox.to_string();
                let response = client
                    .post(format!("{}/emails", api_base))
                    .bearer_auth(api_key)
                    .json(&ResendRequest {
                        from: &self.from,
                        to: [to_address.as_str()],
                        subject,
                        html,
                    })
                    .send()
                    .await
                    .map_err(|e| EmailError::Transport(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    let message = serde_json::from_str::<serde_json::Value>(&body)
                        .ok()
                        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                        .unwrap_or(body);
                    return Err(EmailError::Provider {
                        status: status.as_u16(),
                        message,
                    });
                }
                Ok(())
            }
            Transport::File(file) => {
                let from = self
                    .from
                    .parse::<Mailbox>()
                    .map_err(|_| EmailError::InvalidAddress(self.from.clone()))?;
                let message = Message::builder()
                    .from(from)
                    .to(to_mailbox)
                    .subject(subject)
                    .header(ContentType::TEXT_HTML)
                    .body(html.to_string())
                    .map_err(|e| EmailError::Build(e.to_string()))?;
                file.send(message)
                    .await
                    .map_err(|e| EmailError::Transport(e.to_string()))?;
                Ok(())
            }
        }
    }
}

/// Pick the sender. A value that does not parse as `Name <addr>` or a bare
/// address, or whose domain has no dot, is replaced by [`DEFAULT_FROM`].
pub fn resolve_from_address(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_FROM.to_string();
    };
    match raw.parse::<Mailbox>() {
        Ok(mailbox) if mailbox.email.domain().contains('.') => raw.to_string(),
        _ => {
            tracing::warn!(
                "EMAIL_FROM / SENDGRID_FROM_EMAIL has invalid format: {:?}. Falling back to {:?}",
                raw,
                DEFAULT_FROM
            );
            DEFAULT_FROM.to_string()
        }
    }
}

fn password_setup_body(link: &str) -> String {
    format!(
        r#"<div style="margin:0;padding:0;background-color:#f5f5f7;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Helvetica,Arial,sans-serif;color:#111827;">
  <table width="100%" cellpadding="0" cellspacing="0" role="presentation" style="background-color:#f5f5f7;padding:32px 16px;">
    <tr>
      <td align="center">
        <table width="100%" cellpadding="0" cellspacing="0" role="presentation" style="max-width:520px;background-color:#ffffff;border-radius:16px;overflow:hidden;">
          <tr>
            <td align="center" style="padding:24px 24px 8px;">
              <div style="font-size:26px;font-weight:600;letter-spacing:0.18em;text-transform:uppercase;">Toolio</div>
            </td>
          </tr>
          <tr>
            <td style="height:4px;background:linear-gradient(90deg,#3B06D2,#7C3AED);"></td>
          </tr>
          <tr>
            <td style="padding:28px 24px 8px;">
              <h1 style="margin:0 0 8px;font-size:22px;line-height:1.3;font-weight:600;">Set Your Password</h1>
              <p style="margin:0 0 16px;font-size:14px;line-height:1.6;color:#4b5563;">Hello,</p>
              <p style="margin:0 0 16px;font-size:14px;line-height:1.6;color:#4b5563;">
                An account has been created for you in the <strong>GTI Toolio</strong>.
                To secure your account, please set your password using the button below.
              </p>
              <div style="margin:24px 0;">
                <a href="{link}" style="display:inline-block;padding:12px 24px;border-radius:999px;background:#111827;color:#ffffff;font-size:14px;font-weight:600;letter-spacing:0.06em;text-transform:uppercase;text-decoration:none;">Set Password</a>
              </div>
              <p style="margin:0 0 16px;font-size:12px;line-height:1.5;color:#6b7280;">
                If the button doesn't work, copy and paste this link into your browser:
              </p>
              <p style="margin:0 0 20px;font-size:12px;line-height:1.5;word-break:break-all;background-color:#f9fafb;border-radius:8px;padding:10px 12px;border:1px solid #e5e7eb;">
                <a href="{link}" style="color:#2563eb;text-decoration:none;">{link}</a>
              </p>
              <p style="margin:0 0 8px;font-size:12px;line-height:1.5;color:#6b7280;">
                This link will expire in <strong>1 hour</strong> for security reasons.
              </p>
              <p style="margin:0;font-size:12px;line-height:1.5;color:#6b7280;">
                If you did not expect this email, you can safely ignore it.
              </p>
            </td>
          </tr>
          <tr>
            <td style="padding:20px 24px 24px;border-top:1px solid #e5e7eb;">
              <p style="margin:0 0 4px;font-size:12px;line-height:1.5;color:#9ca3af;">Best regards,</p>
              <p style="margin:0 0 2px;font-size:12px;font-weight:600;color:#4b5563;">GTI Toolio &bull; Gulbahar Tobacco International</p>
              <p style="margin:0;font-size:11px;line-height:1.5;color:#9ca3af;">
                This is an automated message. Please do not reply directly to this email.
              </p>
            </td>
          </tr>
        </table>
      </td>
    </tr>
  </table>
</div>"#
    )
}

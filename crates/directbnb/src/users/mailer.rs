use serde::Serialize;
use tracing::info;

/// Message handed to a `Mailer`; `html_body` is sent as an alternative part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Mailer that records outgoing messages in the log stream.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Mailer for LogMailer {
    fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        info!(
            from = %self.from,
            to = ?email.to,
            subject = %email.subject,
            has_html = email.html_body.is_some(),
            "email dispatched"
        );
        Ok(())
    }
}

pub fn verification_email(first_name: &str, to: &str, verify_url: &str) -> OutgoingEmail {
    let text_body = format!(
        "Hi {first_name},\n\n\
         Please verify your email address to activate your DirectBnB portal:\n\
         {verify_url}\n\n\
         If you did not request this email you can ignore it.\n"
    );
    let html_body = format!(
        "<p>Hi {},</p>\
         <p>Please verify your email address to activate your DirectBnB portal.</p>\
         <p><a href=\"{verify_url}\">Verify email</a></p>",
        escape_html(first_name)
    );
    OutgoingEmail {
        to: vec![to.to_string()],
        subject: "Verify your DirectBnB email address".to_string(),
        text_body,
        html_body: Some(html_body),
    }
}

/// Minimal escaping for user supplied text interpolated into HTML bodies.
pub(crate) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

//! Ticket delivery.
//!
//! Issuance hands the finished registration, its event and batch, and the
//! rendered QR image to a [`TicketMailer`]. Delivery is best effort: the caller
//! logs a failure and moves on.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{info, warn};

use super::qr::ticket_qr_svg;
use crate::config::SmtpConfig;
use crate::models::{Batch, Event, Registration};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("QR encoding failed: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("invalid address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("SMTP error: {0}")]
    Transport(String),
}

/// Everything a rendered ticket needs.
#[derive(Debug, Clone)]
pub struct TicketEnvelope {
    pub registration: Registration,
    pub event: Event,
    pub batch: Option<Batch>,
    pub qr_svg: String,
    pub download_url: String,
}

impl TicketEnvelope {
    pub fn build(
        registration: Registration,
        event: Event,
        batch: Option<Batch>,
        app_url: &str,
    ) -> Result<Self, DeliveryError> {
        let qr_svg = ticket_qr_svg(&registration.ticket_id)?;
        let download_url = format!(
            "{}/api/tickets/{}/qr",
            app_url.trim_end_matches('/'),
            registration.ticket_id
        );
        Ok(Self {
            registration,
            event,
            batch,
            qr_svg,
            download_url,
        })
    }

    pub fn batch_name(&self) -> &str {
        self.batch.as_ref().map_or("General", |b| b.name.as_str())
    }

    pub fn subject(&self) -> String {
        format!("Your Ticket for {} - TicketLelo", self.event.name)
    }

    fn html_body(&self) -> String {
        let reg = &self.registration;
        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{subject}</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #374151;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #111827;">Hi {name}!</h2>
    <p>Thank you for registering for <strong>{event}</strong>. Your ticket is confirmed and
       its QR code is attached to this email.</p>
    <table style="width: 100%; border-collapse: collapse;">
      <tr><td><strong>Ticket ID:</strong></td><td>{ticket_id}</td></tr>
      <tr><td><strong>Event:</strong></td><td>{event}</td></tr>
      <tr><td><strong>Date:</strong></td><td>{date}</td></tr>
      <tr><td><strong>Location:</strong></td><td>{location}</td></tr>
      <tr><td><strong>Batch:</strong></td><td>{batch}</td></tr>
    </table>
    <p>Present the QR code at the entry gate. You can also
       <a href="{download_url}">download it here</a>.</p>
    <p style="color: #6b7280; font-size: 12px;">This is an automated email. Please do not reply.</p>
  </div>
</body>
</html>"#,
            subject = escape_html(&self.subject()),
            name = escape_html(&reg.full_name),
            event = escape_html(&self.event.name),
            ticket_id = escape_html(reg.ticket_id.as_str()),
            date = self.event.date.format("%A, %B %-d, %Y"),
            location = escape_html(&self.event.location),
            batch = escape_html(self.batch_name()),
            download_url = escape_html(&self.download_url),
        )
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[async_trait]
pub trait TicketMailer: Send + Sync {
    async fn send_ticket(&self, envelope: &TicketEnvelope) -> Result<(), DeliveryError>;
}

/// Sends tickets over SMTP with the QR code attached as SVG.
pub struct SmtpTicketMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpTicketMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, DeliveryError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| DeliveryError::Transport(format!("SMTP relay error: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: format!("{} <{}>", config.from_name, config.from_email),
        })
    }

    fn compose(&self, envelope: &TicketEnvelope) -> Result<Message, DeliveryError> {
        let to = &envelope.registration.email;
        let svg_type = ContentType::parse("image/svg+xml")
            .map_err(|e| DeliveryError::Message(e.to_string()))?;

        Message::builder()
            .from(self.from.parse().map_err(|e| DeliveryError::Address {
                address: self.from.clone(),
                reason: format!("{e}"),
            })?)
            .to(to.parse().map_err(|e| DeliveryError::Address {
                address: to.clone(),
                reason: format!("{e}"),
            })?)
            .subject(envelope.subject())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(envelope.html_body()))
                    .singlepart(
                        Attachment::new(format!("ticket-{}.svg", envelope.registration.ticket_id))
                            .body(envelope.qr_svg.clone(), svg_type),
                    ),
            )
            .map_err(|e| DeliveryError::Message(e.to_string()))
    }
}

#[async_trait]
impl TicketMailer for SmtpTicketMailer {
    async fn send_ticket(&self, envelope: &TicketEnvelope) -> Result<(), DeliveryError> {
        let message = self.compose(envelope)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        info!(
            ticket_id = %envelope.registration.ticket_id,
            "Ticket email sent"
        );
        Ok(())
    }
}

/// Used when no SMTP relay is configured: records what would have been sent.
#[derive(Debug, Default, Clone)]
pub struct LogTicketMailer;

#[async_trait]
impl TicketMailer for LogTicketMailer {
    async fn send_ticket(&self, envelope: &TicketEnvelope) -> Result<(), DeliveryError> {
        info!(
            ticket_id = %envelope.registration.ticket_id,
            to = %envelope.registration.email,
            subject = %envelope.subject(),
            download_url = %envelope.download_url,
            "SMTP not configured, ticket email not sent"
        );
        Ok(())
    }
}

/// Builds and sends a ticket, logging instead of returning on failure.
pub async fn deliver_best_effort(
    mailer: Arc<dyn TicketMailer>,
    registration: Registration,
    event: Event,
    batch: Option<Batch>,
    app_url: String,
) {
    let ticket_id = registration.ticket_id.clone();
    let result = match TicketEnvelope::build(registration, event, batch, &app_url) {
        Ok(envelope) => mailer.send_ticket(&envelope).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        warn!(ticket_id = %ticket_id, error = %e, "Ticket delivery failed");
    }
}

//! Transactional mail: booking confirmations over an SMTP relay (Lettre).

use std::sync::Arc;

use async_trait::async_trait;
use html_escape::encode_text;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::MailSettings;
use crate::models::{Booking, Hotel, Room};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("smtp error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<(), MailError>;
}

/// Mailer backed by an authenticated SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: String,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            sender: settings.sender.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        let from = self.sender.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
            address: self.sender.clone(),
            reason: e.to_string(),
        })?;
        let to = mail.to.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
            address: mail.to.clone(),
            reason: e.to_string(),
        })?;
        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_HTML)
            .body(mail.html)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Send on a background task. The outcome is only logged.
pub fn dispatch(mailer: Arc<dyn Mailer>, mail: Mail) -> JoinHandle<()> {
    tokio::spawn(async move {
        let to = mail.to.clone();
        match mailer.send(mail).await {
            Ok(()) => info!(%to, "confirmation mail sent"),
            Err(e) => warn!(%to, error = %e, "confirmation mail failed"),
        }
    })
}

/// Confirmation for a freshly created booking. Hotel and room text is
/// owner-supplied and goes into the HTML escaped.
pub fn booking_confirmation(to: &str, booking: &Booking, room: &Room, hotel: &Hotel, currency: &str) -> Mail {
    let html = format!(
        "<h2>Your Booking Details</h2>\
         <p>Dear Guest,</p>\
         <p>Thank you for your booking! Here are your details:</p>\
         <ul>\
         <li><strong>Booking ID:</strong> {id}</li>\
         <li><strong>Hotel Name:</strong> {hotel_name}</li>\
         <li><strong>Location:</strong> {address}</li>\
         <li><strong>Room Type:</strong> {room_type}</li>\
         <li><strong>Check-In:</strong> {check_in}</li>\
         <li><strong>Check-Out:</strong> {check_out}</li>\
         <li><strong>Guests:</strong> {guests}</li>\
         <li><strong>Booking Amount:</strong> {currency}{total:.2}</li>\
         </ul>\
         <p>We look forward to welcoming you!</p>",
        id = booking.id,
        hotel_name = encode_text(&hotel.name),
        address = encode_text(&hotel.address),
        room_type = encode_text(&room.room_type),
        check_in = booking.check_in_date.format("%a %b %e %Y"),
        check_out = booking.check_out_date.format("%a %b %e %Y"),
        guests = booking.guests,
        total = booking.total_price,
        currency = encode_text(currency),
    );
    Mail {
        to: to.to_string(),
        subject: "Hotel Booking Details".to_string(),
        html,
    }
}

//! Outbound notifications for lending events.
//!
//! Delivery goes through the [`Notifier`] capability. [`Notifications`]
//! formats one message per lifecycle event and never lets a delivery
//! failure reach the caller: the state change it follows has already
//! been committed.

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::{
        book::Book,
        book_request::BookRequest,
        borrow::BorrowRecord,
        extension::ExtensionRequest,
        fine::Fine,
        hold::BookHold,
        room::{Room, RoomBooking},
        user::User,
    },
};

/// Sends one plain-text message to one address
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// SMTP delivery
#[derive(Clone)]
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> AppResult<Message> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("University Library");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(format!(
                                r#"<html><body><p>{}</p></body></html>"#,
                                body.replace('\n', "<br>")
                            )),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn transport(&self) -> AppResult<SmtpTransport> {
        let builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let email = self.build_message(to, subject, body)?;
        let mailer = self.transport()?;

        // lettre's SMTP transport is blocking
        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

/// Writes messages to the log instead of sending them
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        tracing::info!(to, subject, body, "Notification");
        Ok(())
    }
}

/// One method per lifecycle event
#[derive(Clone)]
pub struct Notifications {
    notifier: Arc<dyn Notifier>,
}

impl Notifications {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    async fn deliver(&self, to: &str, subject: &str, body: String) {
        if let Err(e) = self.notifier.send(to, subject, &body).await {
            tracing::warn!(to, subject, error = %e, "Failed to send notification");
        }
    }

    pub async fn borrow_confirmation(&self, user: &User, book: &Book, record: &BorrowRecord) {
        let body = format!(
            "Hello {},\n\nYou have borrowed \"{}\" by {}.\nPlease return it by {}.",
            user.name, book.title, book.author, record.due_date
        );
        self.deliver(&user.email, "Borrow confirmation", body).await;
    }

    pub async fn borrow_receipt(&self, user: &User, book: &Book, record: &BorrowRecord) {
        let body = format!(
            "Receipt #{}\n\nTitle: {}\nAuthor: {}\nBorrowed on: {}\nDue on: {}",
            record.id, book.title, book.author, record.borrow_date, record.due_date
        );
        self.deliver(&user.email, "Borrow receipt", body).await;
    }

    pub async fn overdue(&self, user: &User, book: &Book, record: &BorrowRecord, fine: &Fine) {
        let body = format!(
            "Hello {},\n\n\"{}\" was due on {} and is now overdue.\nA fine of {} has been added to your account.",
            user.name, book.title, record.due_date, fine.amount
        );
        self.deliver(&user.email, "Overdue book", body).await;
    }

    pub async fn lost(&self, user: &User, book: &Book, record: &BorrowRecord, fine: &Fine) {
        let body = format!(
            "Hello {},\n\n\"{}\" (due {}) has been declared lost.\nA fine of {} has been added to your account.",
            user.name, book.title, record.due_date, fine.amount
        );
        self.deliver(&user.email, "Book declared lost", body).await;
    }

    pub async fn fine_paid(&self, user: &User, fine: &Fine) {
        let body = format!(
            "Hello {},\n\nYour payment of {} for fine #{} has been recorded.",
            user.name, fine.amount, fine.id
        );
        self.deliver(&user.email, "Fine paid", body).await;
    }

    pub async fn fine_waived(&self, user: &User, fine: &Fine) {
        let body = format!(
            "Hello {},\n\nFine #{} of {} has been waived.\n{}",
            user.name,
            fine.id,
            fine.amount,
            fine.description.as_deref().unwrap_or_default()
        );
        self.deliver(&user.email, "Fine waived", body).await;
    }

    pub async fn damage_fine(&self, user: &User, fine: &Fine) {
        let body = format!(
            "Hello {},\n\nA damage fine of {} has been added to your account.\n{}",
            user.name,
            fine.amount,
            fine.description.as_deref().unwrap_or_default()
        );
        self.deliver(&user.email, "Damage fine", body).await;
    }

    pub async fn hold_placed(&self, user: &User, book: &Book, position: Option<i64>) {
        let position = position.map(|p| format!(" You are number {} in the queue.", p));
        let body = format!(
            "Hello {},\n\nYour hold on \"{}\" has been placed.{}",
            user.name,
            book.title,
            position.unwrap_or_default()
        );
        self.deliver(&user.email, "Hold placed", body).await;
    }

    pub async fn hold_cancelled(&self, user: &User, book: &Book) {
        let body = format!(
            "Hello {},\n\nYour hold on \"{}\" has been cancelled.",
            user.name, book.title
        );
        self.deliver(&user.email, "Hold cancelled", body).await;
    }

    pub async fn hold_ready(&self, user: &User, book: &Book, hold: &BookHold) {
        let deadline = hold
            .expiry_date
            .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_default();
        let body = format!(
            "Hello {},\n\n\"{}\" is available for pickup.\nPlease collect it before {}.",
            user.name, book.title, deadline
        );
        self.deliver(&user.email, "Book available for pickup", body).await;
    }

    pub async fn hold_expired(&self, user: &User, book: &Book) {
        let body = format!(
            "Hello {},\n\nYour hold on \"{}\" expired because it was not picked up in time.",
            user.name, book.title
        );
        self.deliver(&user.email, "Hold expired", body).await;
    }

    pub async fn extension_requested(&self, admin: &User, requester: &User, request: &ExtensionRequest) {
        let body = format!(
            "{} requested to move the due date of borrow #{} from {} to {}.\nReason: {}",
            requester.name,
            request.borrow_record_id,
            request.current_due_date,
            request.requested_due_date,
            request.reason.as_deref().unwrap_or("-")
        );
        self.deliver(&admin.email, "New extension request", body).await;
    }

    pub async fn extension_decided(&self, user: &User, request: &ExtensionRequest) {
        let body = format!(
            "Hello {},\n\nYour extension request for borrow #{} was {}.{}",
            user.name,
            request.borrow_record_id,
            request.status.as_str().to_lowercase(),
            request
                .admin_note
                .as_deref()
                .map(|n| format!("\nNote: {}", n))
                .unwrap_or_default()
        );
        self.deliver(&user.email, "Extension request decided", body).await;
    }

    pub async fn account_decided(&self, user: &User) {
        let body = format!(
            "Hello {},\n\nYour library account is now {}.",
            user.name,
            user.status.as_str().to_lowercase()
        );
        self.deliver(&user.email, "Library account update", body).await;
    }

    pub async fn book_request_decided(&self, user: &User, request: &BookRequest) {
        let body = format!(
            "Hello {},\n\nYour request for \"{}\" is now {}.{}",
            user.name,
            request.title,
            request.status.as_str().to_lowercase(),
            request
                .admin_note
                .as_deref()
                .map(|n| format!("\nNote: {}", n))
                .unwrap_or_default()
        );
        self.deliver(&user.email, "Book request update", body).await;
    }

    pub async fn room_booked(&self, user: &User, room: &Room, booking: &RoomBooking) {
        let body = format!(
            "Hello {},\n\n{} is booked for you from {} to {}.",
            user.name,
            room.name,
            booking.start_time.format("%Y-%m-%d %H:%M"),
            booking.end_time.format("%Y-%m-%d %H:%M")
        );
        self.deliver(&user.email, "Room booking confirmed", body).await;
    }

    pub async fn room_booking_cancelled(&self, user: &User, room: &Room, booking: &RoomBooking) {
        let body = format!(
            "Hello {},\n\nYour booking of {} on {} has been cancelled.",
            user.name,
            room.name,
            booking.start_time.format("%Y-%m-%d %H:%M")
        );
        self.deliver(&user.email, "Room booking cancelled", body).await;
    }
}

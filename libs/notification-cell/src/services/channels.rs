use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::{AvailabilitySlot, Contact, ContactChannel};

use crate::models::{DeliveryResult, NotificationError, RenderedMessage};

/// SMS digests are length-capped; anything longer is cut at this many chars.
pub const SMS_DIGEST_MAX_CHARS: usize = 320;

/// Outbound channel seam. Adapters render the same slot list into a
/// channel-appropriate message and report delivery without blocking the
/// caller beyond their own latency. Real gateways live behind these
/// interfaces and are out of scope; the built-in adapters log and report
/// success so the workflow can be exercised end to end.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn channel(&self) -> ContactChannel;

    fn render(&self, contact: &Contact, slots: &[AvailabilitySlot], token: &str)
        -> RenderedMessage;

    async fn send(
        &self,
        contact: &Contact,
        message: &RenderedMessage,
    ) -> Result<DeliveryResult, NotificationError>;
}

fn format_slot(slot: &AvailabilitySlot) -> String {
    format!(
        "{} ({} min)",
        slot.start_time.format("%a %d %b %H:%M"),
        slot.duration_minutes
    )
}

fn short_slot(slot: &AvailabilitySlot) -> String {
    slot.start_time.format("%d %b %H:%M").to_string()
}

fn first_name(contact: &Contact) -> &str {
    contact
        .full_name
        .split_whitespace()
        .next()
        .unwrap_or(&contact.full_name)
}

// ==============================================================================
// EMAIL
// ==============================================================================

pub struct EmailChannel;

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn channel(&self) -> ContactChannel {
        ContactChannel::Email
    }

    fn render(
        &self,
        contact: &Contact,
        slots: &[AvailabilitySlot],
        token: &str,
    ) -> RenderedMessage {
        let mut body = format!(
            "Hello {},\n\nWe received your request to reschedule your appointment. \
             The following times are available:\n\n",
            contact.full_name
        );
        for (index, slot) in slots.iter().enumerate() {
            body.push_str(&format!("  {}. {}\n", index + 1, format_slot(slot)));
        }
        body.push_str(&format!(
            "\nReply with the number of the time that works for you, or let us \
             know if none of these do.\n\nConfirmation code: {}\n",
            token
        ));

        RenderedMessage {
            subject: Some("New appointment times available".to_string()),
            body,
        }
    }

    async fn send(
        &self,
        contact: &Contact,
        message: &RenderedMessage,
    ) -> Result<DeliveryResult, NotificationError> {
        let recipient = contact
            .email
            .as_deref()
            .ok_or_else(|| NotificationError::DeliveryFailed("contact has no email".into()))?;

        info!(%recipient, subject = ?message.subject, "dispatching email notification");
        Ok(DeliveryResult {
            delivered: true,
            external_id: Some(format!("email-{}", Uuid::new_v4())),
        })
    }
}

// ==============================================================================
// SMS
// ==============================================================================

pub struct SmsChannel;

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn channel(&self) -> ContactChannel {
        ContactChannel::Sms
    }

    fn render(
        &self,
        contact: &Contact,
        slots: &[AvailabilitySlot],
        _token: &str,
    ) -> RenderedMessage {
        let mut body = format!(
            "Hi {}, reschedule options: ",
            first_name(contact)
        );
        for (index, slot) in slots.iter().enumerate() {
            body.push_str(&format!("{}) {} ", index + 1, short_slot(slot)));
        }
        body.push_str("Reply with a number, or 0 if none work.");

        let digest: String = body.chars().take(SMS_DIGEST_MAX_CHARS).collect();
        RenderedMessage {
            subject: None,
            body: digest,
        }
    }

    async fn send(
        &self,
        contact: &Contact,
        message: &RenderedMessage,
    ) -> Result<DeliveryResult, NotificationError> {
        let recipient = contact
            .phone
            .as_deref()
            .ok_or_else(|| NotificationError::DeliveryFailed("contact has no phone".into()))?;

        debug!(%recipient, chars = message.body.chars().count(), "dispatching sms notification");
        Ok(DeliveryResult {
            delivered: true,
            external_id: Some(format!("sms-{}", Uuid::new_v4())),
        })
    }
}

// ==============================================================================
// VOICE
// ==============================================================================

pub struct VoiceChannel;

#[async_trait]
impl NotificationChannel for VoiceChannel {
    fn channel(&self) -> ContactChannel {
        ContactChannel::Voice
    }

    fn render(
        &self,
        contact: &Contact,
        slots: &[AvailabilitySlot],
        _token: &str,
    ) -> RenderedMessage {
        let mut body = format!(
            "GREETING: Hello {}. This is a call about rescheduling your appointment.\n",
            first_name(contact)
        );
        body.push_str("MENU: I have some new times available. Please choose one.\n");
        for (index, slot) in slots.iter().enumerate() {
            body.push_str(&format!(
                "OPTION {}: {}. Press {}.\n",
                index + 1,
                format_slot(slot),
                index + 1
            ));
        }
        body.push_str("FALLBACK: Press zero if none of these times work for you.\n");

        RenderedMessage {
            subject: None,
            body,
        }
    }

    async fn send(
        &self,
        contact: &Contact,
        message: &RenderedMessage,
    ) -> Result<DeliveryResult, NotificationError> {
        let recipient = contact
            .phone
            .as_deref()
            .ok_or_else(|| NotificationError::DeliveryFailed("contact has no phone".into()))?;

        info!(%recipient, lines = message.body.lines().count(), "dispatching voice script");
        Ok(DeliveryResult {
            delivered: true,
            external_id: Some(format!("voice-{}", Uuid::new_v4())),
        })
    }
}

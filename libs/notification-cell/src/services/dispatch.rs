use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use shared_models::{Contact, ContactChannel, ReschedulingRequest};

use crate::models::{
    NotificationError, NotificationReceipt, ResponseTokenBinding, DEFAULT_TOKEN_TTL_HOURS,
    FOLLOW_UP_TOKEN_TTL_HOURS,
};
use crate::services::channels::{EmailChannel, NotificationChannel, SmsChannel, VoiceChannel};
use crate::services::tokens::ResponseTokenService;

/// Fans a rescheduling notification out to the contact's preferred channel,
/// issuing the response token that ties the customer's reply back to the
/// request.
pub struct NotificationService {
    tokens: Arc<ResponseTokenService>,
    channels: HashMap<ContactChannel, Arc<dyn NotificationChannel>>,
}

impl NotificationService {
    pub fn new(tokens: Arc<ResponseTokenService>) -> Self {
        Self {
            tokens,
            channels: HashMap::new(),
        }
    }

    /// Wires up the built-in email/SMS/voice adapters.
    pub fn with_default_channels(tokens: Arc<ResponseTokenService>) -> Self {
        let mut service = Self::new(tokens);
        service.register(Arc::new(EmailChannel));
        service.register(Arc::new(SmsChannel));
        service.register(Arc::new(VoiceChannel));
        service
    }

    pub fn register(&mut self, channel: Arc<dyn NotificationChannel>) {
        self.channels.insert(channel.channel(), channel);
    }

    pub fn token_service(&self) -> Arc<ResponseTokenService> {
        Arc::clone(&self.tokens)
    }

    /// Issues a token for the request's slot snapshot and dispatches through
    /// the contact's preferred channel, or an explicit override when the
    /// caller's contact strategy picked a different one. On a failed dispatch
    /// the token is revoked so no dangling secret stays redeemable; the
    /// workflow retries through the follow-up path.
    pub async fn notify_slots(
        &self,
        contact: &Contact,
        request: &ReschedulingRequest,
        channel: Option<ContactChannel>,
        follow_up: bool,
    ) -> Result<NotificationReceipt, NotificationError> {
        let channel = channel.unwrap_or(contact.preferred_channel);
        let adapter = self
            .channels
            .get(&channel)
            .cloned()
            .ok_or(NotificationError::ChannelUnavailable(channel))?;

        let ttl = if follow_up {
            Duration::hours(FOLLOW_UP_TOKEN_TTL_HOURS)
        } else {
            Duration::hours(DEFAULT_TOKEN_TTL_HOURS)
        };

        let binding = ResponseTokenBinding {
            rescheduling_request_id: request.id,
            tenant_id: request.tenant_id,
            contact_id: request.contact_id,
            available_slots: request.available_slots.clone(),
        };

        let token = self.tokens.issue(binding, ttl).await;
        let message = adapter.render(contact, &request.available_slots, &token);

        match adapter.send(contact, &message).await {
            Ok(delivery) if delivery.delivered => {
                info!(
                    request_id = %request.id,
                    channel = %channel,
                    follow_up,
                    "reschedule notification dispatched"
                );
                Ok(NotificationReceipt {
                    token,
                    channel,
                    delivery,
                })
            }
            Ok(delivery) => {
                warn!(
                    request_id = %request.id,
                    channel = %channel,
                    "channel reported failed delivery"
                );
                self.tokens.revoke(&token).await;
                Ok(NotificationReceipt {
                    token,
                    channel,
                    delivery,
                })
            }
            Err(err) => {
                warn!(
                    request_id = %request.id,
                    channel = %channel,
                    error = %err,
                    "notification dispatch failed"
                );
                self.tokens.revoke(&token).await;
                Err(err)
            }
        }
    }
}

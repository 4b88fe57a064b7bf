use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{NotificationError, ResponseTokenBinding, TokenRedemption};

const TOKEN_BYTES: usize = 32;

struct TokenEntry {
    binding: ResponseTokenBinding,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Keyed store binding short-lived secrets to their rescheduling context.
/// Process-local by design: entries do not survive a restart, and a
/// background sweep bounds growth. At most one token is live per
/// rescheduling request; issuing a new one revokes the old.
pub struct ResponseTokenService {
    entries: RwLock<HashMap<String, TokenEntry>>,
}

impl ResponseTokenService {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Issues a fresh single-use token for the binding, revoking any token
    /// still outstanding for the same request.
    pub async fn issue(&self, binding: ResponseTokenBinding, ttl: Duration) -> String {
        let token = generate_token();
        let now = Utc::now();
        let request_id = binding.rescheduling_request_id;

        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.binding.rescheduling_request_id != request_id);
        entries.insert(
            token.clone(),
            TokenEntry {
                binding,
                issued_at: now,
                expires_at: now + ttl,
            },
        );

        debug!(%request_id, expires_at = %(now + ttl), "issued response token");
        token
    }

    /// Validates and consumes a token. Unknown and expired tokens both come
    /// back as `InvalidToken`; expired entries are evicted on contact. An
    /// out-of-range slot index leaves the token live so the customer can try
    /// again, and a `None` selection records a decline.
    pub async fn redeem(
        &self,
        token: &str,
        selection: Option<usize>,
    ) -> Result<TokenRedemption, NotificationError> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;

        let state = entries
            .get(token)
            .map(|entry| (entry.expires_at <= now, entry.binding.available_slots.len()));

        match state {
            None => Err(NotificationError::InvalidToken),
            Some((true, _)) => {
                entries.remove(token);
                warn!("expired response token presented");
                Err(NotificationError::InvalidToken)
            }
            Some((false, available)) => {
                if let Some(index) = selection {
                    if index >= available {
                        return Err(NotificationError::InvalidSelection { index, available });
                    }
                }

                let entry = entries
                    .remove(token)
                    .ok_or(NotificationError::InvalidToken)?;

                let selected_slot =
                    selection.map(|index| entry.binding.available_slots[index].clone());

                debug!(
                    request_id = %entry.binding.rescheduling_request_id,
                    declined = selection.is_none(),
                    "response token redeemed"
                );

                Ok(TokenRedemption {
                    rescheduling_request_id: entry.binding.rescheduling_request_id,
                    tenant_id: entry.binding.tenant_id,
                    contact_id: entry.binding.contact_id,
                    selected_slot,
                    declined: selection.is_none(),
                    redeemed_at: now,
                })
            }
        }
    }

    /// Drops a token that should no longer be honored, e.g. after a failed
    /// dispatch. Missing tokens are ignored.
    pub async fn revoke(&self, token: &str) {
        self.entries.write().await.remove(token);
    }

    /// Evicts every entry past its expiry, used or not. Returns the count.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "evicted expired response tokens");
        }
        evicted
    }

    pub async fn outstanding(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Oldest outstanding issue time, for operational visibility.
    pub async fn oldest_issued_at(&self) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .await
            .values()
            .map(|entry| entry.issued_at)
            .min()
    }

    /// The request a token is bound to, without consuming it.
    pub async fn peek_request(&self, token: &str) -> Option<(Uuid, Uuid)> {
        self.entries.read().await.get(token).map(|entry| {
            (
                entry.binding.rescheduling_request_id,
                entry.binding.tenant_id,
            )
        })
    }
}

impl Default for ResponseTokenService {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

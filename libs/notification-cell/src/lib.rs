pub mod models;
pub mod services;

pub use models::{
    DeliveryResult, NotificationError, NotificationReceipt, RenderedMessage, ResponseTokenBinding,
    TokenRedemption, DEFAULT_TOKEN_TTL_HOURS, FOLLOW_UP_TOKEN_TTL_HOURS,
};
pub use services::channels::{EmailChannel, NotificationChannel, SmsChannel, VoiceChannel};
pub use services::dispatch::NotificationService;
pub use services::tokens::ResponseTokenService;

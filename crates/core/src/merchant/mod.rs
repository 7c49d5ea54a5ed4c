//! Merchant protocol: request signatures, order tokens, and webhooks.

pub mod notify;
pub mod signature;
pub mod submit;
pub mod token;

pub use notify::{
    NotificationInput, PAY_TYPE_EPAY, TRADE_SUCCESS, is_delivery_success, is_loopback,
    notification_params, notification_url,
};
pub use submit::SubmitRequest;
pub use token::OrderTokenCipher;

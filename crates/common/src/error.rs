//! Error types for the setuid server.
//!
//! Only unexpected failures live here. Policy outcomes of the setuid pipeline
//! (bad bidder, opt-out, legal blocks) are modelled by
//! [`crate::setuid::outcome::Rejection`] and never become a [`SetuidError`].

use derive_more::{Display, Error};
use http::StatusCode;

#[derive(Debug, Display, Error)]
pub enum SetuidError {
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    #[display("Account lookup failed: {message}")]
    AccountLookup { message: String },

    #[display("Privacy context resolution failed: {message}")]
    PrivacyResolution { message: String },

    #[display("Vendor consent query failed: {message}")]
    VendorConsent { message: String },

    #[display("Timeout exceeded: {message}")]
    Timeout { message: String },

    #[display("Invalid UTF-8: {message}")]
    InvalidUtf8 { message: String },

    #[display("Cookie decode error: {message}")]
    CookieDecode { message: String },
}

/// Maps an error to the HTTP response the edge should return for it.
pub trait IntoHttpResponse {
    /// Status code to return to the client.
    fn status_code(&self) -> StatusCode;

    /// Message safe to show to the client.
    fn user_message(&self) -> String;
}

impl IntoHttpResponse for SetuidError {
    fn status_code(&self) -> StatusCode {
        match self {
            SetuidError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn user_message(&self) -> String {
        match self {
            SetuidError::Configuration { .. } => "Service misconfigured".to_string(),
            other => other.to_string(),
        }
    }
}

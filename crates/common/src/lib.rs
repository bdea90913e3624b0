//! Core of the setuid server.
//!
//! This crate implements the user sync (`/setuid`) endpoint independent of
//! any edge platform. The Fastly binary adapts its native request type through
//! [`http_wrapper::RequestWrapper`] and converts the returned
//! [`http::Response`].
//!
//! # Modules
//!
//! - [`account`]: Host accounts and the store they are resolved from
//! - [`activity`]: Per-account activity permissions
//! - [`analytics`]: Setuid analytics events and reporters
//! - [`consent`]: TCF v2 consent string decoding
//! - [`constants`]: Cookie and query parameter names
//! - [`cookies`]: Cookie parsing and `Set-Cookie` generation
//! - [`error`]: Error types and their HTTP mapping
//! - [`gdpr`]: GDPR scope and vendor consent resolution
//! - [`http_wrapper`]: Platform-neutral request abstraction
//! - [`metrics`]: User sync counters
//! - [`settings`]: Configuration management and validation
//! - [`setuid`]: The setuid authorization and response pipeline
//! - [`test_support`]: Testing utilities and fakes
//! - [`timeout`]: Per-request deadline
//! - [`uids`]: The `uids` sync cookie

pub mod account;
pub mod activity;
pub mod analytics;
pub mod consent;
pub mod constants;
pub mod cookies;
pub mod error;
pub mod gdpr;
pub mod http_wrapper;
pub mod metrics;
pub mod settings;
pub mod setuid;
pub mod timeout;
pub mod uids;

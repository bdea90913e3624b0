//! The `uids` sync cookie: a per-browser map of cookie family → bidder uid.
//!
//! The cookie value is URL-safe base64 of a JSON document:
//!
//! ```json
//! {"tempUIDs": {"knownBidder": {"uid": "u123", "expires": "2026-01-01T00:00:00Z"}}, "optout": false}
//! ```

use std::collections::BTreeMap;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};

use crate::constants::UIDS_COOKIE_NAME;
use crate::cookies::{create_uids_cookie, handle_request_cookies};
use crate::error::SetuidError;
use crate::http_wrapper::RequestWrapper;
use crate::settings::CookieSettings;

/// Audience Network calls setuid with uid "0" for logged-out users.
const AUDIENCE_NETWORK_FAMILY: &str = "audienceNetwork";
const AUDIENCE_NETWORK_SENTINEL_UID: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UidWithExpiry {
    pub uid: String,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Uids {
    #[serde(rename = "tempUIDs", default)]
    uids: BTreeMap<String, UidWithExpiry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    optout: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UidsCookie {
    uids: Uids,
    host_opt_out: bool,
}

impl UidsCookie {
    /// Decode a raw `uids` cookie value.
    ///
    /// # Errors
    ///
    /// Returns [`SetuidError::CookieDecode`] when the value is not base64 JSON.
    pub fn decode(value: &str) -> Result<Self, Report<SetuidError>> {
        let trimmed = value.trim().trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(trimmed)
            .or_else(|_| STANDARD.decode(value.trim()))
            .change_context(SetuidError::CookieDecode {
                message: "uids cookie is not base64".to_string(),
            })?;

        let uids: Uids =
            serde_json::from_slice(&bytes).change_context(SetuidError::CookieDecode {
                message: "uids cookie is not valid JSON".to_string(),
            })?;

        Ok(Self {
            uids,
            host_opt_out: false,
        })
    }

    #[must_use]
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_string(&self.uids).unwrap_or_default())
    }

    /// False once the user opted out, either in the cookie itself or through
    /// the host opt-out cookie.
    #[must_use]
    pub fn allows_sync(&self) -> bool {
        !self.host_opt_out && self.uids.optout != Some(true)
    }

    #[must_use]
    pub fn uid_from(&self, family: &str) -> Option<&str> {
        self.uids.uids.get(family).map(|entry| entry.uid.as_str())
    }

    #[must_use]
    pub fn with_opt_out(mut self, optout: bool) -> Self {
        self.uids.optout = Some(optout);
        self
    }

    #[must_use]
    pub fn with_uid(mut self, family: &str, uid: &str, expires: DateTime<Utc>) -> Self {
        self.uids.uids.insert(
            family.to_string(),
            UidWithExpiry {
                uid: uid.to_string(),
                expires,
            },
        );
        self
    }

    fn without_uid(mut self, family: &str) -> Self {
        self.uids.uids.remove(family);
        self
    }

    fn without_expired(mut self, now: DateTime<Utc>) -> Self {
        self.uids.uids.retain(|_, entry| entry.expires > now);
        self
    }
}

/// Outcome of merging a bidder uid into the cookie.
///
/// `applied` only drives the sync-set metric; the cookie is sent back either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieUpdateResult {
    pub cookie: UidsCookie,
    pub applied: bool,
}

impl CookieUpdateResult {
    fn updated(cookie: UidsCookie) -> Self {
        Self {
            cookie,
            applied: true,
        }
    }

    fn unaltered(cookie: UidsCookie) -> Self {
        Self {
            cookie,
            applied: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UidsCookieService {
    settings: CookieSettings,
}

impl UidsCookieService {
    #[must_use]
    pub fn new(settings: CookieSettings) -> Self {
        Self { settings }
    }

    /// Read the `uids` cookie from the request.
    ///
    /// Missing or undecodable cookies yield an empty cookie that allows sync.
    pub fn parse_from_request<T: RequestWrapper>(&self, req: &T) -> UidsCookie {
        let Some(jar) = handle_request_cookies(req) else {
            return UidsCookie::default();
        };

        let mut cookie = match jar.get(UIDS_COOKIE_NAME) {
            Some(raw) => UidsCookie::decode(raw.value()).unwrap_or_else(|report| {
                log::debug!("Ignoring unreadable uids cookie: {report:?}");
                UidsCookie::default()
            }),
            None => UidsCookie::default(),
        };

        if let (Some(name), Some(value)) = (
            &self.settings.opt_out_cookie_name,
            &self.settings.opt_out_cookie_value,
        ) {
            cookie.host_opt_out = jar.get(name).is_some_and(|c| c.value() == value);
        }

        cookie.without_expired(Utc::now())
    }

    /// Merge `(family, uid)` into `cookie`.
    ///
    /// A blank or absent uid removes the family's mapping and is reported as
    /// not applied. The opt-out flag is carried over untouched.
    pub fn update(&self, cookie: &UidsCookie, family: &str, uid: Option<&str>) -> CookieUpdateResult {
        let now = Utc::now();
        let initial = cookie.clone().without_expired(now);

        let uid = match uid.map(str::trim) {
            Some(uid) if !uid.is_empty() => uid,
            _ => return CookieUpdateResult::unaltered(initial.without_uid(family)),
        };

        if family == AUDIENCE_NETWORK_FAMILY && uid == AUDIENCE_NETWORK_SENTINEL_UID {
            log::debug!("Refusing sentinel uid for {family}");
            return CookieUpdateResult::unaltered(initial);
        }

        let expires = now + Duration::days(i64::from(self.settings.ttl_days));
        let updated = initial.clone().with_uid(family, uid, expires);

        let max_size = self.settings.max_cookie_size_bytes;
        if max_size > 0 && updated.encode().len() > max_size {
            log::debug!("uids cookie would exceed {max_size} bytes, keeping previous state");
            return CookieUpdateResult::unaltered(initial);
        }

        CookieUpdateResult::updated(updated)
    }

    /// `Set-Cookie` header value for `cookie`.
    #[must_use]
    pub fn to_set_cookie(&self, cookie: &UidsCookie) -> String {
        create_uids_cookie(&self.settings, &cookie.encode())
    }
}

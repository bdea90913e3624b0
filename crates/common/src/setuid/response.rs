//! Success response: writes the updated `uids` cookie and answers with a
//! pixel or an empty page.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Response, StatusCode};

use crate::analytics::{AnalyticsReporter, SetuidEvent};
use crate::metrics::Metrics;
use crate::uids::UidsCookieService;

use super::context::SetuidContext;
use super::registry::{UsersyncFormat, UsersyncMethodType};

/// 1x1 transparent PNG.
pub const TRACKING_PIXEL: &[u8] = include_bytes!("../../static/tracking-pixel.png");

/// Pixel when asked for explicitly, or when the bidder syncs by redirect and
/// no blank page was requested.
#[must_use]
pub fn should_respond_with_pixel(
    format: Option<UsersyncFormat>,
    sync_type: Option<UsersyncMethodType>,
) -> bool {
    format == Some(UsersyncFormat::Pixel)
        || (format != Some(UsersyncFormat::Blank)
            && sync_type == Some(UsersyncMethodType::Redirect))
}

pub struct ResponseComposer {
    cookie_service: Arc<UidsCookieService>,
    metrics: Arc<Metrics>,
    analytics: Arc<dyn AnalyticsReporter>,
}

impl ResponseComposer {
    #[must_use]
    pub fn new(
        cookie_service: Arc<UidsCookieService>,
        metrics: Arc<Metrics>,
        analytics: Arc<dyn AnalyticsReporter>,
    ) -> Self {
        Self {
            cookie_service,
            metrics,
            analytics,
        }
    }

    /// Build the 200 response for an authorized request.
    ///
    /// The cookie is always written back, even when the update was refused,
    /// so expired entries are dropped from the browser.
    pub fn compose(
        &self,
        context: &SetuidContext,
        uid: Option<&str>,
        format: Option<UsersyncFormat>,
    ) -> Response<Bytes> {
        let update = self
            .cookie_service
            .update(&context.uids_cookie, &context.bidder, uid);

        let mut response = if should_respond_with_pixel(format, context.sync_type) {
            pixel_response()
        } else {
            blank_response()
        };

        let set_cookie = self.cookie_service.to_set_cookie(&update.cookie);
        match HeaderValue::from_str(&set_cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => log::warn!("Failed to build uids Set-Cookie header: {e}"),
        }

        if update.applied {
            self.metrics.update_user_sync_sets_metric(&context.bidder);
        }

        self.analytics.process_event(
            &SetuidEvent::success(
                StatusCode::OK.as_u16(),
                &context.bidder,
                uid,
                update.applied,
            ),
            Some(&context.privacy.tcf),
        );

        response
    }
}

fn pixel_response() -> Response<Bytes> {
    let mut response = Response::new(Bytes::from_static(TRACKING_PIXEL));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(TRACKING_PIXEL.len()));
    response
}

fn blank_response() -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(0_usize));
    response
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::account::Account;
    use crate::activity::ActivityController;
    use crate::gdpr::PrivacyContext;
    use crate::settings::CookieSettings;
    use crate::metrics::USERSYNC_SETS;
    use crate::test_support::tests::{RecordingAnalytics, RecordingMetrics};
    use crate::timeout::Deadline;
    use crate::uids::UidsCookie;

    use super::*;

    fn composer() -> (ResponseComposer, RecordingMetrics, Arc<RecordingAnalytics>) {
        let recorder = RecordingMetrics::new();
        let analytics = Arc::new(RecordingAnalytics::default());
        let composer = ResponseComposer::new(
            Arc::new(UidsCookieService::new(CookieSettings::default())),
            recorder.metrics(),
            analytics.clone(),
        );
        (composer, recorder, analytics)
    }

    fn context(sync_type: UsersyncMethodType) -> SetuidContext {
        SetuidContext {
            account: Account::empty(""),
            uids_cookie: UidsCookie::default(),
            bidder: "knownBidder".to_string(),
            sync_type: Some(sync_type),
            privacy: PrivacyContext::default(),
            deadline: Deadline::after(Duration::from_secs(5)),
            activity: ActivityController::default(),
        }
    }

    #[test]
    fn test_pixel_decision_table() {
        use UsersyncFormat::{Blank, Pixel};
        use UsersyncMethodType::{Iframe, Redirect};

        assert!(should_respond_with_pixel(Some(Pixel), Some(Iframe)));
        assert!(should_respond_with_pixel(Some(Pixel), Some(Redirect)));
        assert!(should_respond_with_pixel(None, Some(Redirect)));
        assert!(!should_respond_with_pixel(None, Some(Iframe)));
        assert!(!should_respond_with_pixel(Some(Blank), Some(Redirect)));
        assert!(!should_respond_with_pixel(Some(Blank), Some(Iframe)));
    }

    #[test]
    fn test_redirect_bidder_gets_pixel_and_cookie() {
        let (composer, metrics, analytics) = composer();

        let response = composer.compose(&context(UsersyncMethodType::Redirect), Some("u123"), None);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.body().as_ref(), TRACKING_PIXEL);
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("uids="));
        assert_eq!(metrics.count(USERSYNC_SETS, Some("knownBidder")), 1);

        let events = analytics.events();
        assert_eq!(
            events[0].0,
            SetuidEvent::success(200, "knownBidder", Some("u123"), true)
        );
    }

    #[test]
    fn test_iframe_bidder_gets_blank_page() {
        let (composer, _, _) = composer();

        let response = composer.compose(&context(UsersyncMethodType::Iframe), Some("u123"), None);

        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "0");
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_unapplied_update_still_sets_cookie() {
        let (composer, metrics, analytics) = composer();

        let response = composer.compose(&context(UsersyncMethodType::Redirect), None, None);

        assert!(response.headers().contains_key(header::SET_COOKIE));
        assert_eq!(metrics.total(), 0);
        assert_eq!(events_success(&analytics), Some(false));
    }

    #[test]
    fn test_written_cookie_contains_uid() {
        let (composer, _, _) = composer();

        let response = composer.compose(
            &context(UsersyncMethodType::Redirect),
            Some("u123"),
            Some(UsersyncFormat::Blank),
        );

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        let value = set_cookie
            .strip_prefix("uids=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        let cookie = UidsCookie::decode(value).unwrap();
        assert_eq!(cookie.uid_from("knownBidder"), Some("u123"));
    }

    fn events_success(analytics: &RecordingAnalytics) -> Option<bool> {
        analytics.events().first().and_then(|(event, _)| event.success)
    }
}

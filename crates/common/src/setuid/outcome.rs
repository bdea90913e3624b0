//! Terminal failure outcomes of the setuid pipeline and their HTTP mapping.

use std::sync::Arc;

use bytes::Bytes;
use error_stack::Report;
use http::header::{self, HeaderValue};
use http::{Response, StatusCode};

use crate::analytics::{AnalyticsReporter, SetuidEvent};
use crate::error::SetuidError;
use crate::gdpr::TcfContext;
use crate::metrics::{Metrics, RequestCounter};

/// Which authority refused the sync for legal reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegalBlock {
    /// The account's activity rules deny syncing this bidder.
    Activity,
    /// The host's own consent vendor may not write cookies.
    HostVendorConsent,
}

/// Why a setuid request was not allowed. Exactly one is produced for a
/// failed request and it is never retried.
#[derive(Debug)]
pub enum Rejection {
    InvalidRequest(String),
    Unauthorized(String),
    LegalBlock(LegalBlock),
    Internal(Report<SetuidError>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: StatusCode,
    pub body: String,
    pub metric: Option<RequestCounter>,
}

/// Map a rejection to its status, body and counter.
#[must_use]
pub fn classify(rejection: &Rejection) -> Classification {
    match rejection {
        Rejection::InvalidRequest(reason) => Classification {
            status: StatusCode::BAD_REQUEST,
            body: format!("Invalid request format: {reason}"),
            metric: Some(RequestCounter::BadRequest),
        },
        Rejection::Unauthorized(reason) => Classification {
            status: StatusCode::UNAUTHORIZED,
            body: format!("Unauthorized: {reason}"),
            metric: Some(RequestCounter::OptOut),
        },
        Rejection::LegalBlock(LegalBlock::Activity) => Classification {
            status: StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
            body: "Unavailable For Legal Reasons.".to_string(),
            metric: None,
        },
        Rejection::LegalBlock(LegalBlock::HostVendorConsent) => Classification {
            status: StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
            body: "The gdpr_consent param prevents cookies from being saved".to_string(),
            metric: None,
        },
        Rejection::Internal(report) => Classification {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: format!(
                "Unexpected setuid processing error: {}",
                report.current_context()
            ),
            metric: None,
        },
    }
}

/// Turns a rejection into the single response of the request, recording
/// the counter and analytics event that go with it.
pub struct ErrorClassifier {
    metrics: Arc<Metrics>,
    analytics: Arc<dyn AnalyticsReporter>,
}

impl ErrorClassifier {
    #[must_use]
    pub fn new(metrics: Arc<Metrics>, analytics: Arc<dyn AnalyticsReporter>) -> Self {
        Self { metrics, analytics }
    }

    /// `tcf` is absent only when the failure happened before the privacy
    /// context existed.
    pub fn respond(&self, rejection: &Rejection, tcf: Option<&TcfContext>) -> Response<Bytes> {
        let classification = classify(rejection);

        if let Some(counter) = classification.metric {
            self.metrics.increment(counter);
        }
        if let Rejection::Internal(report) = rejection {
            log::warn!("{}: {report:?}", classification.body);
        }
        log::debug!("setuid rejected with {}", classification.status);

        let mut response = Response::new(Bytes::from(classification.body));
        *response.status_mut() = classification.status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );

        self.analytics
            .process_event(&SetuidEvent::error(classification.status.as_u16()), tcf);

        response
    }
}

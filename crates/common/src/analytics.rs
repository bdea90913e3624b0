//! Analytics events emitted by the setuid endpoint.

use serde::Serialize;

use crate::gdpr::TcfContext;

/// One record per setuid request.
///
/// Failures carry only the status; successful syncs also name the bidder,
/// the uid and whether the cookie update was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetuidEvent {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl SetuidEvent {
    #[must_use]
    pub fn error(status: u16) -> Self {
        Self {
            status,
            bidder: None,
            uid: None,
            success: None,
        }
    }

    #[must_use]
    pub fn success(status: u16, bidder: &str, uid: Option<&str>, success: bool) -> Self {
        Self {
            status,
            bidder: Some(bidder.to_string()),
            uid: uid.map(str::to_string),
            success: Some(success),
        }
    }
}

/// Delivery of analytics events.
pub trait AnalyticsReporter: Send + Sync {
    fn process_event(&self, event: &SetuidEvent, tcf: Option<&TcfContext>);
}

#[derive(Serialize)]
struct EventLogLine<'a> {
    #[serde(rename = "setuid")]
    event: &'a SetuidEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    tcf: Option<&'a TcfContext>,
}

/// Writes each event as a JSON line through the logger.
#[derive(Debug, Clone, Default)]
pub struct LogAnalyticsReporter;

impl LogAnalyticsReporter {
    #[must_use]
    pub fn format_event(event: &SetuidEvent, tcf: Option<&TcfContext>) -> String {
        serde_json::to_string(&EventLogLine { event, tcf }).unwrap_or_default()
    }
}

impl AnalyticsReporter for LogAnalyticsReporter {
    fn process_event(&self, event: &SetuidEvent, tcf: Option<&TcfContext>) {
        log::info!("{}", Self::format_event(event, tcf));
    }
}

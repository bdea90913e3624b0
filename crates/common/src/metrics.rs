//! User sync counters, recorded as OpenTelemetry instruments.
//!
//! Per-bidder counters carry the bidder as a `bidder` attribute.

use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::{global, KeyValue};

pub const METER_NAME: &str = "setuid-server:usersync";

pub const USERSYNC_BAD_REQUESTS: &str = "usersync.bad_requests";
pub const USERSYNC_OPT_OUTS: &str = "usersync.opt_outs";
pub const USERSYNC_TCF_INVALID: &str = "usersync.tcf.invalid";
pub const USERSYNC_TCF_BLOCKED: &str = "usersync.tcf.blocked";
pub const USERSYNC_SETS: &str = "usersync.sets";

pub const BIDDER_ATTRIBUTE: &str = "bidder";

/// Counters that are not keyed by bidder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCounter {
    BadRequest,
    OptOut,
}

pub struct Metrics {
    bad_requests: Counter<u64>,
    opt_outs: Counter<u64>,
    tcf_invalid: Counter<u64>,
    tcf_blocked: Counter<u64>,
    sets: Counter<u64>,
}

impl Metrics {
    /// Instruments registered on the global meter provider.
    #[must_use]
    pub fn new() -> Self {
        Self::from_meter(&global::meter(METER_NAME))
    }

    #[must_use]
    pub fn from_meter(meter: &Meter) -> Self {
        Self {
            bad_requests: counter(meter, USERSYNC_BAD_REQUESTS, "Rejected malformed setuid requests"),
            opt_outs: counter(meter, USERSYNC_OPT_OUTS, "Setuid requests from opted-out users"),
            tcf_invalid: counter(meter, USERSYNC_TCF_INVALID, "In-scope requests with an invalid consent string"),
            tcf_blocked: counter(meter, USERSYNC_TCF_BLOCKED, "Syncs blocked by host vendor consent"),
            sets: counter(meter, USERSYNC_SETS, "uids cookie updates that were applied"),
        }
    }

    pub fn increment(&self, counter: RequestCounter) {
        match counter {
            RequestCounter::BadRequest => self.bad_requests.add(1, &[]),
            RequestCounter::OptOut => self.opt_outs.add(1, &[]),
        }
    }

    pub fn update_user_sync_tcf_invalid_metric(&self, bidder: &str) {
        self.tcf_invalid.add(1, &bidder_attributes(bidder));
    }

    pub fn update_user_sync_tcf_blocked_metric(&self, bidder: &str) {
        self.tcf_blocked.add(1, &bidder_attributes(bidder));
    }

    pub fn update_user_sync_sets_metric(&self, bidder: &str) {
        self.sets.add(1, &bidder_attributes(bidder));
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn counter(meter: &Meter, name: &'static str, description: &'static str) -> Counter<u64> {
    meter
        .u64_counter(name)
        .with_description(description)
        .with_unit("1")
        .build()
}

fn bidder_attributes(bidder: &str) -> [KeyValue; 1] {
    [KeyValue::new(BIDDER_ATTRIBUTE, bidder.to_string())]
}

#[cfg(test)]
mod tests {
    use crate::test_support::tests::RecordingMetrics;

    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let recorder = RecordingMetrics::new();
        assert_eq!(recorder.count(USERSYNC_BAD_REQUESTS, None), 0);
        assert_eq!(recorder.total(), 0);
    }

    #[test]
    fn test_bidder_counters_carry_bidder_attribute() {
        let recorder = RecordingMetrics::new();
        let metrics = recorder.metrics();
        metrics.update_user_sync_tcf_invalid_metric("a");
        metrics.update_user_sync_tcf_invalid_metric("a");
        metrics.update_user_sync_tcf_blocked_metric("b");
        metrics.update_user_sync_sets_metric("a");

        assert_eq!(recorder.count(USERSYNC_TCF_INVALID, Some("a")), 2);
        assert_eq!(recorder.count(USERSYNC_TCF_BLOCKED, Some("b")), 1);
        assert_eq!(recorder.count(USERSYNC_SETS, Some("a")), 1);
        assert_eq!(recorder.count(USERSYNC_SETS, Some("b")), 0);
        assert_eq!(recorder.total(), 4);
    }

    #[test]
    fn test_request_counters() {
        let recorder = RecordingMetrics::new();
        let metrics = recorder.metrics();
        metrics.increment(RequestCounter::BadRequest);
        metrics.increment(RequestCounter::OptOut);
        metrics.increment(RequestCounter::OptOut);

        assert_eq!(recorder.count(USERSYNC_BAD_REQUESTS, None), 1);
        assert_eq!(recorder.count(USERSYNC_OPT_OUTS, None), 2);
    }

    #[test]
    fn test_concurrent_increments() {
        let recorder = RecordingMetrics::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = recorder.metrics();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.update_user_sync_sets_metric("bidder");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(recorder.count(USERSYNC_SETS, Some("bidder")), 400);
    }
}

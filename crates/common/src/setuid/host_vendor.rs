//! Host vendor consent gate: the host itself must be allowed to write the
//! sync cookie before any bidder uid is stored.

use std::collections::BTreeSet;
use std::sync::Arc;

use error_stack::Report;

use crate::error::SetuidError;
use crate::gdpr::{TcfContext, VendorConsentService};
use crate::metrics::Metrics;
use crate::timeout::Deadline;

use super::context::SetuidContext;
use super::outcome::{LegalBlock, Rejection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostVendorDecision {
    pub user_in_gdpr_scope: bool,
    pub vendor_allowed: bool,
}

impl HostVendorDecision {
    fn allowed() -> Self {
        Self {
            user_in_gdpr_scope: false,
            vendor_allowed: true,
        }
    }
}

pub struct HostVendorGate {
    host_vendor_id: Option<u32>,
    vendor_consent: Arc<dyn VendorConsentService>,
    metrics: Arc<Metrics>,
}

impl HostVendorGate {
    #[must_use]
    pub fn new(
        host_vendor_id: Option<u32>,
        vendor_consent: Arc<dyn VendorConsentService>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            host_vendor_id,
            vendor_consent,
            metrics,
        }
    }

    /// Ask the consent service whether the host vendor may sync.
    ///
    /// Without a configured host vendor id every request is allowed and the
    /// consent service is not queried.
    ///
    /// # Errors
    ///
    /// Returns the consent service failure, or a timeout when its answer
    /// arrives after `deadline`.
    pub async fn decide(
        &self,
        tcf: &TcfContext,
        deadline: &Deadline,
    ) -> Result<HostVendorDecision, Report<SetuidError>> {
        let Some(vendor_id) = self.host_vendor_id else {
            return Ok(HostVendorDecision::allowed());
        };

        let vendor_ids = BTreeSet::from([vendor_id]);
        let response = self
            .vendor_consent
            .actions_for_vendors(&vendor_ids, tcf, deadline)
            .await?;
        deadline.ensure_not_expired("host vendor consent query")?;

        let action_allows = response
            .actions
            .get(&vendor_id)
            .is_some_and(|action| !action.block_pixel_sync);

        Ok(HostVendorDecision {
            user_in_gdpr_scope: response.user_in_gdpr_scope,
            vendor_allowed: !response.user_in_gdpr_scope || action_allows,
        })
    }

    /// [`Self::decide`] mapped onto pipeline outcomes. Both a refusal and a
    /// failed query count as a TCF block for the bidder.
    ///
    /// # Errors
    ///
    /// Returns [`LegalBlock::HostVendorConsent`] when the host vendor is not
    /// allowed and [`Rejection::Internal`] when the decision failed.
    pub async fn authorize(&self, context: &SetuidContext) -> Result<HostVendorDecision, Rejection> {
        match self.decide(&context.privacy.tcf, &context.deadline).await {
            Ok(decision) if decision.vendor_allowed => {
                log::debug!(
                    "Host vendor allows sync for {} (in GDPR scope: {})",
                    context.bidder,
                    decision.user_in_gdpr_scope
                );
                Ok(decision)
            }
            Ok(decision) => {
                log::debug!(
                    "Host vendor consent blocks sync for {} (in GDPR scope: {})",
                    context.bidder,
                    decision.user_in_gdpr_scope
                );
                self.metrics
                    .update_user_sync_tcf_blocked_metric(&context.bidder);
                Err(Rejection::LegalBlock(LegalBlock::HostVendorConsent))
            }
            Err(report) => {
                self.metrics
                    .update_user_sync_tcf_blocked_metric(&context.bidder);
                Err(Rejection::Internal(report))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::account::Account;
    use crate::activity::ActivityController;
    use crate::gdpr::{PrivacyContext, PrivacyEnforcementAction, TcfVendorConsentService};
    use crate::metrics::USERSYNC_TCF_BLOCKED;
    use crate::test_support::tests::{
        FailingVendorConsentService, RecordingMetrics, StaticVendorConsentService,
    };
    use crate::uids::UidsCookie;

    use super::*;

    const HOST_VENDOR_ID: u32 = 7;

    fn context(tcf: TcfContext) -> SetuidContext {
        SetuidContext {
            account: Account::empty(""),
            uids_cookie: UidsCookie::default(),
            bidder: "knownBidder".to_string(),
            sync_type: None,
            privacy: PrivacyContext { tcf },
            deadline: Deadline::after(Duration::from_secs(5)),
            activity: ActivityController::default(),
        }
    }

    fn in_scope() -> TcfContext {
        TcfContext {
            in_gdpr_scope: true,
            consent_string: None,
            consent_valid: true,
        }
    }

    fn gate(service: Arc<dyn VendorConsentService>) -> (HostVendorGate, RecordingMetrics) {
        let recorder = RecordingMetrics::new();
        (
            HostVendorGate::new(Some(HOST_VENDOR_ID), service, recorder.metrics()),
            recorder,
        )
    }

    #[test]
    fn test_no_host_vendor_skips_query() {
        let recorder = RecordingMetrics::new();
        let gate = HostVendorGate::new(
            None,
            Arc::new(FailingVendorConsentService),
            recorder.metrics(),
        );

        let decision = tokio_test::block_on(gate.authorize(&context(in_scope()))).unwrap();
        assert!(decision.vendor_allowed);
    }

    #[test]
    fn test_out_of_scope_is_allowed() {
        let (gate, metrics) = gate(Arc::new(TcfVendorConsentService));

        let decision =
            tokio_test::block_on(gate.authorize(&context(TcfContext::out_of_scope()))).unwrap();
        assert!(!decision.user_in_gdpr_scope);
        assert!(decision.vendor_allowed);
        assert_eq!(metrics.total(), 0);
    }

    #[test]
    fn test_in_scope_allowed_action_passes() {
        let (gate, _) = gate(Arc::new(StaticVendorConsentService::new(
            true,
            Some(PrivacyEnforcementAction::allow_all()),
        )));

        let decision = tokio_test::block_on(gate.authorize(&context(in_scope()))).unwrap();
        assert!(decision.user_in_gdpr_scope);
        assert!(decision.vendor_allowed);
    }

    #[test]
    fn test_in_scope_blocking_action_is_legal_block() {
        let (gate, metrics) = gate(Arc::new(StaticVendorConsentService::new(
            true,
            Some(PrivacyEnforcementAction::restrict_all()),
        )));

        let rejection = tokio_test::block_on(gate.authorize(&context(in_scope()))).unwrap_err();
        assert!(matches!(
            rejection,
            Rejection::LegalBlock(LegalBlock::HostVendorConsent)
        ));
        assert_eq!(metrics.count(USERSYNC_TCF_BLOCKED, Some("knownBidder")), 1);
    }

    #[test]
    fn test_in_scope_missing_action_is_blocked() {
        let (gate, _) = gate(Arc::new(StaticVendorConsentService::new(true, None)));

        let decision =
            tokio_test::block_on(gate.decide(&in_scope(), &Deadline::after(Duration::from_secs(5))))
                .unwrap();
        assert!(!decision.vendor_allowed);
    }

    #[test]
    fn test_service_failure_is_internal_and_counted() {
        let (gate, metrics) = gate(Arc::new(FailingVendorConsentService));

        let rejection = tokio_test::block_on(gate.authorize(&context(in_scope()))).unwrap_err();
        assert!(matches!(rejection, Rejection::Internal(_)));
        assert_eq!(metrics.count(USERSYNC_TCF_BLOCKED, Some("knownBidder")), 1);
    }

    #[test]
    fn test_expired_deadline_is_internal() {
        let (gate, _) = gate(Arc::new(TcfVendorConsentService));
        let mut context = context(in_scope());
        context.deadline = Deadline::after(Duration::ZERO);

        let rejection = tokio_test::block_on(gate.authorize(&context)).unwrap_err();
        match rejection {
            Rejection::Internal(report) => {
                assert!(matches!(report.current_context(), SetuidError::Timeout { .. }));
            }
            other => panic!("unexpected rejection {other:?}"),
        }
    }
}

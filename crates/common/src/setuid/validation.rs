//! Ordered request checks that run before any cookie is touched.

use std::sync::Arc;

use crate::activity::{Activity, ComponentType};
use crate::metrics::Metrics;

use super::context::SetuidContext;
use super::outcome::{LegalBlock, Rejection};
use super::registry::SyncRegistry;

pub struct ValidationChain {
    registry: Arc<SyncRegistry>,
    metrics: Arc<Metrics>,
}

impl ValidationChain {
    #[must_use]
    pub fn new(registry: Arc<SyncRegistry>, metrics: Arc<Metrics>) -> Self {
        Self { registry, metrics }
    }

    /// Run the checks in order and stop at the first failure.
    ///
    /// 1. the bidder is present and registered
    /// 2. an in-scope consent string decodes
    /// 3. the uids cookie allows syncing
    /// 4. the account's activity rules allow syncing this bidder
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] of the first failing check.
    pub fn validate(&self, context: &SetuidContext) -> Result<(), Rejection> {
        self.check_bidder(&context.bidder)?;
        self.check_consent(context)?;
        Self::check_opt_out(context)?;
        Self::check_activity(context)
    }

    fn check_bidder(&self, bidder: &str) -> Result<(), Rejection> {
        if bidder.trim().is_empty() {
            return Err(Rejection::InvalidRequest(
                "bidder param is required".to_string(),
            ));
        }
        if !self.registry.contains(bidder) {
            return Err(Rejection::InvalidRequest(
                "bidder param is invalid".to_string(),
            ));
        }
        Ok(())
    }

    fn check_consent(&self, context: &SetuidContext) -> Result<(), Rejection> {
        let tcf = &context.privacy.tcf;
        if tcf.in_gdpr_scope && !tcf.consent_valid {
            self.metrics
                .update_user_sync_tcf_invalid_metric(&context.bidder);
            return Err(Rejection::InvalidRequest(
                "Consent string is invalid".to_string(),
            ));
        }
        Ok(())
    }

    fn check_opt_out(context: &SetuidContext) -> Result<(), Rejection> {
        if !context.uids_cookie.allows_sync() {
            return Err(Rejection::Unauthorized(
                "Sync is not allowed for this uids".to_string(),
            ));
        }
        Ok(())
    }

    fn check_activity(context: &SetuidContext) -> Result<(), Rejection> {
        if !context
            .activity
            .is_allowed(Activity::SyncUser, ComponentType::Bidder, &context.bidder)
        {
            log::debug!(
                "Activity rules of account '{}' deny syncing {}",
                context.account.id,
                context.bidder
            );
            return Err(Rejection::LegalBlock(LegalBlock::Activity));
        }
        Ok(())
    }
}

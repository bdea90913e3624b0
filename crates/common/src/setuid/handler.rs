use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Response;

use crate::account::{AccountStore, SettingsAccountStore};
use crate::analytics::{AnalyticsReporter, LogAnalyticsReporter};
use crate::gdpr::{
    PrivacyResolver, TcfPrivacyResolver, TcfVendorConsentService, VendorConsentService,
};
use crate::http_wrapper::RequestWrapper;
use crate::metrics::Metrics;
use crate::settings::Settings;
use crate::timeout::Deadline;
use crate::uids::UidsCookieService;

use super::context::{ContextAssembler, SetuidContext, SetuidQuery};
use super::host_vendor::{HostVendorDecision, HostVendorGate};
use super::outcome::{ErrorClassifier, Rejection};
use super::registry::SyncRegistry;
use super::response::ResponseComposer;
use super::validation::ValidationChain;

/// External services the pipeline talks to.
pub struct SetuidCollaborators {
    pub accounts: Arc<dyn AccountStore>,
    pub privacy: Arc<dyn PrivacyResolver>,
    pub vendor_consent: Arc<dyn VendorConsentService>,
    pub analytics: Arc<dyn AnalyticsReporter>,
    pub metrics: Arc<Metrics>,
}

impl SetuidCollaborators {
    /// Settings-backed accounts, TCF consent evaluation and log analytics.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            accounts: Arc::new(SettingsAccountStore::from_settings(settings)),
            privacy: Arc::new(TcfPrivacyResolver::new(settings.gdpr.clone())),
            vendor_consent: Arc::new(TcfVendorConsentService),
            analytics: Arc::new(LogAnalyticsReporter),
            metrics: Arc::new(Metrics::new()),
        }
    }
}

/// Drives a setuid request from query parsing to the single response.
pub struct SetuidHandler {
    timeout: Duration,
    cookie_service: Arc<UidsCookieService>,
    assembler: ContextAssembler,
    validation: ValidationChain,
    host_vendor: HostVendorGate,
    composer: ResponseComposer,
    classifier: ErrorClassifier,
}

impl SetuidHandler {
    #[must_use]
    pub fn new(
        settings: &Settings,
        registry: Arc<SyncRegistry>,
        collaborators: SetuidCollaborators,
    ) -> Self {
        let SetuidCollaborators {
            accounts,
            privacy,
            vendor_consent,
            analytics,
            metrics,
        } = collaborators;
        let cookie_service = Arc::new(UidsCookieService::new(settings.cookie.clone()));

        Self {
            timeout: Duration::from_millis(settings.setuid.default_timeout_ms),
            cookie_service: cookie_service.clone(),
            assembler: ContextAssembler::new(registry.clone(), accounts, privacy),
            validation: ValidationChain::new(registry, metrics.clone()),
            host_vendor: HostVendorGate::new(
                settings.gdpr.host_vendor_id,
                vendor_consent,
                metrics.clone(),
            ),
            composer: ResponseComposer::new(cookie_service, metrics.clone(), analytics.clone()),
            classifier: ErrorClassifier::new(metrics, analytics),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let registry = Arc::new(SyncRegistry::from_settings(settings));
        Self::new(settings, registry, SetuidCollaborators::from_settings(settings))
    }

    /// Handle one setuid request. Every path returns exactly one response.
    pub async fn handle<T: RequestWrapper>(&self, req: &T) -> Response<Bytes> {
        let query = SetuidQuery::from_request(req);
        let uids_cookie = self.cookie_service.parse_from_request(req);
        let deadline = Deadline::after(self.timeout);

        let context = match self.assembler.assemble(&query, uids_cookie, deadline).await {
            Ok(context) => context,
            Err(report) => return self.classifier.respond(&Rejection::Internal(report), None),
        };

        match self.authorize(&context).await {
            Ok(_) => self
                .composer
                .compose(&context, query.uid.as_deref(), query.format),
            Err(rejection) => self
                .classifier
                .respond(&rejection, Some(&context.privacy.tcf)),
        }
    }

    async fn authorize(&self, context: &SetuidContext) -> Result<HostVendorDecision, Rejection> {
        self.validation.validate(context)?;
        self.host_vendor.authorize(context).await
    }
}

//! GDPR scope and consent resolution for setuid requests.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use error_stack::Report;
use serde::Serialize;

use crate::account::Account;
use crate::consent::TcfConsent;
use crate::constants::{PARAM_GDPR, PARAM_GDPR_CONSENT};
use crate::error::SetuidError;
use crate::settings::GdprSettings;
use crate::timeout::Deadline;

/// Purpose 1: store and/or access information on a device.
const PURPOSE_DEVICE_ACCESS: usize = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TcfContext {
    pub in_gdpr_scope: bool,
    pub consent_string: Option<String>,
    pub consent_valid: bool,
}

impl TcfContext {
    #[must_use]
    pub fn out_of_scope() -> Self {
        Self {
            in_gdpr_scope: false,
            consent_string: None,
            consent_valid: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrivacyContext {
    pub tcf: TcfContext,
}

/// What the consent framework lets a vendor do for the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrivacyEnforcementAction {
    pub block_pixel_sync: bool,
}

impl PrivacyEnforcementAction {
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            block_pixel_sync: false,
        }
    }

    #[must_use]
    pub fn restrict_all() -> Self {
        Self {
            block_pixel_sync: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcfResponse {
    pub user_in_gdpr_scope: bool,
    pub actions: HashMap<u32, PrivacyEnforcementAction>,
}

/// Resolves the privacy context of a setuid request.
#[async_trait(?Send)]
pub trait PrivacyResolver: Send + Sync {
    async fn resolve(
        &self,
        params: &HashMap<String, String>,
        account: &Account,
        deadline: &Deadline,
    ) -> Result<PrivacyContext, Report<SetuidError>>;
}

/// Answers per-vendor consent questions for an already resolved context.
#[async_trait(?Send)]
pub trait VendorConsentService: Send + Sync {
    async fn actions_for_vendors(
        &self,
        vendor_ids: &BTreeSet<u32>,
        tcf: &TcfContext,
        deadline: &Deadline,
    ) -> Result<TcfResponse, Report<SetuidError>>;
}

/// Reads `gdpr` / `gdpr_consent` query parameters and validates the consent
/// string against the TCF v2 core layout.
#[derive(Debug, Clone)]
pub struct TcfPrivacyResolver {
    settings: GdprSettings,
}

impl TcfPrivacyResolver {
    #[must_use]
    pub fn new(settings: GdprSettings) -> Self {
        Self { settings }
    }

    fn in_scope(&self, gdpr_param: Option<&str>, account: &Account) -> bool {
        if !self.settings.enabled || account.gdpr_enabled == Some(false) {
            return false;
        }

        match gdpr_param {
            Some("1") => true,
            Some("0") => false,
            _ => self.settings.default_value == "1",
        }
    }
}

#[async_trait(?Send)]
impl PrivacyResolver for TcfPrivacyResolver {
    async fn resolve(
        &self,
        params: &HashMap<String, String>,
        account: &Account,
        deadline: &Deadline,
    ) -> Result<PrivacyContext, Report<SetuidError>> {
        deadline.ensure_not_expired("privacy context resolution")?;

        let in_gdpr_scope = self.in_scope(params.get(PARAM_GDPR).map(String::as_str), account);
        let consent_string = params
            .get(PARAM_GDPR_CONSENT)
            .map(|consent| consent.trim().to_string())
            .filter(|consent| !consent.is_empty());
        let consent_valid = consent_string
            .as_deref()
            .is_some_and(|consent| TcfConsent::decode(consent).is_ok());

        Ok(PrivacyContext {
            tcf: TcfContext {
                in_gdpr_scope,
                consent_string,
                consent_valid,
            },
        })
    }
}

/// Vendor consent derived from the decoded TCF string: pixel syncs are
/// allowed when purpose 1 and the vendor both have consent.
#[derive(Debug, Clone, Default)]
pub struct TcfVendorConsentService;

#[async_trait(?Send)]
impl VendorConsentService for TcfVendorConsentService {
    async fn actions_for_vendors(
        &self,
        vendor_ids: &BTreeSet<u32>,
        tcf: &TcfContext,
        deadline: &Deadline,
    ) -> Result<TcfResponse, Report<SetuidError>> {
        deadline.ensure_not_expired("vendor consent query")?;

        if !tcf.in_gdpr_scope {
            return Ok(TcfResponse {
                user_in_gdpr_scope: false,
                actions: vendor_ids
                    .iter()
                    .map(|id| (*id, PrivacyEnforcementAction::allow_all()))
                    .collect(),
            });
        }

        let consent = tcf
            .consent_string
            .as_deref()
            .and_then(|consent| TcfConsent::decode(consent).ok());

        let actions = vendor_ids
            .iter()
            .map(|id| {
                let allowed = consent.as_ref().is_some_and(|consent| {
                    consent.purpose_consent(PURPOSE_DEVICE_ACCESS) && consent.vendor_consent(*id)
                });
                let action = if allowed {
                    PrivacyEnforcementAction::allow_all()
                } else {
                    PrivacyEnforcementAction::restrict_all()
                };
                (*id, action)
            })
            .collect();

        Ok(TcfResponse {
            user_in_gdpr_scope: true,
            actions,
        })
    }
}

//! Per-request context assembly.

use std::collections::HashMap;
use std::sync::Arc;

use error_stack::Report;

use crate::account::{Account, AccountStore};
use crate::activity::ActivityController;
use crate::constants::{PARAM_ACCOUNT, PARAM_BIDDER, PARAM_FORMAT, PARAM_UID};
use crate::error::SetuidError;
use crate::gdpr::{PrivacyContext, PrivacyResolver};
use crate::http_wrapper::RequestWrapper;
use crate::timeout::Deadline;
use crate::uids::UidsCookie;

use super::registry::{SyncRegistry, UsersyncFormat, UsersyncMethodType};

/// Query parameters of a setuid request.
#[derive(Debug, Clone, Default)]
pub struct SetuidQuery {
    pub bidder: Option<String>,
    pub uid: Option<String>,
    pub account: Option<String>,
    pub format: Option<UsersyncFormat>,
    /// Every decoded parameter, for the privacy resolver.
    pub params: HashMap<String, String>,
}

impl SetuidQuery {
    #[must_use]
    pub fn from_params(params: HashMap<String, String>) -> Self {
        Self {
            bidder: params.get(PARAM_BIDDER).cloned(),
            uid: params.get(PARAM_UID).cloned(),
            account: params.get(PARAM_ACCOUNT).cloned(),
            format: UsersyncFormat::from_param(params.get(PARAM_FORMAT).map(String::as_str)),
            params,
        }
    }

    pub fn from_request<T: RequestWrapper>(req: &T) -> Self {
        Self::from_params(req.query_params())
    }
}

/// Everything later stages need to decide on a setuid request.
///
/// Built once by [`ContextAssembler`] and only read afterwards.
#[derive(Debug, Clone)]
pub struct SetuidContext {
    pub account: Account,
    pub uids_cookie: UidsCookie,
    /// Requested cookie family; empty when the parameter was missing.
    pub bidder: String,
    pub sync_type: Option<UsersyncMethodType>,
    pub privacy: PrivacyContext,
    pub deadline: Deadline,
    pub activity: ActivityController,
}

pub struct ContextAssembler {
    registry: Arc<SyncRegistry>,
    accounts: Arc<dyn AccountStore>,
    privacy: Arc<dyn PrivacyResolver>,
}

impl ContextAssembler {
    #[must_use]
    pub fn new(
        registry: Arc<SyncRegistry>,
        accounts: Arc<dyn AccountStore>,
        privacy: Arc<dyn PrivacyResolver>,
    ) -> Self {
        Self {
            registry,
            accounts,
            privacy,
        }
    }

    /// Resolve the account and privacy context and freeze them into a
    /// [`SetuidContext`].
    ///
    /// # Errors
    ///
    /// Returns the privacy resolver's failure, or a timeout when its result
    /// arrives after `deadline`. Account failures never surface here.
    pub async fn assemble(
        &self,
        query: &SetuidQuery,
        uids_cookie: UidsCookie,
        deadline: Deadline,
    ) -> Result<SetuidContext, Report<SetuidError>> {
        let account = self.account_by_id(query.account.as_deref(), &deadline).await;

        let privacy = self
            .privacy
            .resolve(&query.params, &account, &deadline)
            .await?;
        deadline.ensure_not_expired("privacy context resolution")?;

        let bidder = query.bidder.clone().unwrap_or_default();
        let sync_type = self.registry.sync_type(&bidder);
        let activity = ActivityController::from_account(&account);

        Ok(SetuidContext {
            account,
            uids_cookie,
            bidder,
            sync_type,
            privacy,
            deadline,
            activity,
        })
    }

    /// Fallback policy: a blank id or any lookup failure yields an empty
    /// account so that unconfigured accounts never block a sync on their own.
    async fn account_by_id(&self, id: Option<&str>, deadline: &Deadline) -> Account {
        let id = id.unwrap_or_default();
        if id.trim().is_empty() {
            return Account::empty(id);
        }

        match self.accounts.account_by_id(id, deadline).await {
            Ok(account) => account,
            Err(report) => {
                log::debug!("Falling back to empty account for '{id}': {report:?}");
                Account::empty(id)
            }
        }
    }
}

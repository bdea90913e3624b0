//! Host accounts and the store they are resolved from.

use std::collections::HashMap;

use async_trait::async_trait;
use error_stack::Report;

use crate::error::SetuidError;
use crate::settings::{AccountSettings, ActivitiesSettings, Settings};
use crate::timeout::Deadline;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub id: String,
    /// Account-level GDPR switch; `None` defers to the global setting.
    pub gdpr_enabled: Option<bool>,
    pub activities: ActivitiesSettings,
}

impl Account {
    /// An account with no configuration, used when the request names no
    /// account or the named one cannot be resolved.
    #[must_use]
    pub fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

impl From<&AccountSettings> for Account {
    fn from(settings: &AccountSettings) -> Self {
        Self {
            id: settings.id.clone(),
            gdpr_enabled: settings.gdpr_enabled,
            activities: settings.activities.clone(),
        }
    }
}

/// Source of account configuration.
#[async_trait(?Send)]
pub trait AccountStore: Send + Sync {
    /// Resolve the account with the given id.
    ///
    /// Implementations should give up once `deadline` has passed.
    async fn account_by_id(
        &self,
        id: &str,
        deadline: &Deadline,
    ) -> Result<Account, Report<SetuidError>>;
}

/// Serves accounts declared in the `[[accounts]]` settings section.
#[derive(Debug, Clone, Default)]
pub struct SettingsAccountStore {
    accounts: HashMap<String, Account>,
}

impl SettingsAccountStore {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let accounts = settings
            .accounts
            .iter()
            .map(|account| (account.id.clone(), Account::from(account)))
            .collect();
        Self { accounts }
    }
}

#[async_trait(?Send)]
impl AccountStore for SettingsAccountStore {
    async fn account_by_id(
        &self,
        id: &str,
        deadline: &Deadline,
    ) -> Result<Account, Report<SetuidError>> {
        deadline.ensure_not_expired("account lookup")?;

        self.accounts.get(id).cloned().ok_or_else(|| {
            Report::new(SetuidError::AccountLookup {
                message: format!("Account '{id}' not found"),
            })
        })
    }
}

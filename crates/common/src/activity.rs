//! Per-account activity permissions.
//!
//! Accounts may restrict activities (such as writing a user sync) for
//! specific component types and names. Rules are checked in order and the
//! first rule whose conditions match decides.

use serde::{Deserialize, Serialize};

use crate::account::Account;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    SyncUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Bidder,
    Analytics,
}

/// Conditions of a rule. An absent condition matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCondition {
    pub component_types: Option<Vec<ComponentType>>,
    pub component_names: Option<Vec<String>>,
}

impl ActivityCondition {
    fn matches(&self, component_type: ComponentType, component_name: &str) -> bool {
        let type_matches = self
            .component_types
            .as_ref()
            .is_none_or(|types| types.contains(&component_type));
        let name_matches = self
            .component_names
            .as_ref()
            .is_none_or(|names| names.iter().any(|name| name == component_name));

        type_matches && name_matches
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRule {
    #[serde(flatten)]
    pub condition: ActivityCondition,
    pub allow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityConfiguration {
    #[serde(default = "default_allow")]
    pub allow: bool,
    #[serde(default)]
    pub rules: Vec<ActivityRule>,
}

impl Default for ActivityConfiguration {
    fn default() -> Self {
        Self {
            allow: true,
            rules: Vec::new(),
        }
    }
}

impl ActivityConfiguration {
    fn is_allowed(&self, component_type: ComponentType, component_name: &str) -> bool {
        self.rules
            .iter()
            .find(|rule| rule.condition.matches(component_type, component_name))
            .map_or(self.allow, |rule| rule.allow)
    }
}

/// Activity evaluator bound to one account.
#[derive(Debug, Clone, Default)]
pub struct ActivityController {
    sync_user: ActivityConfiguration,
}

impl ActivityController {
    #[must_use]
    pub fn from_account(account: &Account) -> Self {
        Self {
            sync_user: account.activities.sync_user.clone().unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn is_allowed(
        &self,
        activity: Activity,
        component_type: ComponentType,
        component_name: &str,
    ) -> bool {
        match activity {
            Activity::SyncUser => self.sync_user.is_allowed(component_type, component_name),
        }
    }
}

fn default_allow() -> bool {
    true
}

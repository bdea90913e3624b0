use std::str;

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::activity::ActivityConfiguration;
use crate::error::SetuidError;

pub const ENVIRONMENT_VARIABLE_PREFIX: &str = "SETUID_SERVER";
pub const ENVIRONMENT_VARIABLE_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SetuidSettings {
    /// Budget for the whole setuid pipeline, shared by every collaborator call.
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1, max = 60000))]
    pub default_timeout_ms: u64,
}

impl Default for SetuidSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CookieSettings {
    pub domain: Option<String>,
    #[serde(default = "default_ttl_days")]
    #[validate(range(min = 1, max = 3650))]
    pub ttl_days: u32,
    /// Upper bound for the encoded `uids` value. Zero disables the check.
    #[serde(default)]
    pub max_cookie_size_bytes: usize,
    pub opt_out_cookie_name: Option<String>,
    pub opt_out_cookie_value: Option<String>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            domain: None,
            ttl_days: default_ttl_days(),
            max_cookie_size_bytes: 0,
            opt_out_cookie_name: None,
            opt_out_cookie_value: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GdprSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Scope assumed when the request carries no `gdpr` flag ("1" = in scope).
    #[serde(default = "default_gdpr_value")]
    pub default_value: String,
    pub host_vendor_id: Option<u32>,
}

impl Default for GdprSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_value: default_gdpr_value(),
            host_vendor_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UsersyncMethodSettings {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UsersyncSettings {
    pub iframe: Option<UsersyncMethodSettings>,
    pub redirect: Option<UsersyncMethodSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BidderSettings {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub cookie_family_name: Option<String>,
    pub usersync: Option<UsersyncSettings>,
}

impl BidderSettings {
    /// Key under which this bidder's uid lives in the `uids` cookie.
    #[must_use]
    pub fn family_name(&self) -> &str {
        self.cookie_family_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ActivitiesSettings {
    pub sync_user: Option<ActivityConfiguration>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccountSettings {
    pub id: String,
    pub gdpr_enabled: Option<bool>,
    #[serde(default)]
    pub activities: ActivitiesSettings,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[serde(default)]
    #[validate(nested)]
    pub setuid: SetuidSettings,
    #[serde(default)]
    #[validate(nested)]
    pub cookie: CookieSettings,
    #[serde(default)]
    pub gdpr: GdprSettings,
    #[serde(default)]
    #[validate(custom(function = "validate_bidders"))]
    pub bidders: Vec<BidderSettings>,
    #[serde(default)]
    pub accounts: Vec<AccountSettings>,
}

impl Settings {
    /// Load the settings embedded at build time, with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`SetuidError::Configuration`] if the embedded TOML is invalid
    /// or fails validation.
    pub fn new() -> Result<Self, Report<SetuidError>> {
        let toml_bytes = include_bytes!("../../../setuid-server.toml");
        let toml_str = str::from_utf8(toml_bytes).change_context(SetuidError::InvalidUtf8 {
            message: "embedded setuid-server.toml".to_string(),
        })?;

        Self::from_toml(toml_str)
    }

    /// Parse and validate settings from a TOML string, layering
    /// `SETUID_SERVER__*` environment variables on top.
    ///
    /// # Errors
    ///
    /// Returns [`SetuidError::Configuration`] if the TOML cannot be parsed,
    /// deserialized, or validated.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<SetuidError>> {
        let environment = Environment::default()
            .prefix(ENVIRONMENT_VARIABLE_PREFIX)
            .separator(ENVIRONMENT_VARIABLE_SEPARATOR);

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(SetuidError::Configuration {
                message: "Failed to build configuration".to_string(),
            })?;

        let settings: Self =
            config
                .try_deserialize()
                .change_context(SetuidError::Configuration {
                    message: "Failed to deserialize configuration".to_string(),
                })?;

        settings
            .validate()
            .change_context(SetuidError::Configuration {
                message: "Settings validation failed".to_string(),
            })?;

        Ok(settings)
    }
}

fn validate_bidders(bidders: &[BidderSettings]) -> Result<(), ValidationError> {
    if bidders
        .iter()
        .any(|bidder| bidder.name.trim().is_empty() || bidder.family_name().trim().is_empty())
    {
        return Err(ValidationError::new("empty_bidder_name"));
    }
    Ok(())
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_ttl_days() -> u32 {
    90
}

fn default_gdpr_value() -> String {
    "1".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_new() {
        let settings = Settings::new();
        assert!(settings.is_ok(), "Settings should load from embedded TOML");

        let settings = settings.unwrap();
        assert!(!settings.bidders.is_empty());
        assert!(settings.setuid.default_timeout_ms > 0);
    }

    #[test]
    fn test_settings_from_valid_toml() {
        let toml_str = r#"
            [setuid]
            default_timeout_ms = 500

            [cookie]
            domain = ".example.com"
            ttl_days = 30
            max_cookie_size_bytes = 4096

            [gdpr]
            default_value = "0"
            host_vendor_id = 42

            [[bidders]]
            name = "knownBidder"
            usersync.redirect.url = "https://sync.known.com/?redir={{redirect_url}}"

            [[bidders]]
            name = "aliasBidder"
            cookie_family_name = "family"
            usersync.iframe.url = "https://sync.alias.com/iframe"

            [[accounts]]
            id = "1001"
            gdpr_enabled = false
            "#;

        let settings = Settings::from_toml(toml_str).unwrap();
        assert_eq!(settings.setuid.default_timeout_ms, 500);
        assert_eq!(settings.cookie.domain.as_deref(), Some(".example.com"));
        assert_eq!(settings.cookie.ttl_days, 30);
        assert_eq!(settings.cookie.max_cookie_size_bytes, 4096);
        assert_eq!(settings.gdpr.default_value, "0");
        assert_eq!(settings.gdpr.host_vendor_id, Some(42));
        assert_eq!(settings.bidders.len(), 2);
        assert_eq!(settings.bidders[0].family_name(), "knownBidder");
        assert_eq!(settings.bidders[1].family_name(), "family");
        assert_eq!(settings.accounts[0].gdpr_enabled, Some(false));
    }

    #[test]
    fn test_settings_defaults_for_missing_sections() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.setuid.default_timeout_ms, 2000);
        assert_eq!(settings.cookie.ttl_days, 90);
        assert!(settings.gdpr.enabled);
        assert_eq!(settings.gdpr.host_vendor_id, None);
        assert!(settings.bidders.is_empty());
    }

    #[test]
    fn test_settings_invalid_toml_syntax() {
        let toml_str = r#"
            [setuid
            default_timeout_ms = 500
            "#;

        let settings = Settings::from_toml(toml_str);
        assert!(settings.is_err(), "Should fail with invalid TOML syntax");
    }

    #[test]
    fn test_settings_rejects_zero_timeout() {
        let toml_str = r#"
            [setuid]
            default_timeout_ms = 0
            "#;

        assert!(Settings::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_settings_rejects_blank_bidder_name() {
        let toml_str = r#"
            [[bidders]]
            name = " "
            "#;

        assert!(Settings::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_override_env() {
        let toml_str = r#"
            [gdpr]
            default_value = "1"
            "#;

        temp_env::with_var("SETUID_SERVER__GDPR__HOST_VENDOR_ID", Some("7"), || {
            let settings = Settings::from_toml(toml_str);

            assert!(settings.is_ok(), "Settings should load with env override");
            assert_eq!(settings.unwrap().gdpr.host_vendor_id, Some(7));
        });
    }
}

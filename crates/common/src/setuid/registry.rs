//! Bidder cookie family → registered sync mechanism.

use std::collections::HashMap;

use crate::settings::{BidderSettings, Settings};

/// How a bidder triggers user syncs from the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsersyncMethodType {
    Iframe,
    Redirect,
}

/// Response shape requested through the `format` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsersyncFormat {
    Pixel,
    Blank,
}

impl UsersyncFormat {
    /// Parse the `format` parameter. Unknown values yield `None` so the
    /// response falls back to the bidder's sync mechanism.
    #[must_use]
    pub fn from_param(value: Option<&str>) -> Option<Self> {
        match value {
            Some("i" | "pixel") => Some(Self::Pixel),
            Some("b" | "blank") => Some(Self::Blank),
            _ => None,
        }
    }
}

/// Read-only lookup built once at startup from the bidder catalog.
#[derive(Debug, Clone, Default)]
pub struct SyncRegistry {
    sync_types: HashMap<String, UsersyncMethodType>,
}

impl SyncRegistry {
    /// Register every enabled bidder that declares a usersync method.
    ///
    /// Aliases sharing a cookie family collapse to the first declaration.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let mut sync_types = HashMap::new();

        for bidder in settings.bidders.iter().filter(|bidder| bidder.enabled) {
            if let Some(sync_type) = preferred_sync_type(bidder) {
                sync_types
                    .entry(bidder.family_name().to_string())
                    .or_insert(sync_type);
            }
        }

        log::info!("Sync registry built with {} cookie families", sync_types.len());

        Self { sync_types }
    }

    #[must_use]
    pub fn sync_type(&self, family: &str) -> Option<UsersyncMethodType> {
        self.sync_types.get(family).copied()
    }

    #[must_use]
    pub fn contains(&self, family: &str) -> bool {
        self.sync_types.contains_key(family)
    }
}

// iframe wins over redirect when a bidder declares both
fn preferred_sync_type(bidder: &BidderSettings) -> Option<UsersyncMethodType> {
    let usersync = bidder.usersync.as_ref()?;
    if usersync.iframe.is_some() {
        Some(UsersyncMethodType::Iframe)
    } else if usersync.redirect.is_some() {
        Some(UsersyncMethodType::Redirect)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::tests::create_test_settings;

    use super::*;

    #[test]
    fn test_registry_maps_families_to_methods() {
        let registry = SyncRegistry::from_settings(&create_test_settings());

        assert_eq!(
            registry.sync_type("knownBidder"),
            Some(UsersyncMethodType::Redirect)
        );
        assert_eq!(
            registry.sync_type("iframeBidder"),
            Some(UsersyncMethodType::Iframe)
        );
    }

    #[test]
    fn test_registry_prefers_iframe() {
        let registry = SyncRegistry::from_settings(&create_test_settings());
        assert_eq!(
            registry.sync_type("bothBidder"),
            Some(UsersyncMethodType::Iframe)
        );
    }

    #[test]
    fn test_registry_skips_disabled_and_syncless_bidders() {
        let registry = SyncRegistry::from_settings(&create_test_settings());
        assert!(!registry.contains("disabledBidder"));
        assert!(!registry.contains("noSyncBidder"));
    }

    #[test]
    fn test_registry_uses_cookie_family_for_aliases() {
        let registry = SyncRegistry::from_settings(&create_test_settings());
        assert!(registry.contains("sharedFamily"));
        assert!(!registry.contains("aliasOne"));
        assert!(!registry.contains("aliasTwo"));
    }

    #[test]
    fn test_format_param() {
        assert_eq!(UsersyncFormat::from_param(Some("i")), Some(UsersyncFormat::Pixel));
        assert_eq!(
            UsersyncFormat::from_param(Some("pixel")),
            Some(UsersyncFormat::Pixel)
        );
        assert_eq!(UsersyncFormat::from_param(Some("b")), Some(UsersyncFormat::Blank));
        assert_eq!(
            UsersyncFormat::from_param(Some("blank")),
            Some(UsersyncFormat::Blank)
        );
        assert_eq!(UsersyncFormat::from_param(Some("gif")), None);
        assert_eq!(UsersyncFormat::from_param(None), None);
    }
}

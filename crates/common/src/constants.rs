pub const UIDS_COOKIE_NAME: &str = "uids";

pub const PARAM_BIDDER: &str = "bidder";
pub const PARAM_UID: &str = "uid";
pub const PARAM_ACCOUNT: &str = "account";
pub const PARAM_FORMAT: &str = "format";
pub const PARAM_GDPR: &str = "gdpr";
pub const PARAM_GDPR_CONSENT: &str = "gdpr_consent";

pub const SETUID_PATH: &str = "/setuid";

use cookie::{Cookie, CookieJar};
use http::header;

use crate::constants::UIDS_COOKIE_NAME;
use crate::http_wrapper::RequestWrapper;
use crate::settings::CookieSettings;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

// return empty cookie jar for unparsable cookies
pub fn parse_cookies_to_jar(s: &str) -> CookieJar {
    let cookie_str = s.trim().to_owned();
    let mut jar = CookieJar::new();
    let cookies = Cookie::split_parse(cookie_str).filter_map(Result::ok);

    for cookie in cookies {
        jar.add_original(cookie);
    }

    jar
}

pub fn handle_request_cookies<T: RequestWrapper>(req: &T) -> Option<CookieJar> {
    match req.get_header(header::COOKIE) {
        Some(header_value) => {
            let header_value_str: &str = header_value.to_str().unwrap_or("");
            Some(parse_cookies_to_jar(header_value_str))
        }
        None => {
            log::debug!("No cookie header found in request");
            None
        }
    }
}

/// Render the `Set-Cookie` value carrying an encoded `uids` cookie.
pub fn create_uids_cookie(settings: &CookieSettings, encoded_value: &str) -> String {
    let max_age = u64::from(settings.ttl_days) * SECONDS_PER_DAY;
    match &settings.domain {
        Some(domain) => format!(
            "{UIDS_COOKIE_NAME}={encoded_value}; Domain={domain}; Path=/; Max-Age={max_age}; SameSite=None; Secure"
        ),
        None => format!(
            "{UIDS_COOKIE_NAME}={encoded_value}; Path=/; Max-Age={max_age}; SameSite=None; Secure"
        ),
    }
}

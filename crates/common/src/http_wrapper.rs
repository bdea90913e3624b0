use std::collections::HashMap;

use http::header::{HeaderName, HeaderValue};
use http::Method;

/// Platform-neutral view of an incoming request.
///
/// The edge binary implements this for its native request type so the
/// setuid pipeline never depends on a platform SDK.
pub trait RequestWrapper {
    fn get_header(&self, name: HeaderName) -> Option<&HeaderValue>;

    fn get_method(&self) -> &Method;

    fn get_path(&self) -> &str;

    /// Raw query string without the leading `?`.
    fn get_query_str(&self) -> Option<&str>;

    /// Decoded query parameters. A repeated name keeps its first value.
    fn query_params(&self) -> HashMap<String, String> {
        let mut params = HashMap::new();
        if let Some(query) = self.get_query_str() {
            for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
                params
                    .entry(name.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
        }
        params
    }
}

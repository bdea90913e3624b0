use fastly::Request as FastlyRequest;
use http::header::{HeaderName, HeaderValue};
use http::Method;

use setuid_server_common::http_wrapper::RequestWrapper;

#[derive(Debug)]
pub struct FastlyRequestWrapper {
    request: FastlyRequest,
}

impl FastlyRequestWrapper {
    pub fn new(request: FastlyRequest) -> Self {
        FastlyRequestWrapper { request }
    }
}

impl RequestWrapper for FastlyRequestWrapper {
    #[inline(always)]
    fn get_header(&self, name: HeaderName) -> Option<&HeaderValue> {
        self.request.get_header(name)
    }

    #[inline(always)]
    fn get_method(&self) -> &Method {
        self.request.get_method()
    }

    #[inline(always)]
    fn get_path(&self) -> &str {
        self.request.get_path()
    }

    #[inline(always)]
    fn get_query_str(&self) -> Option<&str> {
        self.request.get_query_str()
    }
}

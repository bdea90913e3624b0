use error_stack::Report;
use fastly::http::header;
use fastly::Response;

use setuid_server_common::error::{IntoHttpResponse, SetuidError};

/// Plain-text response for an error raised outside the setuid pipeline.
pub fn to_error_response(report: &Report<SetuidError>) -> Response {
    let error = report.current_context();
    log::error!("Error occurred: {:?}", report);

    Response::from_status(error.status_code())
        .with_header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .with_body(format!("{}\n", error.user_message()))
}

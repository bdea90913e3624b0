use std::sync::Arc;

use bytes::Bytes;
use fastly::http::{Method, StatusCode};
use fastly::{Error, Request, Response};
use log_fastly::Logger;

use setuid_server_common::constants::SETUID_PATH;
use setuid_server_common::settings::Settings;
use setuid_server_common::setuid::{SetuidCollaborators, SetuidHandler, SyncRegistry};

mod error;
mod http_wrapper;

use crate::error::to_error_response;
use crate::http_wrapper::FastlyRequestWrapper;

#[fastly::main]
fn main(req: Request) -> Result<Response, Error> {
    init_logger();

    let settings = match Settings::new() {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to load settings: {:?}", e);
            return Ok(to_error_response(&e));
        }
    };
    log::debug!("Settings {settings:?}");

    futures::executor::block_on(route_request(&settings, req))
}

/// Routes incoming requests to the setuid pipeline. Anything else is a 404.
async fn route_request(settings: &Settings, req: Request) -> Result<Response, Error> {
    log::info!(
        "FASTLY_SERVICE_VERSION: {}",
        ::std::env::var("FASTLY_SERVICE_VERSION").unwrap_or_else(|_| String::new())
    );

    let is_setuid = req.get_method() == Method::GET && req.get_path() == SETUID_PATH;
    if !is_setuid {
        log::info!("No route matched for path: {}", req.get_path());
        return Ok(Response::from_status(StatusCode::NOT_FOUND));
    }

    let registry = Arc::new(SyncRegistry::from_settings(settings));
    let collaborators = SetuidCollaborators::from_settings(settings);
    let handler = SetuidHandler::new(settings, registry, collaborators);

    let req = FastlyRequestWrapper::new(req);
    Ok(to_fastly_response(handler.handle(&req).await))
}

fn to_fastly_response(response: http::Response<Bytes>) -> Response {
    let (parts, body) = response.into_parts();
    let mut fastly_response = Response::from_status(parts.status);
    for (name, value) in &parts.headers {
        fastly_response.append_header(name, value);
    }
    fastly_response.with_body(body.to_vec())
}

fn init_logger() {
    let logger = Logger::builder()
        .default_endpoint("setuidlog")
        .max_level(log::LevelFilter::Debug)
        .build()
        .expect("Failed to build Logger");

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                message
            ))
        })
        .chain(Box::new(logger) as Box<dyn log::Log>)
        .apply()
        .expect("Failed to initialize logger");
}

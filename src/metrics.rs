//! Metric registration and the exposition endpoint.
//!
//! Each configured pin owns one gauge on a registry shared across all
//! boards; the HTTP server exposes that registry in the Prometheus text
//! format at `/metrics`. Gauge writes and scrapes cross tasks, which the
//! prometheus primitives handle at the value level.

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

use crate::config::PinConfig;
use crate::tracing::prelude::*;

/// Register the gauge backing one configured pin.
///
/// The metric is `<prefix>_<name>` with the pin's help text and constant
/// labels. The prometheus crate rejects an empty help string, so the name
/// doubles as help when the config omits it.
pub fn register_pin_gauge(
    registry: &Registry,
    prefix: &str,
    pin: &PinConfig,
) -> Result<IntGauge, prometheus::Error> {
    let help = if pin.help.is_empty() {
        pin.name.clone()
    } else {
        pin.help.clone()
    };

    let opts = Opts::new(format!("{}_{}", prefix, pin.name), help).const_labels(pin.labels.clone());
    let gauge = IntGauge::with_opts(opts)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Serve the registry until `shutdown` is cancelled.
///
/// Returns only after the listener is done; a bind or serve failure is
/// reported to the caller, which treats it as fatal for the whole process.
pub async fn serve(
    listen: SocketAddr,
    registry: Registry,
    shutdown: CancellationToken,
) -> Result<(), hyper::Error> {
    let make_service = make_service_fn(move |_conn| {
        let registry = registry.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |request| {
                handle_request(request, registry.clone())
            }))
        }
    });

    Server::try_bind(&listen)?
        .serve(make_service)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn handle_request(
    request: Request<Body>,
    registry: Registry,
) -> Result<Response<Body>, Infallible> {
    let response = match (request.method(), request.uri().path()) {
        (&Method::GET, "/metrics") => {
            let encoder = TextEncoder::new();
            let mut buffer = Vec::new();
            match encoder.encode(&registry.gather(), &mut buffer) {
                Ok(()) => {
                    let mut response = Response::new(Body::from(buffer));
                    response
                        .headers_mut()
                        .insert(CONTENT_TYPE, HeaderValue::from_static(prometheus::TEXT_FORMAT));
                    response
                }
                Err(err) => {
                    error!(%err, "failed to encode metrics");
                    status_response(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        }
        (&Method::GET, "/health") => Response::new(Body::from("OK")),
        _ => status_response(StatusCode::NOT_FOUND),
    };

    Ok(response)
}

fn status_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn pin(name: &str, help: &str, labels: &[(&str, &str)]) -> PinConfig {
        PinConfig {
            name: name.to_string(),
            help: help.to_string(),
            port: "b".to_string(),
            pin: 0,
            pull_up: false,
            revert: false,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    fn exposition(registry: &Registry) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn gauge_is_prefixed_and_labeled() {
        let registry = Registry::new();
        let gauge = register_pin_gauge(
            &registry,
            "ioboard",
            &pin("door_open", "Door contact state", &[("location", "garage")]),
        )
        .unwrap();

        gauge.set(1);
        let text = exposition(&registry);
        assert!(text.contains("# HELP ioboard_door_open Door contact state"));
        assert!(text.contains("ioboard_door_open{location=\"garage\"} 1"));
    }

    #[test]
    fn empty_help_falls_back_to_name() {
        let registry = Registry::new();
        register_pin_gauge(&registry, "ioboard", &pin("door", "", &[])).unwrap();

        assert!(exposition(&registry).contains("# HELP ioboard_door door"));
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let registry = Registry::new();
        let config = pin("door", "", &[]);

        register_pin_gauge(&registry, "ioboard", &config).unwrap();
        assert!(register_pin_gauge(&registry, "ioboard", &config).is_err());
    }
}

//! Pushes with the OTLP/HTTP protocol selected

use std::time::Duration;

use httpmock::prelude::*;

use metrics_relay::core::RelaySettings;
use metrics_relay::core::config::{ExportConfig, ExportProtocol, Pipeline};
use metrics_relay::{InvocationHandler, RelayError, RelayRequest, RelayResponse, Sample, SampleValue};

const METRICS_PATH: &str = "/v1/metrics";

fn handler(endpoint: String, vars: &[(&str, &str)]) -> InvocationHandler {
    let export = ExportConfig::from_lookup(|key| match key {
        "ENDPOINT" => Some(endpoint.clone()),
        _ => vars
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string()),
    })
    .with_protocol(ExportProtocol::Otlp)
    .with_push_interval(Duration::from_secs(60));

    InvocationHandler::new(RelaySettings {
        export,
        pipeline: Pipeline::default(),
        post_flush_grace: Duration::ZERO,
    })
}

fn batch() -> RelayRequest {
    RelayRequest {
        metrics: vec![Sample::new("latency", SampleValue::Float(12.5)).with_label("route", "/a")],
    }
}

#[test]
fn test_otlp_push_with_basic_auth() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(METRICS_PATH)
            .header("content-type", "application/x-protobuf")
            .header("authorization", "Basic YWxpY2U6c2VjcmV0")
            .header_missing("x-prometheus-remote-write-version");
        then.status(200);
    });

    let outcome = handler(
        server.url(METRICS_PATH),
        &[("USERNAME", "alice"), ("PASSWORD", "secret")],
    )
    .handle(&batch());

    assert_eq!(outcome.response, RelayResponse::ok());
    mock.assert();
}

#[test]
fn test_otlp_rejected_push_is_an_error() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(METRICS_PATH);
        then.status(500);
    });

    let outcome = handler(server.url(METRICS_PATH), &[]).handle(&batch());

    assert_eq!(outcome.response, RelayResponse::error());
    assert!(outcome.error().is_some_and(RelayError::is_transport));
    mock.assert();
}

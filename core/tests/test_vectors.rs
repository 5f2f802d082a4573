//! Verify the petstore bindings against JSON test vectors in `test-vectors/`.
//!
//! Each case names an operation and its arguments, the request the client
//! must send, a simulated server response and either the decoded result or
//! the expected error. Bodies are compared as parsed JSON, not raw strings,
//! so field ordering never causes false negatives.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use petstore_core::petstore;
use petstore_core::{
    ApiError, Args, ClientConfig, Headers, HttpMethod, HttpRequest, HttpResponse, Transport,
    TransportError,
};
use serde_json::Value;

/// Replays one simulated response and keeps what it was sent.
struct Replay {
    response: HttpResponse,
    seen: Mutex<Vec<HttpRequest>>,
}

#[async_trait]
impl Transport for Replay {
    async fn send(&self, request: &HttpRequest, _timeout: Duration) -> Result<HttpResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(self.response.clone())
    }
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        "PATCH" => HttpMethod::Patch,
        other => panic!("unknown method: {other}"),
    }
}

fn simulated(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    if sim.is_null() {
        return HttpResponse {
            status: 599,
            headers: Headers::new(),
            body: Bytes::new(),
        };
    }
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Headers::new(),
        body: Bytes::from(sim["body"].as_str().unwrap().to_string()),
    }
}

fn args(case: &Value) -> Args {
    case["args"]
        .as_object()
        .unwrap()
        .iter()
        .fold(Args::new(), |args, (name, value)| args.value(name, value.clone()))
}

fn check_request(name: &str, base_url: &str, sent: &HttpRequest, expected: &Value) {
    assert_eq!(sent.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
    assert_eq!(sent.url, format!("{base_url}{}", expected["url"].as_str().unwrap()), "{name}: url");

    for (header, value) in expected["headers"].as_object().unwrap() {
        assert_eq!(sent.headers.get(header), value.as_str(), "{name}: header {header}");
    }

    if let Some(text) = expected.get("body_text") {
        let body = sent.body.as_deref().expect("body was sent");
        assert_eq!(std::str::from_utf8(body).unwrap(), text.as_str().unwrap(), "{name}: body");
    } else if expected["body"].is_null() {
        assert!(sent.body.is_none(), "{name}: body should be None");
    } else {
        let body: Value = serde_json::from_slice(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, expected["body"], "{name}: body");
    }
}

fn check_error(name: &str, err: &ApiError, expected: &Value) {
    let kind = expected["kind"].as_str().unwrap();
    let expected_name = expected["name"].as_str();
    let expected_status = expected["status"].as_u64().map(|s| s as u16);
    match (kind, err) {
        ("Status", ApiError::Status { status, .. }) => {
            assert_eq!(Some(*status), expected_status, "{name}: status")
        }
        ("ResponseDecode", ApiError::ResponseDecode { status, .. }) => {
            assert_eq!(Some(*status), expected_status, "{name}: status")
        }
        ("MissingParameter", ApiError::MissingParameter { name: param })
        | ("InvalidArgument", ApiError::InvalidArgument { name: param, .. })
        | ("UnknownOperation", ApiError::UnknownOperation { name: param }) => {
            assert_eq!(Some(param.as_str()), expected_name, "{name}: parameter")
        }
        _ => panic!("{name}: expected {kind}, got {err:?}"),
    }
}

#[tokio::test]
async fn petstore_test_vectors() {
    let raw = include_str!("../../test-vectors/petstore.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let base_url = vectors["base_url"].as_str().unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let transport = Arc::new(Replay {
            response: simulated(case),
            seen: Mutex::new(Vec::new()),
        });
        let config = ClientConfig::builder(base_url)
            .transport(transport.clone())
            .build()
            .unwrap();
        let client = petstore::client(config).unwrap();

        let result = client
            .invoke::<Value>(case["operation"].as_str().unwrap(), args(case))
            .await;

        // Verify the request, or that none was sent.
        let seen = transport.seen.lock().unwrap().clone();
        match case.get("expected_request") {
            Some(expected) => {
                assert_eq!(seen.len(), 1, "{name}: exactly one request");
                check_request(name, base_url, &seen[0], expected);
            }
            None => assert!(seen.is_empty(), "{name}: no request expected"),
        }

        // Verify the outcome.
        match (case.get("expected_error"), result) {
            (Some(expected), Err(err)) => check_error(name, &err, expected),
            (Some(expected), Ok(response)) => {
                panic!("{name}: expected {expected}, got {:?}", response.data)
            }
            (None, Ok(response)) => {
                assert_eq!(response.data, case["expected_result"], "{name}: decoded result")
            }
            (None, Err(err)) => panic!("{name}: unexpected error {err:?}"),
        }
    }
}

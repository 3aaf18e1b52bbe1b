use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

use run_stream_http::headers::{
    build_headers, default_user_agent, HEADER_CONTENT_TYPE, HEADER_USER_AGENT, JSON_CONTENT_TYPE,
};
use run_stream_http::{FormBody, HttpStreamConfig, StreamRequest};

fn json_body() -> Map<String, Value> {
    match json!({"message": "hi"}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[test]
fn json_body_gets_json_content_type() {
    let request = StreamRequest::json("http://localhost/x", json_body());
    let headers = build_headers(&HttpStreamConfig::default(), &request);

    assert_eq!(
        headers.get(HEADER_CONTENT_TYPE).map(String::as_str),
        Some(JSON_CONTENT_TYPE)
    );
}

#[test]
fn form_body_never_carries_content_type() {
    let request = StreamRequest::form("http://localhost/x", FormBody::new().text("message", "hi"))
        .header("Content-Type", "text/plain");
    let config = HttpStreamConfig::default().insert_header("content-type", "application/json");
    let headers = build_headers(&config, &request);

    assert!(headers.get(HEADER_CONTENT_TYPE).is_none());
}

#[test]
fn request_headers_override_config_and_defaults() {
    let config = HttpStreamConfig::default()
        .with_user_agent("configured-agent")
        .insert_header("X-Tenant", "config")
        .insert_header("x-trace", "from-config");
    let request = StreamRequest::json("http://localhost/x", json_body())
        .header("X-Tenant", "request")
        .header("Content-Type", "application/json; charset=utf-8")
        .header("User-Agent", "caller");
    let headers = build_headers(&config, &request);

    assert_eq!(headers.get("x-tenant").map(String::as_str), Some("request"));
    assert_eq!(headers.get("x-trace").map(String::as_str), Some("from-config"));
    assert_eq!(
        headers.get(HEADER_CONTENT_TYPE).map(String::as_str),
        Some("application/json; charset=utf-8")
    );
    assert_eq!(headers.get(HEADER_USER_AGENT).map(String::as_str), Some("caller"));
}

#[test]
fn user_agent_defaults_to_platform_string() {
    let request = StreamRequest::json("http://localhost/x", json_body());
    let headers = build_headers(&HttpStreamConfig::default(), &request);

    let ua = headers.get(HEADER_USER_AGENT).expect("user-agent");
    assert_eq!(ua, &default_user_agent());
    assert!(ua.starts_with("run-stream/"));
}

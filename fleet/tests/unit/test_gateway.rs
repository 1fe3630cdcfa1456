//! Panel gateway tests

use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wpfleet::audit::{EventCategory, Outcome, RiskLevel};
use wpfleet::codec::PhpValue;
use wpfleet::errors::FleetError;
use wpfleet::http::PanelClient;

use crate::common::{client_for, memory_auditor, panel_settings, php_body, API_PATH};

#[tokio::test]
async fn test_call_decodes_payload() {
    let server = MockServer::start().await;
    let payload = PhpValue::map([("installations", PhpValue::Array(vec![]))]);
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("act", "wordpress"))
        .and(query_param("api", "serialize"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(php_body(&payload)))
        .expect(1)
        .mount(&server)
        .await;

    let (log, client) = client_for(&server);
    let value = client.call("wordpress", None, None).await.unwrap();
    assert_eq!(value, payload);

    let events = log.by_category(EventCategory::ApiCall);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, "wordpress");
    assert_eq!(events[0].outcome, Outcome::Success);
    assert_eq!(events[0].details["method"], "GET");
    assert!(events[0].details.contains_key("elapsed_ms"));
}

#[tokio::test]
async fn test_call_non_200_is_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let (log, client) = client_for(&server);
    let err = client.call("wordpress", None, None).await.unwrap_err();
    assert!(matches!(err, FleetError::Remote { status: 500, .. }));
    assert!(err.to_string().contains("500"));
    assert!(err.to_string().contains("Internal Server Error"));

    let events = log.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, Outcome::Failure);
    assert_eq!(events[0].risk, RiskLevel::Medium);
    assert_eq!(events[0].details["status"], 500);
}

#[tokio::test]
async fn test_undecodable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Login</html>"))
        .mount(&server)
        .await;

    let (_, client) = client_for(&server);
    let err = client.call("wordpress", None, None).await.unwrap_err();
    assert!(matches!(err, FleetError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_post_when_body_given() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(query_param("act", "backup"))
        .and(query_param("insid", "26_1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(php_body(&PhpValue::map([(
                "done",
                PhpValue::Bool(true),
            )]))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (log, client) = client_for(&server);
    client
        .call("backup", Some(&[("backupins", "1")][..]), Some(&[("insid", "26_1")][..]))
        .await
        .unwrap();

    let events = log.events();
    assert_eq!(events[0].details["method"], "POST");
    assert_eq!(events[0].insid.as_deref(), Some("26_1"));
}

#[tokio::test]
async fn test_no_session_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (log, auditor) = memory_auditor();
    let client = PanelClient::new(panel_settings(), None, auditor).unwrap();
    let err = client.call("wordpress", None, None).await.unwrap_err();
    assert!(matches!(err, FleetError::NotAuthenticated));
    assert!(client.endpoint().is_err());

    // The attempt is still on record
    assert_eq!(log.len(), 1);
    assert_eq!(log.events()[0].outcome, Outcome::Failure);
}

#[tokio::test]
async fn test_probe_marks_event() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let (log, client) = client_for(&server);
    assert!(client.probe().await.is_err());

    let events = log.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].details["probe"], true);
    assert!(events[0].is_security_relevant());
}

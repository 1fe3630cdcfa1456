//! Audit trail tests through the command layer

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wpfleet::app::options::CliArgs;
use wpfleet::app::run::run;
use wpfleet::app::state::AppState;
use wpfleet::audit::{EventCategory, Outcome, RiskLevel};
use wpfleet::codec::PhpValue;
use wpfleet::storage::layout::StorageLayout;
use wpfleet::storage::settings::Settings;

use crate::common::{panel_settings, php_body, API_PATH};

fn settings() -> Settings {
    Settings {
        panel: panel_settings(),
        ..Default::default()
    }
}

fn login_args(server: &MockServer) -> CliArgs {
    CliArgs::parse([
        "login".to_string(),
        "--host=127.0.0.1".to_string(),
        format!("--port={}", server.address().port()),
        "--user=clas".to_string(),
        "--password=s3cret".to_string(),
    ])
}

#[tokio::test]
async fn test_login_and_logout_are_audited() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(tmp.path());
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(php_body(&PhpValue::map([(
                "installations",
                PhpValue::Null,
            )]))),
        )
        .mount(&server)
        .await;

    let state = AppState::init(layout.clone(), settings()).await.unwrap();
    assert!(state.session.is_none());
    run(&state, &login_args(&server)).await.unwrap();
    assert!(layout.session_file().path().exists());

    let log = state.audit_log.clone();
    let auth = log
        .tail(&log.category_file(EventCategory::Authentication), 10)
        .unwrap();
    assert_eq!(auth.len(), 1);
    assert_eq!(auth[0].action, "LOGIN");
    assert_eq!(auth[0].outcome, Outcome::Success);
    assert_eq!(auth[0].actor, "clas");

    // A new process picks the session up and stamps its id on events
    let state = AppState::init(layout.clone(), settings()).await.unwrap();
    let session_id = state.session.as_ref().unwrap().session_id.clone();
    assert_eq!(state.auditor.context().session_id, session_id);
    assert_eq!(auth[0].session_id, session_id);

    run(&state, &CliArgs::parse(["logout"])).await.unwrap();
    assert!(!layout.session_file().path().exists());

    let auth = log
        .tail(&log.category_file(EventCategory::Authentication), 10)
        .unwrap();
    assert_eq!(auth.len(), 2);
    assert_eq!(auth[1].action, "LOGOUT");
    assert_eq!(auth[1].session_id, session_id);
}

#[tokio::test]
async fn test_failed_login_is_high_risk_and_leaves_no_session() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(tmp.path());
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let state = AppState::init(layout.clone(), settings()).await.unwrap();
    let err = run(&state, &login_args(&server)).await.unwrap_err();
    assert!(err.to_string().contains("401"));
    assert!(!layout.session_file().path().exists());

    let log = state.audit_log.clone();
    let security = log.tail(&log.security_file(), 10).unwrap();
    // The failed probe and the failed login
    assert_eq!(security.len(), 2);
    assert_eq!(security[0].category, EventCategory::ApiCall);
    assert_eq!(security[1].category, EventCategory::Authentication);
    assert_eq!(security[1].risk, RiskLevel::High);

    let today = log.main_file(chrono::Utc::now().date_naive());
    assert_eq!(log.tail(&today, 100).unwrap().len(), 2);
}

#[tokio::test]
async fn test_commands_need_a_session() {
    let tmp = tempfile::tempdir().unwrap();
    let state = AppState::init(StorageLayout::new(tmp.path()), settings())
        .await
        .unwrap();

    let err = run(&state, &CliArgs::parse(["sites"])).await.unwrap_err();
    assert!(err.to_string().contains("login"));

    let log = state.audit_log.clone();
    let calls = log.tail(&log.category_file(EventCategory::ApiCall), 10).unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].actor, "anonymous");
}

#[tokio::test]
async fn test_unknown_command_and_missing_options() {
    let tmp = tempfile::tempdir().unwrap();
    let state = AppState::init(StorageLayout::new(tmp.path()), settings())
        .await
        .unwrap();

    assert!(run(&state, &CliArgs::parse(["frobnicate"])).await.is_err());
    assert!(run(&state, &CliArgs::parse(["plugins"])).await.is_err());
    assert!(run(&state, &CliArgs::parse(["audit", "--category=nope"]))
        .await
        .is_err());
    assert!(run(&state, &CliArgs::parse(["audit"])).await.is_ok());
}

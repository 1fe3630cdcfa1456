//! Site operation tests against a mocked panel

use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wpfleet::audit::{EventCategory, Outcome, RiskLevel};
use wpfleet::codec::PhpValue;
use wpfleet::errors::FleetError;

use crate::common::{client_for, php_body, API_PATH};

fn ok_body() -> Vec<u8> {
    php_body(&PhpValue::map([("done", PhpValue::Bool(true))]))
}

fn installation(domain: &str, dir: &str) -> PhpValue {
    PhpValue::map([
        ("softurl", PhpValue::text(format!("https://{domain}/{dir}"))),
        ("softpath", PhpValue::text(format!("/home/clas/public_html/{dir}"))),
        ("ver", PhpValue::text("6.5.2")),
        ("cuser", PhpValue::text("clas")),
        ("softdomain", PhpValue::text(domain)),
        ("softdirectory", PhpValue::text(dir)),
    ])
}

#[tokio::test]
async fn test_single_plugin_update_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(query_param("act", "wordpress"))
        .and(body_string_contains("insid=42"))
        .and(body_string_contains("type=plugins"))
        .and(body_string_contains("slug=akismet"))
        .and(body_string_contains("update=1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ok_body()))
        .expect(1)
        .mount(&server)
        .await;

    let (log, client) = client_for(&server);
    client.update_plugins("42", Some("akismet")).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(!body.contains("bulk_update"));

    let access = log.by_category(EventCategory::SiteAccess);
    assert_eq!(access.len(), 1);
    assert_eq!(access[0].action, "PLUGIN_UPDATE");
    assert_eq!(access[0].insid.as_deref(), Some("42"));
    assert_eq!(access[0].details["slug"], "akismet");
    assert_eq!(access[0].risk, RiskLevel::Medium);
    assert_eq!(log.by_category(EventCategory::ApiCall).len(), 1);
}

#[tokio::test]
async fn test_bulk_plugin_update_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_string_contains("bulk_update=1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ok_body()))
        .expect(1)
        .mount(&server)
        .await;

    let (log, client) = client_for(&server);
    client.update_plugins("42", None).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(!body.contains("slug="));
    assert_eq!(log.by_action("PLUGIN_BULK_UPDATE").len(), 1);
}

#[tokio::test]
async fn test_list_installations() {
    let server = MockServer::start().await;
    let payload = PhpValue::map([(
        "installations",
        PhpValue::map([
            ("26_1", installation("clas.example.edu", "")),
            ("26_2", installation("clas.example.edu", "news")),
        ]),
    )]);
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("act", "wordpress"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(php_body(&payload)))
        .mount(&server)
        .await;

    let (log, client) = client_for(&server);
    let sites = client.list_installations().await.unwrap();
    assert_eq!(sites.len(), 2);
    assert_eq!(sites[0].insid, "26_1");
    assert_eq!(sites[1].display_name, "clas.example.edu/news");
    assert_eq!(sites[1].path, "/home/clas/public_html/news");

    // Reads leave no site access trail
    assert!(log.by_category(EventCategory::SiteAccess).is_empty());
}

#[tokio::test]
async fn test_missing_installations_key_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ok_body()))
        .mount(&server)
        .await;

    let (_, client) = client_for(&server);
    let err = client.list_installations().await.unwrap_err();
    assert!(matches!(err, FleetError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_upgrade_core_submits_upgrade() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(query_param("act", "upgrade"))
        .and(query_param("insid", "26_1"))
        .and(body_string_contains("softsubmit=1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ok_body()))
        .expect(1)
        .mount(&server)
        .await;

    let (log, client) = client_for(&server);
    client.upgrade_core("26_1").await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(String::from_utf8_lossy(&received[0].body), "softsubmit=1");

    let access = log.by_action("CORE_UPDATE");
    assert_eq!(access.len(), 1);
    assert_eq!(access[0].category, EventCategory::SiteAccess);
    assert_eq!(access[0].outcome, Outcome::Success);
}

#[tokio::test]
async fn test_vendor_error_fails_operation() {
    let server = MockServer::start().await;
    let payload = PhpValue::map([(
        "error",
        PhpValue::map([("upgrade", PhpValue::text("Installation is up to date"))]),
    )]);
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(query_param("act", "upgrade"))
        .and(query_param("insid", "26_1"))
        .and(body_string_contains("softsubmit=1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(php_body(&payload)))
        .mount(&server)
        .await;

    let (log, client) = client_for(&server);
    let err = client.upgrade_core("26_1").await.unwrap_err();
    assert!(matches!(err, FleetError::VendorError(_)));
    assert!(err.to_string().contains("Installation is up to date"));

    let access = log.by_action("CORE_UPDATE");
    assert_eq!(access.len(), 1);
    assert_eq!(access[0].outcome, Outcome::Failure);
    assert!(access[0].details["error"]
        .as_str()
        .unwrap()
        .contains("up to date"));
}

#[tokio::test]
async fn test_create_backup_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(query_param("act", "backup"))
        .and(query_param("insid", "26_1"))
        .and(body_string_contains("backupins=1"))
        .and(body_string_contains("backup_dir=1"))
        .and(body_string_contains("backup_datadir=1"))
        .and(body_string_contains("backup_db=1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ok_body()))
        .expect(1)
        .mount(&server)
        .await;

    let (log, client) = client_for(&server);
    client.create_backup("26_1").await.unwrap();

    let access = log.by_action("BACKUP_CREATE");
    assert_eq!(access.len(), 1);
    assert_eq!(access[0].risk, RiskLevel::Low);
}

#[tokio::test]
async fn test_plugin_toggles_and_install() {
    let server = MockServer::start().await;
    for flag in ["activate=1", "deactivate=1", "install=1"] {
        Mock::given(method("POST"))
            .and(path(API_PATH))
            .and(body_string_contains("slug=classic-editor"))
            .and(body_string_contains(flag))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(ok_body()))
            .mount(&server)
            .await;
    }

    let (log, client) = client_for(&server);
    client.activate_plugin("26_1", "classic-editor").await.unwrap();
    client.deactivate_plugin("26_1", "classic-editor").await.unwrap();
    client.install_plugin("26_1", "classic-editor").await.unwrap();

    let actions: Vec<String> = log
        .by_category(EventCategory::SiteAccess)
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec!["PLUGIN_ACTIVATE", "PLUGIN_DEACTIVATE", "PLUGIN_INSTALL"]
    );
}

#[tokio::test]
async fn test_list_plugins() {
    let server = MockServer::start().await;
    let payload = PhpValue::map([(
        "plugins",
        PhpValue::map([(
            "akismet/akismet.php",
            PhpValue::map([
                ("Name", PhpValue::text("Akismet Anti-spam")),
                ("Version", PhpValue::text("5.3")),
                ("active", PhpValue::Int(1)),
            ]),
        )]),
    )]);
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_string_contains("list=1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(php_body(&payload)))
        .mount(&server)
        .await;

    let (_, client) = client_for(&server);
    let plugins = client.list_plugins("26_1").await.unwrap();
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].slug, "akismet/akismet.php");
    assert!(plugins[0].active);
    assert!(!plugins[0].update_available);
}

#[tokio::test]
async fn test_backup_download_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("act", "backups"))
        .and(query_param("download", "wp.26_1.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04zip".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("act", "backups"))
        .and(query_param("remove", "wp.26_1.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ok_body()))
        .mount(&server)
        .await;

    let (log, client) = client_for(&server);
    let bytes = client.download_backup("wp.26_1.zip").await.unwrap();
    assert_eq!(bytes, b"PK\x03\x04zip");

    client.delete_backup("wp.26_1.zip").await.unwrap();
    let deleted = log.by_action("BACKUP_DELETE");
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].insid, None);
    assert_eq!(deleted[0].details["filename"], "wp.26_1.zip");
    assert_eq!(log.by_category(EventCategory::ApiCall).len(), 2);
}

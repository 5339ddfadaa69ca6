use super::*;
use crate::api::transport::KEYRING_HEADER;
use crate::core::ExportError;
use crate::testing::{batch_response, photo_xml, soap_response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{body_string_contains, header, method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GALLERY_ID: i64 = 42;

fn action(name: &str) -> String {
    format!("http://www.zenfolio.com/api/1.8/{name}")
}

fn config_for(server: &MockServer, dir: &TempDir) -> ExportConfig {
    ExportConfig::builder()
        .api_url(format!("{}/api", server.uri()))
        .download_folder(dir.path().join("out"))
        .credentials("someone", "secret")
        .retry_delay(Duration::from_millis(5))
        .request_timeout(Duration::from_secs(5))
        .build()
}

fn gallery_folder(dir: &TempDir) -> PathBuf {
    dir.path().join("out").join("Root").join("Wedding")
}

async fn mount_api(server: &MockServer, method_name: &str, status: u16, body: String) {
    Mock::given(method("POST"))
        .and(header("SOAPAction", action(method_name).as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_login(server: &MockServer) {
    let challenge = format!(
        "<Challenge>{}</Challenge><PasswordSalt>{}</PasswordSalt>",
        STANDARD.encode(b"challenge"),
        STANDARD.encode(b"salt")
    );
    mount_api(server, "GetChallenge", 200, soap_response("GetChallenge", &challenge)).await;
    mount_api(server, "Authenticate", 200, soap_response("Authenticate", "session-token")).await;
}

async fn mount_single_gallery(server: &MockServer, gallery_details: &str) {
    let tree = format!(
        "<Id>1</Id><Title>Root</Title><Elements>\
         <PhotoSet><Id>{GALLERY_ID}</Id><Title>Wedding</Title></PhotoSet></Elements>"
    );
    mount_api(server, "LoadGroupHierarchy", 200, soap_response("LoadGroupHierarchy", &tree)).await;
    mount_api(server, "LoadPhotoSet", 200, soap_response("LoadPhotoSet", gallery_details)).await;
}

async fn mount_listing_page(server: &MockServer, offset: usize, body: String) {
    Mock::given(method("POST"))
        .and(header("SOAPAction", action("LoadPhotoSetPhotos").as_str()))
        .and(body_string_contains(format!("<zf:startingIndex>{offset}</zf:startingIndex>")))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_metadata(server: &MockServer) {
    let photo = "<Title>&lt;strong&gt;Vows&lt;/strong&gt;</Title><Caption>First dance</Caption>\
                 <Copyright>Studio</Copyright><Keywords><string>wedding</string></Keywords>";
    mount_api(server, "LoadPhoto", 200, soap_response("LoadPhoto", photo)).await;
}

async fn mount_assets(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/media/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
        .mount(server)
        .await;
}

/// One gallery "Root/Wedding" with twelve JPEG items over two pages
async fn twelve_item_account(server: &MockServer) {
    let base = server.uri();
    mount_login(server).await;
    mount_single_gallery(server, "<Id>42</Id><Title>Wedding</Title>").await;
    mount_listing_page(server, 0, batch_response(&base, 1, 10)).await;
    mount_listing_page(server, 10, batch_response(&base, 11, 2)).await;
    mount_listing_page(server, 20, batch_response(&base, 21, 0)).await;
    mount_metadata(server).await;
    mount_assets(server).await;
}

async fn count_requests(server: &MockServer, predicate: impl Fn(&wiremock::Request) -> bool) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| predicate(r))
        .count()
}

fn is_soap(request: &wiremock::Request, method_name: &str) -> bool {
    request
        .headers
        .get("SOAPAction")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == action(method_name))
}

#[tokio::test]
async fn full_run_downloads_every_item_with_sidecars() {
    let server = MockServer::start().await;
    twelve_item_account(&server).await;
    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);

    let summary = run(&config, &HttpTransport::new(&config).unwrap(), None).await.unwrap();

    let folder = gallery_folder(&dir);
    for id in 1..=12 {
        assert_eq!(std::fs::read(folder.join(format!("IMG_{id}.jpg"))).unwrap(), b"jpeg-bytes");
        assert!(folder.join(format!("IMG_{id}.xmp")).exists());
    }
    let xmp = std::fs::read_to_string(folder.join("IMG_1.xmp")).unwrap();
    assert!(xmp.contains(">Vows<"));
    assert!(xmp.contains("<rdf:li>wedding</rdf:li>"));
    assert!(xmp.contains("<xmp:CreateDate>1900:01:01 00:00:00</xmp:CreateDate>"));

    assert_eq!(summary.galleries_found, 1);
    assert_eq!(summary.metrics.items_downloaded, 12);
    assert_eq!(summary.metrics.sidecars_written, 12);
    assert_eq!(summary.metrics.listing_calls, 3);
    assert!(summary.ledger.is_clean());
    assert!(!summary.has_failures());
}

#[tokio::test]
async fn rerun_skips_items_already_on_disk() {
    let server = MockServer::start().await;
    twelve_item_account(&server).await;
    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);
    let transport = HttpTransport::new(&config).unwrap();

    run(&config, &transport, None).await.unwrap();
    let second = run(&config, &transport, None).await.unwrap();

    assert_eq!(second.metrics.items_downloaded, 0);
    assert_eq!(second.metrics.items_present, 12);
    assert_eq!(count_requests(&server, |r| r.method.as_str() == "GET").await, 12);
    assert_eq!(count_requests(&server, |r| is_soap(r, "LoadPhoto")).await, 12);
}

#[tokio::test]
async fn unknown_type_is_saved_as_dat_without_sidecar() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_login(&server).await;
    mount_single_gallery(&server, "<Id>42</Id>").await;
    let photo = photo_xml(1, &format!("{base}/media/blob"), "scan", "application/octet-stream");
    mount_listing_page(&server, 0, soap_response("LoadPhotoSetPhotos", &photo)).await;
    mount_listing_page(&server, 10, batch_response(&base, 2, 0)).await;
    mount_metadata(&server).await;
    mount_assets(&server).await;
    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);

    let summary = run(&config, &HttpTransport::new(&config).unwrap(), None).await.unwrap();

    let folder = gallery_folder(&dir);
    assert!(folder.join("scan.dat").exists());
    assert!(!folder.join("scan.xmp").exists());
    assert_eq!(summary.metrics.items_downloaded, 1);
    assert_eq!(summary.metrics.sidecars_written, 0);
}

#[tokio::test]
async fn archived_gallery_is_recorded_as_skipped() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_single_gallery(&server, "<Id>42</Id><Title>Wedding</Title>").await;
    mount_api(&server, "LoadPhotoSetPhotos", 500, "Photo set is archived".to_string()).await;
    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let progress: ProgressCallback = Arc::new(move |event: ProgressEvent| sink.lock().unwrap().push(event));

    let summary = run(&config, &HttpTransport::new(&config).unwrap(), Some(progress))
        .await
        .unwrap();

    let skipped = std::fs::read_to_string(config.skipped_albums_path()).unwrap();
    assert_eq!(skipped, "Gallery:42\n");
    assert_eq!(summary.metrics.galleries_skipped, 1);
    assert_eq!(summary.metrics.listing_calls, 1);
    assert!(summary.has_skips());
    assert!(summary.report_lines().iter().any(|l| l.contains("restored")));
    assert!(
        events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, ProgressEvent::GallerySkipped { gallery_id: GALLERY_ID }))
    );
}

#[tokio::test]
async fn exhausted_listing_is_recorded_with_offset() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_login(&server).await;
    mount_single_gallery(&server, "<Id>42</Id><Title>Wedding</Title>").await;
    mount_listing_page(&server, 0, batch_response(&base, 1, 10)).await;
    Mock::given(method("POST"))
        .and(body_string_contains("<zf:startingIndex>10</zf:startingIndex>"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;
    mount_metadata(&server).await;
    mount_assets(&server).await;
    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);

    let summary = run(&config, &HttpTransport::new(&config).unwrap(), None).await.unwrap();

    let failed = std::fs::read_to_string(config.failed_downloads_path()).unwrap();
    assert_eq!(failed, "Gallery:42:10\n");
    assert_eq!(summary.metrics.items_downloaded, 10);
    assert_eq!(summary.metrics.galleries_abandoned, 1);
    assert_eq!(summary.metrics.listing_calls, 4);
    assert_eq!(summary.metrics.retries_attempted, 2);
    assert_eq!(summary.ledger.failed_entries(), 1);
}

#[tokio::test]
async fn troubled_galleries_do_not_stop_later_ones() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_login(&server).await;
    let tree = "<Id>1</Id><Title>Root</Title><Elements>\
                <PhotoSet><Id>40</Id><Title>Vault</Title></PhotoSet>\
                <PhotoSet><Id>41</Id><Title>Flaky</Title></PhotoSet>\
                <PhotoSet><Id>42</Id><Title>Wedding</Title></PhotoSet></Elements>";
    mount_api(&server, "LoadGroupHierarchy", 200, soap_response("LoadGroupHierarchy", tree)).await;
    mount_api(&server, "LoadPhotoSet", 200, soap_response("LoadPhotoSet", "<Id>0</Id>")).await;
    Mock::given(method("POST"))
        .and(body_string_contains("<zf:photoSetId>40</zf:photoSetId>"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Photo set is archived"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("<zf:photoSetId>41</zf:photoSetId>"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;
    mount_listing_page(&server, 0, batch_response(&base, 1, 2)).await;
    mount_listing_page(&server, 10, batch_response(&base, 3, 0)).await;
    mount_metadata(&server).await;
    mount_assets(&server).await;
    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);

    let summary = run(&config, &HttpTransport::new(&config).unwrap(), None).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(config.skipped_albums_path()).unwrap(),
        "Gallery:40\n"
    );
    assert_eq!(
        std::fs::read_to_string(config.failed_downloads_path()).unwrap(),
        "Gallery:41:0\n"
    );
    assert!(gallery_folder(&dir).join("IMG_1.jpg").exists());
    assert!(gallery_folder(&dir).join("IMG_2.jpg").exists());
    assert_eq!(summary.galleries_found, 3);
    assert_eq!(summary.metrics.galleries_visited, 3);
    assert_eq!(summary.metrics.galleries_skipped, 1);
    assert_eq!(summary.metrics.galleries_abandoned, 1);
    assert_eq!(summary.metrics.items_downloaded, 2);
}

#[tokio::test]
async fn failed_asset_is_logged_and_run_continues() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_login(&server).await;
    mount_single_gallery(&server, "<Id>42</Id><Title>Wedding</Title>").await;
    mount_listing_page(&server, 0, batch_response(&base, 1, 3)).await;
    mount_listing_page(&server, 10, batch_response(&base, 4, 0)).await;
    mount_metadata(&server).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/media/2\.jpg$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_assets(&server).await;
    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);

    let summary = run(&config, &HttpTransport::new(&config).unwrap(), None).await.unwrap();

    let failed = std::fs::read_to_string(config.failed_downloads_path()).unwrap();
    assert_eq!(failed, format!("Wedding\n2:{base}/media/2.jpg\n"));
    assert_eq!(summary.metrics.items_downloaded, 2);
    assert_eq!(summary.metrics.items_failed, 1);
    assert!(!gallery_folder(&dir).join("IMG_2.jpg").exists());
    assert!(summary.report_lines().iter().any(|l| l.contains("1 entries")));
}

#[tokio::test]
async fn restricted_gallery_is_listed_with_unlocked_keyring() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_login(&server).await;
    mount_single_gallery(
        &server,
        "<Id>42</Id><Title>Wedding</Title><AccessDescriptor><RealmId>77</RealmId></AccessDescriptor>",
    )
    .await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", action("KeyringAddKeyPlain").as_str()))
        .and(body_string_contains("<zf:realmId>77</zf:realmId>"))
        .and(body_string_contains("<zf:password>gallery-pass</zf:password>"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(soap_response("KeyringAddKeyPlain", "ring-1")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", action("LoadPhotoSetPhotos").as_str()))
        .and(header(KEYRING_HEADER, "ring-1"))
        .and(body_string_contains("<zf:startingIndex>0</zf:startingIndex>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(batch_response(&base, 1, 1)))
        .mount(&server)
        .await;
    mount_listing_page(&server, 10, batch_response(&base, 2, 0)).await;
    mount_metadata(&server).await;
    mount_assets(&server).await;
    let dir = tempdir().unwrap();
    let mut config = config_for(&server, &dir);
    config.realm_password = Some("gallery-pass".to_string());

    let summary = run(&config, &HttpTransport::new(&config).unwrap(), None).await.unwrap();

    assert_eq!(summary.metrics.items_downloaded, 1);
    assert!(gallery_folder(&dir).join("IMG_1.jpg").exists());
}

#[tokio::test]
async fn rejected_login_aborts_the_run() {
    let server = MockServer::start().await;
    let challenge = format!(
        "<Challenge>{}</Challenge><PasswordSalt>{}</PasswordSalt>",
        STANDARD.encode(b"challenge"),
        STANDARD.encode(b"salt")
    );
    mount_api(&server, "GetChallenge", 200, soap_response("GetChallenge", &challenge)).await;
    mount_api(&server, "Authenticate", 500, "invalid credentials".to_string()).await;
    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);

    let result = run(&config, &HttpTransport::new(&config).unwrap(), None).await;

    assert!(matches!(result, Err(ExportError::Auth { .. })));
    assert_eq!(count_requests(&server, |r| is_soap(r, "LoadGroupHierarchy")).await, 0);
}

#[tokio::test]
async fn unavailable_hierarchy_ends_with_empty_summary() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_api(&server, "LoadGroupHierarchy", 500, "server error".to_string()).await;
    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);

    let summary = run(&config, &HttpTransport::new(&config).unwrap(), None).await.unwrap();

    assert_eq!(summary.galleries_found, 0);
    assert_eq!(summary.metrics, RunMetricsSnapshot::default());
    assert!(summary.ledger.is_clean());
}

#[tokio::test]
async fn invalid_config_fails_before_any_request() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let mut config = config_for(&server, &dir);
    config.login_name = String::new();

    let result = run(&config, &HttpTransport::new(&config).unwrap(), None).await;

    assert!(matches!(result, Err(ExportError::Configuration { .. })));
    assert_eq!(count_requests(&server, |_| true).await, 0);
}

#[test]
fn report_mentions_both_ledgers_when_dirty() {
    let summary = RunSummary {
        metrics: RunMetricsSnapshot::default(),
        galleries_found: 3,
        ledger: LedgerCounts {
            failed_lines: 5,
            item_failures: 2,
            listing_failures: 1,
            skipped_entries: 2,
        },
        failed_downloads_file: PathBuf::from("failed_downloads.txt"),
        skipped_albums_file: PathBuf::from("skipped_albums.txt"),
    };

    let lines = summary.report_lines();
    assert!(lines[1].contains("3 entries in failed_downloads.txt"));
    assert!(lines.iter().any(|l| l.contains("2 entries in skipped_albums.txt")));
    assert!(summary.has_failures() && summary.has_skips());
}

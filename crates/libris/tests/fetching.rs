//! Ordered-fallback fetch behavior through the service surface.

mod support;

use std::sync::Arc;

use libris::{config::Settings, fetch::AttemptOutcome, service::Service};
use wiremock::{
  matchers::{method, path},
  Mock, MockServer, ResponseTemplate,
};

use support::{arxiv_stored_item, pdf_bytes, MockConnector};

fn settings_for(server: &MockServer) -> Settings {
  let mut settings = Settings::default();
  settings.request_timeout_secs = 5;
  settings.operation_timeout_secs = 30;
  settings.attempt_retries = 0;
  settings.min_pdf_bytes = 100;
  settings.mirror_hosts =
    vec![format!("{}/mirror-a", server.uri()), format!("{}/mirror-b", server.uri())];
  settings.endpoints.arxiv_api = format!("{}/api/query", server.uri());
  settings.endpoints.arxiv_pdf = format!("{}/pdf", server.uri());
  settings.endpoints.unpaywall = format!("{}/unpaywall", server.uri());
  settings.endpoints.pmc_idconv = format!("{}/idconv", server.uri());
  settings.endpoints.semantic_scholar = format!("{}/s2", server.uri());
  settings.endpoints.archive = format!("{}/archive", server.uri());
  settings
}

#[tokio::test]
async fn auto_fetch_succeeds_from_the_primary_repository() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/pdf/2301.07041.pdf"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_bytes(pdf_bytes())
        .insert_header("content-type", "application/pdf"),
    )
    .mount(&server)
    .await;

  let connector = Arc::new(MockConnector::with_item(arxiv_stored_item("76ZP9V4C")));
  let service = Service::new(settings_for(&server), connector).unwrap();

  let report = service.fetch_pdf("76ZP9V4C", "auto", false).await;
  assert!(report.success);
  assert_eq!(report.source.as_deref(), Some("arxiv"));
  assert_eq!(report.size, Some(pdf_bytes().len()));
  assert!(report.saved.is_none());
  assert!(report.bytes.is_some());
  // exactly one attempt: the winner; later sources never ran
  assert_eq!(report.attempts.len(), 1);
}

#[tokio::test]
async fn html_behind_a_pdf_path_is_rejected_and_the_fetch_advances() {
  let server = MockServer::start().await;
  // the primary source serves an HTML error page from the .pdf path
  Mock::given(method("GET"))
    .and(path("/pdf/2301.07041.pdf"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_string("<!DOCTYPE html><html><body>Paper withdrawn</body></html>")
        .insert_header("content-type", "text/html"),
    )
    .mount(&server)
    .await;
  // the aggregator has a real copy
  Mock::given(method("GET"))
    .and(path("/unpaywall/10.48550/arxiv.2301.07041"))
    .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
      "best_oa_location": {"url_for_pdf": format!("{}/oa/paper.pdf", server.uri())}
    })))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/oa/paper.pdf"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_bytes(pdf_bytes())
        .insert_header("content-type", "application/pdf"),
    )
    .mount(&server)
    .await;

  let connector = Arc::new(MockConnector::with_item(arxiv_stored_item("76ZP9V4C")));
  let service = Service::new(settings_for(&server), connector).unwrap();

  let report = service.fetch_pdf("76ZP9V4C", "auto", false).await;
  assert!(report.success);
  assert_eq!(report.source.as_deref(), Some("open_access"));
  assert_eq!(report.attempts.len(), 2);
  match &report.attempts[0].outcome {
    AttemptOutcome::Failed { reason } =>
      assert!(reason.to_string().contains("invalid payload"), "got: {reason}"),
    other => panic!("primary attempt should have failed, got {other:?}"),
  }
}

#[tokio::test]
async fn total_failure_reports_every_source_reason() {
  // nothing mounted: every endpoint answers 404
  let server = MockServer::start().await;
  let connector = Arc::new(MockConnector::with_item(arxiv_stored_item("76ZP9V4C")));
  let service = Service::new(settings_for(&server), connector).unwrap();

  let report = service.fetch_pdf("76ZP9V4C", "auto", false).await;
  assert!(!report.success);
  assert!(report.bytes.is_none());
  assert_eq!(report.attempts.len(), 4, "one attempt row per configured source");

  let (kind, message) = report.error.expect("total failure carries the taxonomy kind");
  assert_eq!(kind, "exhausted");
  assert!(message.contains("4"), "got: {message}");
}

#[tokio::test]
async fn persistence_failure_does_not_discard_the_fetched_pdf() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/pdf/2301.07041.pdf"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_bytes(pdf_bytes())
        .insert_header("content-type", "application/pdf"),
    )
    .mount(&server)
    .await;

  let connector = Arc::new(MockConnector::failing_attach(arxiv_stored_item("76ZP9V4C")));
  let service = Service::new(settings_for(&server), connector).unwrap();

  let report = service.fetch_pdf("76ZP9V4C", "auto", true).await;
  // the fetch stays successful; persistence is a distinct sub-failure
  assert!(report.success);
  assert!(report.bytes.is_some());
  let saved = report.saved.expect("persistence was requested, so it is reported");
  assert!(!saved.attached);
  assert!(saved.error.unwrap().contains("connector went away"));
}

#[tokio::test]
async fn successful_persistence_attaches_through_the_connector() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/pdf/2301.07041.pdf"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_bytes(pdf_bytes())
        .insert_header("content-type", "application/pdf"),
    )
    .mount(&server)
    .await;

  let connector = Arc::new(MockConnector::with_item(arxiv_stored_item("76ZP9V4C")));
  let service = Service::new(settings_for(&server), connector.clone()).unwrap();

  let report = service.fetch_pdf("76ZP9V4C", "auto", true).await;
  assert!(report.success);
  assert!(report.saved.unwrap().attached);

  let attachments = connector.attachments.lock().unwrap();
  assert_eq!(attachments.len(), 1);
  assert_eq!(attachments[0].0, "76ZP9V4C");
  assert_eq!(attachments[0].1, pdf_bytes().len());
}

#[tokio::test]
async fn batch_fetch_reports_per_item() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/pdf/2301.07041.pdf"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_bytes(pdf_bytes())
        .insert_header("content-type", "application/pdf"),
    )
    .mount(&server)
    .await;

  let connector = MockConnector::with_item(arxiv_stored_item("KEY00001"));
  connector
    .items
    .lock()
    .unwrap()
    .insert("KEY00002".into(), arxiv_stored_item("KEY00002"));
  let service = Service::new(settings_for(&server), Arc::new(connector)).unwrap();

  let keys = vec!["KEY00001".to_string(), "KEY00002".to_string(), "MISSING1".to_string()];
  let reports = service.fetch_pdf_batch(&keys, "auto", false).await;
  assert_eq!(reports.len(), 3);
  assert!(reports[0].success);
  assert!(reports[1].success);
  // the unknown key fails alone without poisoning the batch
  assert!(!reports[2].success);
  assert_eq!(reports[2].error.as_ref().unwrap().0, "zotero_unreachable");
}

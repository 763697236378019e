//! Extractor selection and extraction behavior against HTTP doubles.

mod support;

use std::sync::Arc;

use libris::{
  config::Settings,
  credentials::CredentialStore,
  error::LibrisError,
  extract::{ArxivExtractor, ExtractorManager, Extractor, NatureExtractor},
  render::PageRenderer,
};
use wiremock::{
  matchers::{method, path, query_param},
  Mock, MockServer, ResponseTemplate,
};

use support::ARXIV_FEED;

fn settings_for(server: &MockServer) -> Settings {
  let mut settings = Settings::default();
  settings.request_timeout_secs = 5;
  settings.attempt_retries = 0;
  settings.endpoints.arxiv_api = format!("{}/api/query", server.uri());
  settings
}

fn manager_for(settings: &Settings) -> ExtractorManager {
  let client = settings.http_client().unwrap();
  let renderer = libris::render::detect(client.clone(), settings.request_timeout());
  ExtractorManager::new(settings, client, renderer, Arc::new(CredentialStore::new()))
}

#[tokio::test]
async fn selection_is_deterministic_per_url_family() {
  let server = MockServer::start().await;
  let settings = settings_for(&server);
  let manager = manager_for(&settings);

  let cases = [
    ("https://arxiv.org/abs/2301.07041", "arxiv"),
    ("https://arxiv.org/pdf/2301.07041v2.pdf", "arxiv"),
    ("https://www.biorxiv.org/content/10.1101/2023.05.01.538915v1", "biorxiv"),
    ("https://www.nature.com/articles/s41586-023-06792-0", "nature"),
    ("https://journals.example.org/article/123", "generic"),
  ];
  for (url, expected) in cases {
    assert_eq!(manager.select(url).unwrap().name(), expected, "selection for {url}");
  }

  assert!(matches!(
    manager.select("not-a-url-at-all"),
    Err(LibrisError::UnsupportedSource(_))
  ));
}

#[tokio::test]
async fn arxiv_extraction_is_idempotent() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/query"))
    .and(query_param("id_list", "2301.07041"))
    .respond_with(ResponseTemplate::new(200).set_body_string(ARXIV_FEED))
    .mount(&server)
    .await;

  let settings = settings_for(&server);
  let manager = manager_for(&settings);

  let first = manager.extract("https://arxiv.org/abs/2301.07041").await.unwrap();
  let second = manager.extract("https://arxiv.org/abs/2301.07041").await.unwrap();

  assert_eq!(first.title, "Verifiable Fully Homomorphic Encryption");
  assert_eq!(first.source_identifier, "2301.07041");
  assert_eq!(first.authors.len(), 2);
  assert_eq!(first.doi.as_deref(), Some("10.48550/arxiv.2301.07041"));
  // identical records modulo the volatile retrieval stamp
  assert_eq!(first, second);
}

#[tokio::test]
async fn search_caps_results_and_passes_field_prefixes_through() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/query"))
    .and(query_param("search_query", "ti:transformer au:hinton"))
    .and(query_param("max_results", "5"))
    .respond_with(ResponseTemplate::new(200).set_body_string(ARXIV_FEED))
    .mount(&server)
    .await;

  let settings = settings_for(&server);
  let extractor = ArxivExtractor::new(&settings, settings.http_client().unwrap());

  let results = extractor.search("ti:transformer au:hinton", 5).await.unwrap();
  assert!(results.len() <= 5);
  for item in &results {
    assert!(!item.title.is_empty());
    assert!(!item.authors.is_empty());
  }
}

/// Renderer double returning a canned gated page.
struct CannedRenderer {
  html: String,
}

#[async_trait::async_trait]
impl PageRenderer for CannedRenderer {
  async fn render(&self, _url: &str, cookie: Option<&str>) -> libris::error::Result<String> {
    assert!(cookie.is_some(), "gated render must carry the stored cookie");
    Ok(self.html.clone())
  }

  fn name(&self) -> &'static str { "canned" }
}

#[tokio::test]
async fn credentials_unlock_a_gated_source() {
  let html = r#"<html><head>
    <meta name="citation_title" content="A gated Nature paper" />
    <meta name="citation_author" content="Doe, Jane" />
    <meta name="citation_doi" content="10.1038/s41586-023-06792-0" />
  </head></html>"#;

  let credentials = Arc::new(CredentialStore::new());
  let extractor = NatureExtractor::new(
    Arc::new(CannedRenderer { html: html.to_string() }),
    credentials.clone(),
  );
  let url = "https://www.nature.com/articles/s41586-023-06792-0";

  // without credentials: reported, not retried
  let before = extractor.extract(url).await;
  assert!(matches!(before, Err(LibrisError::AuthRequired(source)) if source == "nature"));

  // the explicit set-credentials operation flips the outcome
  credentials.set("Nature", "session=live-cookie", None);
  let after = extractor.extract(url).await.unwrap();
  assert_eq!(after.title, "A gated Nature paper");
  assert_eq!(after.source_identifier, "10.1038/s41586-023-06792-0");
}

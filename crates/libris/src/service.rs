//! Public operations as structured, never-throwing outcomes.
//!
//! The dispatch layer that exposes these operations to an assistant is an
//! external collaborator; what it needs from this crate is a set of
//! operations that take primitive arguments and always return a serializable
//! discriminated result. [`Service`] is that surface: every method converts
//! internal errors into an [`Outcome`] (or a richer report type) instead of
//! propagating them, so nothing the dispatch layer calls can fail
//! unhandled.
//!
//! A [`Service`] is built once at process start from an explicit
//! [`Settings`] value and the connector; it owns the extractor manager, the
//! PDF fetcher, the validation engine, the credential store, and the bounded
//! worker pool that caps concurrent top-level operations.

use tokio::sync::Semaphore;

use crate::{
  config::Settings,
  connector::ZoteroConnector,
  credentials::{CredentialStatus, CredentialStore},
  extract::{ArxivExtractor, ExtractorManager},
  fetch::{FetchOutcome, ItemIdentifiers, PdfFetcher, PdfSource, SourceAttempt},
  render,
  validate::{FieldDiff, ValidationEngine},
};

use super::*;

/// A serializable discriminated operation result.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
  /// The operation succeeded.
  Ok {
    /// The operation's result value.
    result: T,
  },
  /// The operation failed.
  Err {
    /// Stable failure discriminant from the error taxonomy.
    kind:    String,
    /// Human-readable cause.
    message: String,
  },
}

impl<T> Outcome<T> {
  /// Wraps an internal result.
  fn from_result(result: Result<T>) -> Self {
    match result {
      Ok(value) => Outcome::Ok { result: value },
      Err(err) => Outcome::Err { kind: err.kind().into(), message: err.to_string() },
    }
  }

  /// Whether this outcome is the success arm. Handy in tests and logs.
  pub fn is_ok(&self) -> bool { matches!(self, Outcome::Ok { .. }) }
}

/// Report of one persistence attempt after a successful fetch.
#[derive(Debug, Clone, Serialize)]
pub struct SaveReport {
  /// Whether the attachment landed in the reference manager.
  pub attached: bool,
  /// The persistence failure, when there was one. A failure here never
  /// invalidates the fetched bytes.
  pub error:    Option<String>,
}

/// Full report of a `fetch_pdf` operation.
///
/// Partial successes are explicit: `success` refers to the fetch itself,
/// while `saved` carries the persistence sub-result separately so a
/// resolved-but-not-persisted PDF is never collapsed into a plain failure.
#[derive(Debug, Serialize)]
pub struct FetchPdfReport {
  /// Whether a validated PDF was resolved.
  pub success:  bool,
  /// The item key the fetch ran for.
  pub item_key: String,
  /// Winning source tag, when successful.
  pub source:   Option<String>,
  /// URL the payload came from, when successful.
  pub url:      Option<String>,
  /// Payload size in bytes, when successful.
  pub size:     Option<usize>,
  /// Persistence sub-result, when persistence was requested.
  pub saved:    Option<SaveReport>,
  /// Per-source attempt rows, in attempt order.
  pub attempts: Vec<SourceAttempt>,
  /// Failure taxonomy kind and cause, when unsuccessful.
  pub error:    Option<(String, String)>,
  /// The resolved document itself; callers own it. Not serialized.
  #[serde(skip)]
  pub bytes:    Option<Vec<u8>>,
}

impl FetchPdfReport {
  /// A report for an operation that failed before any source was tried.
  fn failed_early(item_key: &str, err: LibrisError) -> Self {
    Self {
      success:  false,
      item_key: item_key.to_string(),
      source:   None,
      url:      None,
      size:     None,
      saved:    None,
      attempts: Vec::new(),
      error:    Some((err.kind().into(), err.to_string())),
      bytes:    None,
    }
  }
}

/// Report of a validation run.
#[derive(Debug, Serialize)]
pub struct ValidationReport {
  /// The item validated.
  pub item_key: String,
  /// One row per tracked field.
  pub diffs:    Vec<FieldDiff>,
  /// Whether no field differed.
  pub is_match: bool,
  /// Reference-manager fields written, when updating was requested.
  pub applied:  Vec<String>,
}

/// Report of a saved paper.
#[derive(Debug, Serialize)]
pub struct SavedPaper {
  /// Key the reference manager assigned.
  pub key:   String,
  /// Title of the saved record.
  pub title: String,
}

/// The operation surface handed to the dispatch layer.
pub struct Service {
  /// Runtime settings, built once by the caller.
  settings:    Settings,
  /// The reference-manager boundary.
  connector:   Arc<dyn ZoteroConnector>,
  /// Shared per-source credentials.
  credentials: Arc<CredentialStore>,
  /// URL-to-record extraction.
  extractors:  ExtractorManager,
  /// Primary-repository extractor, kept separately for search.
  arxiv:       ArxivExtractor,
  /// Ordered-fallback PDF acquisition.
  fetcher:     PdfFetcher,
  /// Stored-record reconciliation.
  validation:  ValidationEngine,
  /// Bounded worker pool for top-level operations.
  pool:        Arc<Semaphore>,
}

impl Service {
  /// Builds the full pipeline from settings and a connector.
  ///
  /// Detects the page-rendering capability once, constructs the extractor
  /// registration list, the adapters, and the worker pool; nothing else in
  /// the crate reads configuration after this point.
  ///
  /// # Errors
  ///
  /// Returns a configuration error when the HTTP client cannot be built.
  pub fn new(settings: Settings, connector: Arc<dyn ZoteroConnector>) -> Result<Self> {
    let client = settings.http_client()?;
    let renderer = render::detect(client.clone(), settings.request_timeout());
    let credentials = Arc::new(CredentialStore::new());
    if let Ok(loaded) = credentials.load_from_config_dir() {
      if loaded > 0 {
        debug!(loaded, "loaded credential files from config dir");
      }
    }

    let arxiv = ArxivExtractor::new(&settings, client.clone());
    let extractors =
      ExtractorManager::new(&settings, client.clone(), renderer, credentials.clone());
    let fetcher = PdfFetcher::new(&settings, client);
    let validation = ValidationEngine::new(connector.clone(), Arc::new(arxiv.clone()));
    let pool = Arc::new(Semaphore::new(settings.max_concurrency));

    Ok(Self { settings, connector, credentials, extractors, arxiv, fetcher, validation, pool })
  }

  /// Searches the primary repository's metadata feed.
  ///
  /// Supports field-prefixed queries (`ti:transformer au:hinton`);
  /// `max_results` is capped at 50.
  pub async fn search_arxiv(&self, query: &str, max_results: usize) -> Outcome<Vec<CanonicalItem>> {
    Outcome::from_result(self.arxiv.search(query, max_results).await)
  }

  /// Extracts a canonical record from a repository URL.
  pub async fn extract_metadata(&self, url: &str) -> Outcome<CanonicalItem> {
    Outcome::from_result(self.extractors.extract(url).await)
  }

  /// Extracts a record and saves it through the connector, letting the
  /// reference manager pull the PDF from the record's resolved URL.
  pub async fn save_paper(&self, url: &str) -> Outcome<SavedPaper> {
    Outcome::from_result(async {
      let item = self.extractors.extract(url).await?;
      let attachment = item.pdf_url.clone().map(crate::connector::Attachment::Url);
      let key = self.connector.save_item(&item, attachment).await?;
      Ok(SavedPaper { key, title: item.title })
    }.await)
  }

  /// Acquires a PDF for a stored item through the ordered source fallback.
  ///
  /// `source` is `"auto"` for the configured default order or a source tag
  /// to force to the front. With `save_to_zotero` the validated payload is
  /// attached through the connector after the fetch; a persistence failure
  /// is reported in `saved` alongside the still-successful fetch.
  pub async fn fetch_pdf(
    &self,
    item_key: &str,
    source: &str,
    save_to_zotero: bool,
  ) -> FetchPdfReport {
    let Ok(_permit) = self.pool.acquire().await else {
      return FetchPdfReport::failed_early(item_key, LibrisError::Config("worker pool closed".into()));
    };

    let forced = match source {
      "" | "auto" => None,
      tag => match tag.parse::<PdfSource>() {
        Ok(parsed) => Some(parsed),
        Err(err) => return FetchPdfReport::failed_early(item_key, err),
      },
    };

    let stored = match self.connector.get_item(item_key).await {
      Ok(stored) => stored,
      Err(err) => return FetchPdfReport::failed_early(item_key, err),
    };
    let ids = ItemIdentifiers::from_stored(&stored);

    match self.fetcher.fetch(&ids, forced).await {
      FetchOutcome::Success { source, payload, attempts } => {
        let saved = if save_to_zotero {
          let filename = format!("{}.pdf", &stored.title.chars().take(50).collect::<String>());
          match self.connector.attach_pdf(item_key, payload.bytes.clone(), &filename).await {
            Ok(()) => Some(SaveReport { attached: true, error: None }),
            Err(err) => {
              warn!(item_key, %err, "PDF resolved but persistence failed");
              Some(SaveReport { attached: false, error: Some(err.to_string()) })
            },
          }
        } else {
          None
        };

        FetchPdfReport {
          success: true,
          item_key: item_key.to_string(),
          source: Some(source.to_string()),
          url: Some(payload.url.clone()),
          size: Some(payload.bytes.len()),
          saved,
          attempts,
          error: None,
          bytes: Some(payload.bytes),
        }
      },
      FetchOutcome::Exhausted { attempts } => {
        let err = LibrisError::Exhausted(FetchOutcome::source_failures(&attempts));
        FetchPdfReport {
          success: false,
          item_key: item_key.to_string(),
          source: None,
          url: None,
          size: None,
          saved: None,
          attempts,
          error: Some((err.kind().into(), err.to_string())),
          bytes: None,
        }
      },
    }
  }

  /// Runs independent fetches for several items through the worker pool.
  ///
  /// Each item's own fallback run stays strictly sequential; only distinct
  /// items proceed concurrently, bounded by the configured pool size.
  pub async fn fetch_pdf_batch(
    &self,
    item_keys: &[String],
    source: &str,
    save_to_zotero: bool,
  ) -> Vec<FetchPdfReport> {
    futures::future::join_all(
      item_keys.iter().map(|key| self.fetch_pdf(key, source, save_to_zotero)),
    )
    .await
  }

  /// Diffs a stored item against a fresh canonical extraction.
  pub async fn validate_item(&self, item_key: &str) -> Outcome<ValidationReport> {
    Outcome::from_result(async {
      let diffs = self.validation.validate(item_key).await?;
      Ok(ValidationReport {
        item_key: item_key.to_string(),
        is_match: diffs.iter().all(|diff| !diff.differs),
        diffs,
        applied: Vec::new(),
      })
    }.await)
  }

  /// Diffs a stored item and optionally writes the differing fields back.
  pub async fn validate_and_update_item(
    &self,
    item_key: &str,
    apply_updates: bool,
  ) -> Outcome<ValidationReport> {
    Outcome::from_result(async {
      let (diffs, applied) = self.validation.validate_and_update(item_key, apply_updates).await?;
      Ok(ValidationReport {
        item_key: item_key.to_string(),
        is_match: diffs.iter().all(|diff| !diff.differs),
        diffs,
        applied,
      })
    }.await)
  }

  /// Stores (or replaces) the cookie blob for a gated source.
  pub async fn set_credentials(&self, source: &str, cookie_blob: &str) -> Outcome<Vec<CredentialStatus>> {
    if source.trim().is_empty() || cookie_blob.trim().is_empty() {
      return Outcome::Err {
        kind:    "config_error".into(),
        message: "source and cookie blob must be non-empty".into(),
      };
    }
    self.credentials.set(source, cookie_blob, None);
    Outcome::Ok { result: self.credentials.status() }
  }

  /// Reports every stored credential entry.
  pub fn credential_status(&self) -> Vec<CredentialStatus> { self.credentials.status() }

  /// The settings this service was built with.
  pub fn settings(&self) -> &Settings { &self.settings }
}

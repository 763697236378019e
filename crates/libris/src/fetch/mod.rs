//! Ordered-fallback PDF acquisition.
//!
//! This module provides the source adapters and the fetcher that orchestrates
//! them:
//!
//! - [`SourceAdapter`]: one implementation per external PDF source
//! - [`PdfFetcher`]: tries adapters strictly in the configured order and
//!   short-circuits on the first validated success
//! - [`validate_payload`]: the validity check every accepted payload passes
//!
//! The fetcher's run is a straight-line state machine: idle, attempting one
//! source, then either success or advance, until the order is exhausted.
//! Attempts within a run are strictly sequential; speculative concurrent
//! attempts are disallowed so a persisted result can never be written twice.
//! An overall per-operation deadline bounds the whole run: once it elapses
//! the fetch reports exhaustion regardless of unvisited sources.
//!
//! # Examples
//!
//! ```no_run
//! use libris::{config::Settings, fetch::{ItemIdentifiers, PdfFetcher}};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::default();
//! let fetcher = PdfFetcher::new(&settings, settings.http_client()?);
//!
//! let ids = ItemIdentifiers {
//!   doi: Some("10.48550/arxiv.2301.07041".into()),
//!   ..Default::default()
//! };
//! match fetcher.fetch(&ids, None).await {
//!   libris::fetch::FetchOutcome::Success { source, payload, .. } =>
//!     println!("got {} bytes from {source}", payload.bytes.len()),
//!   libris::fetch::FetchOutcome::Exhausted { attempts } =>
//!     println!("all {} sources failed", attempts.len()),
//! }
//! # Ok(())
//! # }
//! ```

use crate::{config::Settings, connector::StoredItem};

use super::*;

pub mod archive;
pub mod arxiv;
pub mod mirrors;
pub mod open_access;

pub use archive::ArchiveAdapter;
pub use arxiv::ArxivPdfAdapter;
pub use mirrors::MirrorsAdapter;
pub use open_access::OpenAccessAdapter;

/// External PDF source tags, in no particular order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfSource {
  /// Primary repository direct-PDF pattern.
  Arxiv,
  /// Open-access aggregators, queried by DOI.
  OpenAccess,
  /// Secondary mirror set, queried by DOI.
  Mirrors,
  /// Archive search by DOI or normalized title.
  Archive,
}

impl Display for PdfSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      PdfSource::Arxiv => write!(f, "arxiv"),
      PdfSource::OpenAccess => write!(f, "open_access"),
      PdfSource::Mirrors => write!(f, "mirrors"),
      PdfSource::Archive => write!(f, "archive"),
    }
  }
}

impl FromStr for PdfSource {
  type Err = LibrisError;

  fn from_str(s: &str) -> Result<Self> {
    match &s.to_lowercase() as &str {
      "arxiv" => Ok(PdfSource::Arxiv),
      "open_access" | "open-access" => Ok(PdfSource::OpenAccess),
      "mirrors" | "scihub" => Ok(PdfSource::Mirrors),
      "archive" => Ok(PdfSource::Archive),
      s => Err(LibrisError::UnsupportedSource(s.to_owned())),
    }
  }
}

/// The identifier set a fetch runs against.
///
/// Resolved from a stored record via the connector, or passed directly by a
/// caller that already holds a [`CanonicalItem`]. Adapters pick the
/// identifiers they need and skip when those are absent.
#[derive(Debug, Clone, Default)]
pub struct ItemIdentifiers {
  /// Reference-manager item key, when the fetch came from a stored record.
  pub key:      Option<String>,
  /// Paper title, for title-search fallbacks.
  pub title:    Option<String>,
  /// Normalized DOI.
  pub doi:      Option<String>,
  /// Stored URL.
  pub url:      Option<String>,
  /// Recovered arXiv identifier.
  pub arxiv_id: Option<String>,
}

impl ItemIdentifiers {
  /// Derives the identifier set from a stored record.
  pub fn from_stored(item: &StoredItem) -> Self {
    let doi = (!item.doi.is_empty()).then(|| normalize_doi(&item.doi));
    let arxiv_id = arxiv_id_from_url(&item.url)
      .or_else(|| doi.as_deref().and_then(arxiv_id_from_doi));
    Self {
      key: Some(item.key.clone()),
      title: (!item.title.is_empty()).then(|| item.title.clone()),
      doi,
      url: (!item.url.is_empty()).then(|| item.url.clone()),
      arxiv_id,
    }
  }

  /// Derives the identifier set from a freshly extracted record.
  pub fn from_item(item: &CanonicalItem) -> Self {
    let arxiv_id = (item.source == Repository::Arxiv)
      .then(|| item.source_identifier.clone())
      .or_else(|| arxiv_id_from_url(&item.source_url))
      .or_else(|| item.doi.as_deref().and_then(arxiv_id_from_doi));
    Self {
      key:      None,
      title:    Some(item.title.clone()),
      doi:      item.doi.clone(),
      url:      Some(item.source_url.clone()),
      arxiv_id,
    }
  }
}

/// A validated payload resolved by an adapter.
#[derive(Debug, Clone)]
pub struct Resolution {
  /// URL the bytes came from.
  pub url:          String,
  /// The document bytes.
  pub bytes:        Vec<u8>,
  /// Declared content type, when the server sent one.
  pub content_type: Option<String>,
}

/// Why a single source attempt did not produce a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AttemptFailure {
  /// The source was skipped: an identifier it needs is unavailable.
  MissingIdentifier(String),
  /// Transport failure after the bounded retries.
  Network(String),
  /// A per-attempt or operation deadline elapsed.
  Timeout(String),
  /// The source answered but has no copy of the document.
  NotFound(String),
  /// The source demands credentials that are absent or expired.
  AuthRequired(String),
  /// A payload was retrieved but failed the validity check.
  InvalidPayload(String),
}

impl Display for AttemptFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      AttemptFailure::MissingIdentifier(what) => write!(f, "missing identifier: {what}"),
      AttemptFailure::Network(detail) => write!(f, "network failure: {detail}"),
      AttemptFailure::Timeout(detail) => write!(f, "timed out: {detail}"),
      AttemptFailure::NotFound(detail) => write!(f, "not found: {detail}"),
      AttemptFailure::AuthRequired(source) => write!(f, "authentication required: {source}"),
      AttemptFailure::InvalidPayload(detail) => write!(f, "invalid payload: {detail}"),
    }
  }
}

/// Outcome of one source attempt, as recorded in the fetch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
  /// A validated payload was retrieved.
  Fetched {
    /// URL the payload came from.
    url:          String,
    /// Payload length in bytes.
    len:          usize,
    /// Declared content type, when present.
    content_type: Option<String>,
  },
  /// The attempt failed or was skipped.
  Failed {
    /// The reason, preserving the skip/failure distinction.
    reason: AttemptFailure,
  },
}

/// One row of the fetch report: which source, and how it went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttempt {
  /// The source tried.
  pub source:  PdfSource,
  /// How the attempt ended.
  pub outcome: AttemptOutcome,
}

/// Result of a full fetch run.
#[derive(Debug)]
pub enum FetchOutcome {
  /// A source produced a validated document; later sources were never tried.
  Success {
    /// The winning source.
    source:   PdfSource,
    /// The validated payload.
    payload:  Resolution,
    /// Attempt rows up to and including the winner.
    attempts: Vec<SourceAttempt>,
  },
  /// Every configured source failed or the operation deadline elapsed.
  Exhausted {
    /// One row per source, with the per-source reason.
    attempts: Vec<SourceAttempt>,
  },
}

impl FetchOutcome {
  /// Flattens the failed attempts into the error type's report rows.
  pub fn source_failures(attempts: &[SourceAttempt]) -> Vec<SourceFailure> {
    attempts
      .iter()
      .filter_map(|attempt| match &attempt.outcome {
        AttemptOutcome::Failed { reason } =>
          Some(SourceFailure { source: attempt.source.to_string(), reason: reason.to_string() }),
        AttemptOutcome::Fetched { .. } => None,
      })
      .collect()
  }
}

/// One external PDF source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
  /// The tag this adapter answers for.
  fn source(&self) -> PdfSource;

  /// Attempts to resolve a validated document for the identifier set.
  ///
  /// Implementations return [`AttemptFailure::MissingIdentifier`] without
  /// touching the network when the identifiers they need are absent, and
  /// convert their own transport/validation problems into the matching
  /// failure; nothing here aborts the broader fetch.
  async fn resolve(&self, ids: &ItemIdentifiers)
    -> core::result::Result<Resolution, AttemptFailure>;
}

/// Checks that a payload is plausibly a real PDF.
///
/// Accepts a payload when the declared content type says PDF or the leading
/// bytes carry the `%PDF-` signature, and the size clears the configured
/// minimum. This is what rejects HTML error or interstitial pages served
/// from `.pdf`-looking paths.
pub fn validate_payload(
  bytes: &[u8],
  content_type: Option<&str>,
  min_bytes: usize,
) -> core::result::Result<(), AttemptFailure> {
  let says_pdf = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("pdf"));
  let has_signature = bytes.starts_with(b"%PDF-");

  if !says_pdf && !has_signature {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(64)]).to_lowercase();
    let detail = if head.contains("<html") || head.contains("<!doctype") {
      "HTML page where a PDF was expected"
    } else {
      "neither content type nor signature says PDF"
    };
    return Err(AttemptFailure::InvalidPayload(detail.into()));
  }
  if !has_signature {
    return Err(AttemptFailure::InvalidPayload("declared PDF without %PDF signature".into()));
  }
  if bytes.len() < min_bytes {
    return Err(AttemptFailure::InvalidPayload(format!(
      "{} bytes is below the {min_bytes}-byte minimum",
      bytes.len()
    )));
  }
  Ok(())
}

/// GETs a URL with bounded retries.
///
/// Retries transport errors and 5xx responses up to `retries` extra attempts
/// with exponential backoff; 4xx responses fail immediately since repeating
/// them cannot help.
pub(crate) async fn get_with_retry(
  client: &reqwest::Client,
  url: &str,
  retries: u32,
) -> core::result::Result<reqwest::Response, AttemptFailure> {
  let mut attempt = 0u32;
  loop {
    match client.get(url).send().await {
      Ok(response) => {
        let status = response.status();
        if status.is_success() {
          return Ok(response);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
          return Err(AttemptFailure::NotFound(format!("GET {url}: 404")));
        }
        if !status.is_server_error() || attempt >= retries {
          return Err(AttemptFailure::Network(format!("GET {url}: {status}")));
        }
      },
      Err(err) => {
        if attempt >= retries {
          return Err(if err.is_timeout() {
            AttemptFailure::Timeout(format!("GET {url}"))
          } else {
            AttemptFailure::Network(err.to_string())
          });
        }
      },
    }
    attempt += 1;
    trace!(url, attempt, "retrying request");
    tokio::time::sleep(Duration::from_millis(250 * 2u64.pow(attempt.min(4)))).await;
  }
}

/// Downloads and validates one candidate URL.
pub(crate) async fn download_validated(
  client: &reqwest::Client,
  url: &str,
  retries: u32,
  min_bytes: usize,
) -> core::result::Result<Resolution, AttemptFailure> {
  let response = get_with_retry(client, url, retries).await?;
  let content_type = response
    .headers()
    .get(reqwest::header::CONTENT_TYPE)
    .and_then(|value| value.to_str().ok())
    .map(str::to_string);
  let bytes = response
    .bytes()
    .await
    .map_err(|err| AttemptFailure::Network(err.to_string()))?
    .to_vec();
  validate_payload(&bytes, content_type.as_deref(), min_bytes)?;
  Ok(Resolution { url: url.to_string(), bytes, content_type })
}

/// Orchestrates source adapters in a configured order.
pub struct PdfFetcher {
  /// All known adapters; the order field decides which run and when.
  adapters:          Vec<Box<dyn SourceAdapter>>,
  /// Default source order.
  default_order:     Vec<PdfSource>,
  /// Overall per-operation deadline.
  operation_timeout: Duration,
}

impl PdfFetcher {
  /// Builds the fetcher with the four standard adapters.
  pub fn new(settings: &Settings, client: reqwest::Client) -> Self {
    Self {
      adapters:          vec![
        Box::new(ArxivPdfAdapter::new(settings, client.clone())),
        Box::new(OpenAccessAdapter::new(settings, client.clone())),
        Box::new(MirrorsAdapter::new(settings, client.clone())),
        Box::new(ArchiveAdapter::new(settings, client)),
      ],
      default_order:     settings.source_order.clone(),
      operation_timeout: settings.operation_timeout(),
    }
  }

  /// Builds a fetcher over explicit adapters, for composition and tests.
  pub fn with_adapters(
    adapters: Vec<Box<dyn SourceAdapter>>,
    default_order: Vec<PdfSource>,
    operation_timeout: Duration,
  ) -> Self {
    Self { adapters, default_order, operation_timeout }
  }

  /// The order a run will use: a forced source moves to the front, the
  /// remaining defaults still follow it.
  pub fn order_for(&self, forced: Option<PdfSource>) -> Vec<PdfSource> {
    match forced {
      None => self.default_order.clone(),
      Some(first) => {
        let mut order = vec![first];
        order.extend(self.default_order.iter().copied().filter(|source| *source != first));
        order
      },
    }
  }

  /// Runs the fallback loop.
  ///
  /// Sources are attempted strictly sequentially in the computed order. The
  /// first validated success short-circuits: later sources are never
  /// invoked, not even speculatively. A source whose identifiers are absent
  /// is recorded as skipped and the loop advances. When the overall
  /// deadline elapses, unvisited sources are recorded as timed out and the
  /// run reports exhaustion.
  pub async fn fetch(&self, ids: &ItemIdentifiers, forced: Option<PdfSource>) -> FetchOutcome {
    let order = self.order_for(forced);
    let deadline = tokio::time::Instant::now() + self.operation_timeout;
    let mut attempts = Vec::with_capacity(order.len());

    for source in order {
      let Some(adapter) = self.adapters.iter().find(|adapter| adapter.source() == source) else {
        warn!(%source, "no adapter registered for configured source");
        continue;
      };

      let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
      if remaining.is_zero() {
        attempts.push(SourceAttempt {
          source,
          outcome: AttemptOutcome::Failed {
            reason: AttemptFailure::Timeout("operation deadline elapsed".into()),
          },
        });
        continue;
      }

      debug!(%source, "attempting PDF source");
      let result = match tokio::time::timeout(remaining, adapter.resolve(ids)).await {
        Ok(result) => result,
        Err(_) =>
          Err(AttemptFailure::Timeout(format!("source {source} exceeded operation deadline"))),
      };

      match result {
        Ok(payload) => {
          debug!(%source, bytes = payload.bytes.len(), "PDF source succeeded");
          attempts.push(SourceAttempt {
            source,
            outcome: AttemptOutcome::Fetched {
              url:          payload.url.clone(),
              len:          payload.bytes.len(),
              content_type: payload.content_type.clone(),
            },
          });
          return FetchOutcome::Success { source, payload, attempts };
        },
        Err(reason) => {
          debug!(%source, %reason, "PDF source failed, advancing");
          attempts.push(SourceAttempt { source, outcome: AttemptOutcome::Failed { reason } });
        },
      }
    }

    FetchOutcome::Exhausted { attempts }
  }
}

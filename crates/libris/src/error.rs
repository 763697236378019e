//! Error types for the libris library.
//!
//! This module provides a comprehensive error type that encompasses all possible
//! failure modes when extracting metadata and acquiring documents, including:
//! - Network and API errors
//! - Structural drift in scraped pages
//! - Missing or expired credentials
//! - Payload validation
//! - Connector (reference manager) availability
//!
//! # Examples
//!
//! ```no_run
//! use libris::error::LibrisError;
//!
//! # async fn example(manager: libris::extract::ExtractorManager) {
//! match manager.extract("https://example.com/not-a-paper").await {
//!   Err(LibrisError::UnsupportedSource(url)) => println!("no extractor for {url}"),
//!   Err(LibrisError::Network(e)) => println!("network error: {e}"),
//!   Err(e) => println!("other error: {e}"),
//!   Ok(item) => println!("extracted: {}", item.title),
//! }
//! # }
//! ```

use thiserror::Error;

/// Error type alias used for the [`libris`](crate) crate.
pub type Result<T> = core::result::Result<T, LibrisError>;

/// A single source's failure reason, carried by [`LibrisError::Exhausted`].
///
/// When every configured PDF source has been tried and none produced a valid
/// document, the fetcher reports one of these per source so the caller can see
/// exactly why each attempt failed.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SourceFailure {
  /// Tag of the source that failed (e.g. "arxiv", "mirrors").
  pub source: String,
  /// Human-readable reason for the failure.
  pub reason: String,
}

/// Errors that can occur when working with the libris library.
///
/// Adapter- and extractor-local occurrences of these errors are converted into
/// per-source outcomes by the fetcher and never abort a broader operation; the
/// variants surface directly only from the operation that owns them.
#[derive(Error, Debug)]
pub enum LibrisError {
  /// No registered extractor or adapter matches the given input.
  ///
  /// The string parameter carries the offending URL or identifier.
  #[error("No supported source matches: {0}")]
  UnsupportedSource(String),

  /// A network request failed.
  ///
  /// Transient network errors are retried within the configured bounds before
  /// being converted into an adapter failure; anything that escapes here was
  /// not recoverable.
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// A per-attempt or per-operation deadline elapsed.
  #[error("Timed out: {0}")]
  Timeout(String),

  /// A scraped or fetched page no longer has the structure the extractor
  /// expects.
  ///
  /// Non-retryable; surfaced for manual attention. This is also the failure
  /// reported when an extraction cannot satisfy the title/identifier
  /// invariant.
  #[error("Failed to parse source content: {0}")]
  Parse(String),

  /// A gated source was queried without a live credential.
  ///
  /// Reported, never silently retried, when the credential store has no entry
  /// for the source or the entry has expired. The parameter names the source.
  #[error("Authentication required for source: {0}")]
  AuthRequired(String),

  /// An adapter was skipped because the identifiers it needs are unavailable.
  ///
  /// This is a skip, not a failure: e.g. a mirror lookup without a DOI. The
  /// parameter names the missing identifier.
  #[error("Missing identifier: {0}")]
  MissingIdentifier(&'static str),

  /// A payload failed the PDF validity check.
  ///
  /// Covers disguised HTML error or interstitial pages served from
  /// `.pdf`-looking paths as well as truncated documents below the minimum
  /// size threshold.
  #[error("Invalid PDF payload: {0}")]
  InvalidPayload(String),

  /// A call to the reference-manager connector failed.
  ///
  /// During persistence this does not discard an already-resolved PDF; it is
  /// reported as a distinct sub-failure alongside the successful fetch.
  #[error("Zotero connector unreachable: {0}")]
  ZoteroUnreachable(String),

  /// Every configured PDF source failed for the item.
  ///
  /// Carries the per-source reasons for diagnosis.
  #[error("All PDF sources exhausted ({} tried)", .0.len())]
  Exhausted(Vec<SourceFailure>),

  /// Settings were structurally valid TOML but semantically unusable.
  #[error("{0}")]
  Config(String),

  /// A file system operation failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// A TOML settings document failed to deserialize.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),
}

impl LibrisError {
  /// Stable machine-readable discriminant for the service layer's structured
  /// outcomes.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::UnsupportedSource(_) => "unsupported_source",
      Self::Network(_) => "network_error",
      Self::Timeout(_) => "timeout",
      Self::Parse(_) => "parse_error",
      Self::AuthRequired(_) => "auth_required",
      Self::MissingIdentifier(_) => "missing_identifier",
      Self::InvalidPayload(_) => "invalid_payload",
      Self::ZoteroUnreachable(_) => "zotero_unreachable",
      Self::Exhausted(_) => "exhausted",
      Self::Config(_) => "config_error",
      Self::Io(_) => "io_error",
      Self::TomlDe(_) => "config_error",
    }
  }
}

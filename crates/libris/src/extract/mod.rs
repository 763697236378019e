//! Metadata extraction framework.
//!
//! This module provides the polymorphic extractor layer that turns a paper
//! URL from any supported repository into a [`CanonicalItem`]:
//!
//! - [`Extractor`]: the capability each repository variant implements
//! - [`ExtractorManager`]: priority-ordered selection over a fixed list
//! - One variant per repository family: [`arxiv`], [`biorxiv`], [`nature`],
//!   and the [`generic`] structural-HTML fallback
//!
//! Dispatch is an explicit ordered list evaluated top to bottom: specific
//! domain extractors are registered before the generic fallback, the first
//! match wins, and registration order is fixed, so selection is
//! deterministic.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use libris::{
//!   config::Settings, credentials::CredentialStore, extract::ExtractorManager, render,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::default();
//! let client = settings.http_client()?;
//! let renderer = render::detect(client.clone(), settings.request_timeout());
//! let manager =
//!   ExtractorManager::new(&settings, client, renderer, Arc::new(CredentialStore::new()));
//!
//! let item = manager.extract("https://arxiv.org/abs/2301.07041").await?;
//! println!("Title: {}", item.title);
//! # Ok(())
//! # }
//! ```

use crate::{config::Settings, credentials::CredentialStore, render::PageRenderer};

use super::*;

pub mod arxiv;
pub mod biorxiv;
pub mod generic;
mod html;
pub mod nature;

pub use arxiv::ArxivExtractor;
pub use biorxiv::BiorxivExtractor;
pub use generic::GenericExtractor;
pub use nature::NatureExtractor;

/// Converts a repository URL into a normalized metadata record.
///
/// Implementations are cheap value objects over shared clients; all state
/// they need (HTTP client, renderer, credential store) is injected at
/// construction.
#[async_trait]
pub trait Extractor: Send + Sync {
  /// Short tag for logs and failure reports.
  fn name(&self) -> &'static str;

  /// Whether this extractor handles the given URL.
  fn matches(&self, url: &str) -> bool;

  /// Whether this extractor needs a stored credential before it can fetch.
  fn requires_auth(&self) -> bool { false }

  /// Extracts a canonical record from the URL.
  ///
  /// Extraction is idempotent: two calls against the same URL, absent any
  /// upstream content change, produce records that compare equal (the
  /// volatile retrieval stamp is excluded from equality).
  ///
  /// # Errors
  ///
  /// - [`LibrisError::Network`] / [`LibrisError::Timeout`] for transport
  ///   failures
  /// - [`LibrisError::Parse`] for structural drift or an unsatisfiable
  ///   title/identifier invariant
  /// - [`LibrisError::AuthRequired`] when a gated source has no live
  ///   credential
  async fn extract(&self, url: &str) -> Result<CanonicalItem>;
}

/// Priority-ordered extractor selection.
///
/// Holds the fixed registration list; [`select`](Self::select) walks it top
/// to bottom and returns the first extractor whose `matches` accepts the
/// URL.
pub struct ExtractorManager {
  /// Registration list, specific extractors first, generic fallback last.
  extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorManager {
  /// Builds the default registration list: arXiv, bioRxiv, Nature, then the
  /// generic fallback.
  pub fn new(
    settings: &Settings,
    client: reqwest::Client,
    renderer: Arc<dyn PageRenderer>,
    credentials: Arc<CredentialStore>,
  ) -> Self {
    Self {
      extractors: vec![
        Box::new(ArxivExtractor::new(settings, client.clone())),
        Box::new(BiorxivExtractor::new(renderer.clone())),
        Box::new(NatureExtractor::new(renderer, credentials)),
        Box::new(GenericExtractor::new(client)),
      ],
    }
  }

  /// Builds a manager over an explicit extractor list, in the given order.
  pub fn with_extractors(extractors: Vec<Box<dyn Extractor>>) -> Self { Self { extractors } }

  /// Selects the extractor for a URL.
  ///
  /// # Errors
  ///
  /// Returns [`LibrisError::UnsupportedSource`] when no registered extractor
  /// matches.
  pub fn select(&self, url: &str) -> Result<&dyn Extractor> {
    self
      .extractors
      .iter()
      .find(|extractor| extractor.matches(url))
      .map(AsRef::as_ref)
      .ok_or_else(|| LibrisError::UnsupportedSource(url.to_string()))
  }

  /// Selects and runs the extractor for a URL.
  pub async fn extract(&self, url: &str) -> Result<CanonicalItem> {
    let extractor = self.select(url)?;
    debug!(extractor = extractor.name(), url, "extracting metadata");
    extractor.extract(url).await
  }
}

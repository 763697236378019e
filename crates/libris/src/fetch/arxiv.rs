//! Primary-repository adapter: the arXiv direct-PDF pattern.
//!
//! The repository serves PDFs at a deterministic URL derived from the paper
//! id, so this adapter never searches: it recovers the id from the
//! identifier set (directly, from the stored URL, or from an arXiv-style
//! DOI), downloads the one candidate, and validates it.

use crate::config::Settings;

use super::*;

/// Direct-PDF adapter for the primary repository.
#[derive(Debug, Clone)]
pub struct ArxivPdfAdapter {
  /// Shared HTTP client.
  client:    reqwest::Client,
  /// Direct-PDF base; the id is appended.
  pdf_base:  String,
  /// Minimum accepted payload size.
  min_bytes: usize,
  /// Bounded retries per request.
  retries:   u32,
}

impl ArxivPdfAdapter {
  /// Builds the adapter from settings.
  pub fn new(settings: &Settings, client: reqwest::Client) -> Self {
    Self {
      client,
      pdf_base: settings.endpoints.arxiv_pdf.trim_end_matches('/').to_string(),
      min_bytes: settings.min_pdf_bytes,
      retries: settings.attempt_retries,
    }
  }

  /// Recovers the repository id from whichever identifier carries it.
  fn repository_id(ids: &ItemIdentifiers) -> Option<String> {
    ids
      .arxiv_id
      .clone()
      .or_else(|| ids.url.as_deref().and_then(arxiv_id_from_url))
      .or_else(|| ids.doi.as_deref().and_then(arxiv_id_from_doi))
  }
}

#[async_trait]
impl SourceAdapter for ArxivPdfAdapter {
  fn source(&self) -> PdfSource { PdfSource::Arxiv }

  async fn resolve(
    &self,
    ids: &ItemIdentifiers,
  ) -> core::result::Result<Resolution, AttemptFailure> {
    let Some(id) = Self::repository_id(ids) else {
      return Err(AttemptFailure::MissingIdentifier("arxiv id".into()));
    };
    let url = format!("{}/{id}.pdf", self.pdf_base);
    download_validated(&self.client, &url, self.retries, self.min_bytes).await
  }
}

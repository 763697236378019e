//! Open-access aggregator adapter.
//!
//! Queries legal open-access indexes by DOI in a fixed sub-order (Unpaywall,
//! the PubMed Central id converter, then the Semantic Scholar graph API)
//! and downloads the first advertised copy that validates. A sub-source
//! failure advances to the next; only when all three come up dry does the
//! adapter itself report not-found.

use serde_json::Value;

use crate::config::Settings;

use super::*;

/// PubMed Central article base; the PMCID is appended.
const PMC_ARTICLE_BASE: &str = "https://www.ncbi.nlm.nih.gov/pmc/articles";

/// DOI-driven aggregator adapter.
#[derive(Debug, Clone)]
pub struct OpenAccessAdapter {
  /// Shared HTTP client.
  client:     reqwest::Client,
  /// Unpaywall REST base.
  unpaywall:  String,
  /// PMC id-converter endpoint.
  pmc_idconv: String,
  /// Semantic Scholar paper base.
  s2:         String,
  /// Contact e-mail for polite API use.
  email:      String,
  /// Minimum accepted payload size.
  min_bytes:  usize,
  /// Bounded retries per request.
  retries:    u32,
}

impl OpenAccessAdapter {
  /// Builds the adapter from settings.
  pub fn new(settings: &Settings, client: reqwest::Client) -> Self {
    Self {
      client,
      unpaywall: settings.endpoints.unpaywall.trim_end_matches('/').to_string(),
      pmc_idconv: settings.endpoints.pmc_idconv.clone(),
      s2: settings.endpoints.semantic_scholar.trim_end_matches('/').to_string(),
      email: settings.contact_email.clone(),
      min_bytes: settings.min_pdf_bytes,
      retries: settings.attempt_retries,
    }
  }

  /// Fetches a JSON document, treating any failure as a sub-source miss.
  async fn get_json(&self, url: &str) -> core::result::Result<Value, AttemptFailure> {
    let response = get_with_retry(&self.client, url, self.retries).await?;
    response.json().await.map_err(|err| AttemptFailure::Network(err.to_string()))
  }

  /// Unpaywall: best open-access location's PDF link.
  async fn try_unpaywall(&self, doi: &str) -> core::result::Result<Resolution, AttemptFailure> {
    let url = format!("{}/{doi}?email={}", self.unpaywall, urlencoding::encode(&self.email));
    let body = self.get_json(&url).await?;
    let pdf_url = body
      .pointer("/best_oa_location/url_for_pdf")
      .and_then(Value::as_str)
      .ok_or_else(|| AttemptFailure::NotFound(format!("unpaywall has no OA copy of {doi}")))?
      .to_string();
    download_validated(&self.client, &pdf_url, self.retries, self.min_bytes).await
  }

  /// PubMed Central: DOI → PMCID → article PDF.
  async fn try_pmc(&self, doi: &str) -> core::result::Result<Resolution, AttemptFailure> {
    let url = format!("{}?ids={}&format=json", self.pmc_idconv, urlencoding::encode(doi));
    let body = self.get_json(&url).await?;
    let pmcid = body
      .pointer("/records/0/pmcid")
      .and_then(Value::as_str)
      .ok_or_else(|| AttemptFailure::NotFound(format!("no PMCID for {doi}")))?
      .to_string();
    let pdf_url = format!("{PMC_ARTICLE_BASE}/{pmcid}/pdf/");
    download_validated(&self.client, &pdf_url, self.retries, self.min_bytes).await
  }

  /// Semantic Scholar: open-access PDF field on the paper record.
  async fn try_semantic_scholar(
    &self,
    doi: &str,
  ) -> core::result::Result<Resolution, AttemptFailure> {
    let url = format!("{}/DOI:{doi}?fields=openAccessPdf", self.s2);
    let body = self.get_json(&url).await?;
    let pdf_url = body
      .pointer("/openAccessPdf/url")
      .and_then(Value::as_str)
      .ok_or_else(|| AttemptFailure::NotFound(format!("semantic scholar has no OA PDF for {doi}")))?
      .to_string();
    download_validated(&self.client, &pdf_url, self.retries, self.min_bytes).await
  }
}

#[async_trait]
impl SourceAdapter for OpenAccessAdapter {
  fn source(&self) -> PdfSource { PdfSource::OpenAccess }

  async fn resolve(
    &self,
    ids: &ItemIdentifiers,
  ) -> core::result::Result<Resolution, AttemptFailure> {
    let Some(doi) = ids.doi.as_deref() else {
      return Err(AttemptFailure::MissingIdentifier("doi".into()));
    };

    // fixed sub-order, first validated hit wins; later aggregators are only
    // queried after the earlier ones miss
    match self.try_unpaywall(doi).await {
      Ok(resolution) => return Ok(resolution),
      Err(reason) => debug!(aggregator = "unpaywall", %reason, "aggregator missed"),
    }
    match self.try_pmc(doi).await {
      Ok(resolution) => return Ok(resolution),
      Err(reason) => debug!(aggregator = "pmc", %reason, "aggregator missed"),
    }
    match self.try_semantic_scholar(doi).await {
      Ok(resolution) => return Ok(resolution),
      Err(reason) => debug!(aggregator = "semantic_scholar", %reason, "aggregator missed"),
    }
    Err(AttemptFailure::NotFound(format!("no aggregator has an open-access copy of {doi}")))
  }
}

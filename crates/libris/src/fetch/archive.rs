//! Archive-search adapter.
//!
//! Queries the archive's search API by DOI first; when that yields nothing,
//! falls back to a normalized-title search. Title matching is a best-effort
//! containment heuristic (either title containing the other counts as a
//! match) and the first matching hit with a PDF-format file link wins.

use serde_json::Value;

use crate::config::Settings;

use super::*;

/// Archive search adapter, DOI- or title-queried.
#[derive(Debug, Clone)]
pub struct ArchiveAdapter {
  /// Shared HTTP client.
  client:    reqwest::Client,
  /// Search API base.
  api_base:  String,
  /// Minimum accepted payload size.
  min_bytes: usize,
  /// Bounded retries per request.
  retries:   u32,
}

impl ArchiveAdapter {
  /// Builds the adapter from settings.
  pub fn new(settings: &Settings, client: reqwest::Client) -> Self {
    Self {
      client,
      api_base: settings.endpoints.archive.trim_end_matches('/').to_string(),
      min_bytes: settings.min_pdf_bytes,
      retries: settings.attempt_retries,
    }
  }

  /// Runs one search query and returns its result rows.
  async fn search(
    &self,
    query: &str,
    limit: usize,
  ) -> core::result::Result<Vec<Value>, AttemptFailure> {
    let url =
      format!("{}/v3/search?query={}&limit={limit}", self.api_base, urlencoding::encode(query));
    let response = get_with_retry(&self.client, &url, self.retries).await?;
    let body: Value =
      response.json().await.map_err(|err| AttemptFailure::Network(err.to_string()))?;
    Ok(body.get("results").and_then(Value::as_array).cloned().unwrap_or_default())
  }

  /// Downloads the first PDF-format file link among the hits.
  async fn first_pdf_link(
    &self,
    hits: &[Value],
    title_filter: Option<&str>,
  ) -> core::result::Result<Resolution, AttemptFailure> {
    for hit in hits {
      if let Some(wanted) = title_filter {
        let hit_title = hit.get("title").and_then(Value::as_str).unwrap_or_default();
        if !titles_match(wanted, hit_title) {
          continue;
        }
      }
      let links = hit.get("file_links").and_then(Value::as_array).cloned().unwrap_or_default();
      for link in links {
        let format_is_pdf =
          link.get("file_format").and_then(Value::as_str).is_some_and(|f| f == "pdf");
        let Some(url) = link.get("url").and_then(Value::as_str) else { continue };
        if format_is_pdf {
          match download_validated(&self.client, url, self.retries, self.min_bytes).await {
            Ok(resolution) => return Ok(resolution),
            Err(reason) => debug!(url, %reason, "archive file link failed, trying next"),
          }
        }
      }
    }
    Err(AttemptFailure::NotFound("no archive hit with a usable PDF link".into()))
  }
}

#[async_trait]
impl SourceAdapter for ArchiveAdapter {
  fn source(&self) -> PdfSource { PdfSource::Archive }

  async fn resolve(
    &self,
    ids: &ItemIdentifiers,
  ) -> core::result::Result<Resolution, AttemptFailure> {
    if ids.doi.is_none() && ids.title.is_none() {
      return Err(AttemptFailure::MissingIdentifier("doi or title".into()));
    }

    if let Some(doi) = ids.doi.as_deref() {
      let hits = self.search(doi, 5).await?;
      match self.first_pdf_link(&hits, None).await {
        Ok(resolution) => return Ok(resolution),
        Err(reason) => debug!(%reason, "archive DOI lookup yielded nothing"),
      }
    }

    // DOI lookup dry (or no DOI): best-effort title search
    if let Some(title) = ids.title.as_deref() {
      let hits = self.search(title, 10).await?;
      return self.first_pdf_link(&hits, Some(title)).await;
    }
    Err(AttemptFailure::NotFound("archive has no copy under this DOI".into()))
  }
}

/// Best-effort title equivalence: normalized containment in either
/// direction.
fn titles_match(a: &str, b: &str) -> bool {
  let a = normalize_ws(a).to_lowercase();
  let b = normalize_ws(b).to_lowercase();
  !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn title_matching_is_containment_both_ways() {
    assert!(titles_match("Attention Is All You Need", "attention is all you need"));
    assert!(titles_match(
      "Attention Is All You Need",
      "Attention Is All You Need (Conference Reprint)"
    ));
    assert!(titles_match("Attention  Is\tAll You Need", "attention is all you need"));
    assert!(!titles_match("Attention Is All You Need", "Completely Different Paper"));
    assert!(!titles_match("", "anything"));
  }
}

//! Secondary mirror-set adapter.
//!
//! Mirrors are queried `{host}/{doi}` in configured order. Any individual
//! mirror may be unreachable, or may answer with an HTML interstitial
//! instead of a PDF; the interstitial case is handled by pulling the first
//! embedded `.pdf` link out of the page and resolving that. Each mirror gets
//! the bounded per-request timeout and retry count; exhausting one mirror
//! advances to the next, never blocks the run.

use crate::config::Settings;

use super::*;

lazy_static! {
  /// First href ending in `.pdf` (with optional query string) on a page.
  static ref PDF_HREF: Regex = Regex::new(r#"href=["']([^"']*\.pdf[^"']*)["']"#).unwrap();
}

/// Mirror-set adapter, DOI-queried.
#[derive(Debug, Clone)]
pub struct MirrorsAdapter {
  /// Shared HTTP client.
  client:    reqwest::Client,
  /// Mirror hosts in try order.
  hosts:     Vec<String>,
  /// Minimum accepted payload size.
  min_bytes: usize,
  /// Bounded retries per mirror request.
  retries:   u32,
}

impl MirrorsAdapter {
  /// Builds the adapter from settings.
  pub fn new(settings: &Settings, client: reqwest::Client) -> Self {
    Self {
      client,
      hosts: settings.mirror_hosts.clone(),
      min_bytes: settings.min_pdf_bytes,
      retries: settings.attempt_retries,
    }
  }

  /// Tries one mirror: direct PDF, or interstitial page with a PDF link.
  async fn try_mirror(
    &self,
    host: &str,
    doi: &str,
  ) -> core::result::Result<Resolution, AttemptFailure> {
    let host = host.trim_end_matches('/');
    let page_url = format!("{host}/{doi}");
    let response = get_with_retry(&self.client, &page_url, self.retries).await?;
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

    // some mirrors serve the document straight away
    if validate_payload(&bytes, content_type.as_deref(), self.min_bytes).is_ok() {
      return Ok(Resolution { url: page_url, bytes, content_type });
    }

    // otherwise expect an interstitial embedding the real link
    let page = String::from_utf8_lossy(&bytes);
    if page.to_lowercase().contains("not found") {
      return Err(AttemptFailure::NotFound(format!("{host} has no copy of {doi}")));
    }
    let Some(link) = PDF_HREF.captures(&page).map(|cap| cap[1].to_string()) else {
      return Err(AttemptFailure::InvalidPayload(format!(
        "{host} returned neither a PDF nor a link to one"
      )));
    };
    let pdf_url = absolutize(host, &link);
    download_validated(&self.client, &pdf_url, self.retries, self.min_bytes).await
  }
}

#[async_trait]
impl SourceAdapter for MirrorsAdapter {
  fn source(&self) -> PdfSource { PdfSource::Mirrors }

  async fn resolve(
    &self,
    ids: &ItemIdentifiers,
  ) -> core::result::Result<Resolution, AttemptFailure> {
    let Some(doi) = ids.doi.as_deref() else {
      return Err(AttemptFailure::MissingIdentifier("doi".into()));
    };

    let mut last_failure = AttemptFailure::NotFound("no mirrors configured".into());
    for host in &self.hosts {
      match self.try_mirror(host, doi).await {
        Ok(resolution) => return Ok(resolution),
        Err(reason) => {
          debug!(mirror = %host, %reason, "mirror failed, advancing");
          last_failure = reason;
        },
      }
    }
    Err(last_failure)
  }
}

/// Resolves an interstitial link against the mirror host.
fn absolutize(host: &str, link: &str) -> String {
  if link.starts_with("http://") || link.starts_with("https://") {
    link.to_string()
  } else if let Some(rest) = link.strip_prefix("//") {
    let scheme = host.split("://").next().unwrap_or("https");
    format!("{scheme}://{rest}")
  } else {
    format!("{host}/{}", link.trim_start_matches('/'))
  }
}

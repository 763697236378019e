//! Generic fallback extractor: plain fetch plus structural HTML parsing.
//!
//! Registered last, so it only sees URLs no specific extractor claimed. Any
//! http(s) page that embeds Highwire meta tags yields a usable record; pages
//! without at least a title and an identifier fail with a parse error rather
//! than producing a half-empty item.

use super::{html::scrape_meta, *};

/// Catch-all extractor for unrecognized http(s) URLs.
#[derive(Debug, Clone)]
pub struct GenericExtractor {
  /// Shared HTTP client.
  client: reqwest::Client,
}

impl GenericExtractor {
  /// Builds the extractor over the shared client.
  pub fn new(client: reqwest::Client) -> Self { Self { client } }
}

#[async_trait]
impl Extractor for GenericExtractor {
  fn name(&self) -> &'static str { "generic" }

  fn matches(&self, url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
  }

  async fn extract(&self, url: &str) -> Result<CanonicalItem> {
    let html = self.client.get(url).send().await?.error_for_status()?.text().await?;
    let meta = scrape_meta(&html);
    // no repository id scheme to fall back to; the URL itself identifies the
    // record when the page carries no DOI
    meta.into_item(Repository::Web, url, Some(url.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn matches_any_http_url() {
    let generic = GenericExtractor::new(reqwest::Client::new());
    assert!(generic.matches("https://example.org/paper/123"));
    assert!(generic.matches("http://example.org/paper/123"));
    assert!(!generic.matches("ftp://example.org/paper/123"));
    assert!(!generic.matches("2301.07041"));
  }
}

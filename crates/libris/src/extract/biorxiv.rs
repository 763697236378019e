//! bioRxiv extractor: rendered preprint pages.
//!
//! bioRxiv pages carry their Highwire meta tags in the static document, but
//! subject/collection tags and some dates only appear after client-side
//! rendering. The extractor therefore goes through the injected
//! [`PageRenderer`]: with the browser renderer the record is complete; with
//! the HTTP fallback it may miss subjects but still satisfies the
//! title/identifier invariant or fails with a parse error.

use crate::render::PageRenderer;

use super::{html::scrape_meta, *};

/// Extractor for bioRxiv preprint pages.
pub struct BiorxivExtractor {
  /// Injected rendering capability.
  renderer: Arc<dyn PageRenderer>,
}

impl BiorxivExtractor {
  /// Builds the extractor over the process-wide renderer.
  pub fn new(renderer: Arc<dyn PageRenderer>) -> Self { Self { renderer } }
}

#[async_trait]
impl Extractor for BiorxivExtractor {
  fn name(&self) -> &'static str { "biorxiv" }

  fn matches(&self, url: &str) -> bool {
    url::Url::parse(url)
      .ok()
      .and_then(|u| u.host_str().map(|h| h == "biorxiv.org" || h.ends_with(".biorxiv.org")))
      .unwrap_or(false)
  }

  async fn extract(&self, url: &str) -> Result<CanonicalItem> {
    let html = self.renderer.render(url, None).await?;
    let meta = scrape_meta(&html);
    // content pages end in the DOI-shaped path segment; keep it as the
    // identifier fallback when the meta tags carry no DOI
    let fallback = url::Url::parse(url)
      .ok()
      .and_then(|u| {
        u.path_segments()
          .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
      })
      .map(|segment| segment.trim_end_matches(".full").to_string());
    meta.into_item(Repository::Biorxiv, url, fallback)
  }
}

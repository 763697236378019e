//! Nature extractor: cookie-gated journal pages.
//!
//! Nature article pages expose the same Highwire meta tags as other
//! publishers but sit behind a subscription wall. The extractor refuses to
//! fetch without a live credential entry (a missing or expired cookie is
//! reported as [`LibrisError::AuthRequired`], never silently retried) and
//! sends the stored cookie blob with the render when one exists.

use crate::{credentials::CredentialStore, render::PageRenderer};

use super::{html::scrape_meta, *};

/// Credential-store key for this source.
const SOURCE: &str = "nature";

/// Extractor for Nature journal pages.
pub struct NatureExtractor {
  /// Injected rendering capability.
  renderer:    Arc<dyn PageRenderer>,
  /// Shared credential store, read-only here.
  credentials: Arc<CredentialStore>,
}

impl NatureExtractor {
  /// Builds the extractor over the process-wide renderer and credentials.
  pub fn new(renderer: Arc<dyn PageRenderer>, credentials: Arc<CredentialStore>) -> Self {
    Self { renderer, credentials }
  }
}

#[async_trait]
impl Extractor for NatureExtractor {
  fn name(&self) -> &'static str { "nature" }

  fn matches(&self, url: &str) -> bool {
    url::Url::parse(url)
      .ok()
      .and_then(|u| u.host_str().map(|h| h == "nature.com" || h.ends_with(".nature.com")))
      .unwrap_or(false)
  }

  fn requires_auth(&self) -> bool { true }

  async fn extract(&self, url: &str) -> Result<CanonicalItem> {
    let Some(cookie) = self.credentials.live_cookie(SOURCE) else {
      return Err(LibrisError::AuthRequired(SOURCE.into()));
    };

    let html = self.renderer.render(url, Some(&cookie)).await?;
    let meta = scrape_meta(&html);
    // article slug (e.g. s41586-023-06792-0) when the page has no DOI tag
    let fallback = url::Url::parse(url).ok().and_then(|u| {
      u.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
    });
    meta.into_item(Repository::Nature, url, fallback)
  }
}

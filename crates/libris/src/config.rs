//! The explicit settings value threaded through every operation.
//!
//! Nothing in this crate reads configuration from ambient global state: the
//! caller builds a [`Settings`] once at process start (from defaults or a
//! TOML document) and hands it to [`Service::new`](crate::service::Service::new).
//! Endpoint bases live here too, so tests can point the whole pipeline at
//! local HTTP doubles.
//!
//! # Examples
//!
//! ```
//! use libris::config::Settings;
//!
//! let settings: Settings = Settings::from_toml_str(
//!   r#"
//!     max_concurrency = 2
//!     min_pdf_bytes = 20000
//!     mirror_hosts = ["https://mirror-a.example", "https://mirror-b.example"]
//!   "#,
//! )
//! .unwrap();
//! assert_eq!(settings.max_concurrency, 2);
//! ```

use std::path::Path;

use crate::fetch::PdfSource;

use super::*;

/// Runtime settings for extraction and PDF acquisition.
///
/// Every field has a default, so a TOML document only needs to name what it
/// overrides (serde fills the rest).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// PDF sources in the order the fetcher tries them.
  pub source_order:           Vec<PdfSource>,
  /// Secondary mirror hosts, tried in list order. No rotation: operators
  /// reorder the list to shift load.
  pub mirror_hosts:           Vec<String>,
  /// Per-request timeout, seconds.
  pub request_timeout_secs:   u64,
  /// Overall per-operation deadline, seconds. Once exceeded the fetch
  /// transitions to exhausted regardless of unvisited sources.
  pub operation_timeout_secs: u64,
  /// Retries per mirror or aggregator request after the first attempt.
  pub attempt_retries:        u32,
  /// Worker-pool bound for concurrent top-level operations.
  pub max_concurrency:        usize,
  /// Minimum byte length for a payload to be accepted as a PDF.
  pub min_pdf_bytes:          usize,
  /// Contact e-mail sent to APIs that ask for one.
  pub contact_email:          String,
  /// User agent for scraped sources.
  pub user_agent:             String,
  /// External API endpoint bases.
  pub endpoints:              Endpoints,
}

/// Endpoint bases for the external services the pipeline talks to.
///
/// Split out so integration tests can redirect individual services to local
/// doubles without touching the rest of the settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
  /// arXiv metadata API query endpoint.
  pub arxiv_api:        String,
  /// arXiv direct-PDF base; the repository id is appended.
  pub arxiv_pdf:        String,
  /// Unpaywall REST base; the DOI is appended.
  pub unpaywall:        String,
  /// PubMed Central id-converter endpoint.
  pub pmc_idconv:       String,
  /// Semantic Scholar graph API paper base; `DOI:{doi}` is appended.
  pub semantic_scholar: String,
  /// Archive search API base.
  pub archive:          String,
  /// Reference-manager connector base on the local host.
  pub zotero:           String,
}

impl Default for Endpoints {
  fn default() -> Self {
    Self {
      arxiv_api:        "http://export.arxiv.org/api/query".into(),
      arxiv_pdf:        "https://arxiv.org/pdf".into(),
      unpaywall:        "https://api.unpaywall.org/v2".into(),
      pmc_idconv:       "https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/".into(),
      semantic_scholar: "https://api.semanticscholar.org/graph/v1/paper".into(),
      archive:          "https://api.annas-archive.org".into(),
      zotero:           "http://127.0.0.1:23119".into(),
    }
  }
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      source_order:           vec![
        PdfSource::Arxiv,
        PdfSource::OpenAccess,
        PdfSource::Mirrors,
        PdfSource::Archive,
      ],
      mirror_hosts:           vec![
        "https://sci-hub.se".into(),
        "https://sci-hub.st".into(),
        "https://sci-hub.ru".into(),
      ],
      request_timeout_secs:   30,
      operation_timeout_secs: 180,
      attempt_retries:        2,
      max_concurrency:        4,
      min_pdf_bytes:          10_000,
      contact_email:          "research@example.com".into(),
      user_agent:             "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                               (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .into(),
      endpoints:              Endpoints::default(),
    }
  }
}

impl Settings {
  /// Parses settings from a TOML string, filling unnamed fields with
  /// defaults.
  ///
  /// # Errors
  ///
  /// Returns [`LibrisError::TomlDe`] on malformed TOML and
  /// [`LibrisError::Config`] when the parsed values are unusable.
  pub fn from_toml_str(toml_str: &str) -> Result<Self> {
    let settings: Settings = toml::from_str(toml_str)?;
    settings.validated()
  }

  /// Reads settings from a TOML file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    Self::from_toml_str(&content)
  }

  /// Per-request timeout as a [`Duration`].
  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }

  /// Overall per-operation deadline as a [`Duration`].
  pub fn operation_timeout(&self) -> Duration { Duration::from_secs(self.operation_timeout_secs) }

  /// Checks cross-field constraints that serde defaults cannot express.
  fn validated(self) -> Result<Self> {
    if self.source_order.is_empty() {
      return Err(LibrisError::Config("source_order must name at least one source".into()));
    }
    if self.max_concurrency == 0 {
      return Err(LibrisError::Config("max_concurrency must be at least 1".into()));
    }
    Ok(self)
  }

  /// Builds the shared HTTP client used by extractors and adapters.
  ///
  /// One client per service so connection pools and cookies are reused across
  /// attempts.
  pub fn http_client(&self) -> Result<reqwest::Client> {
    Ok(
      reqwest::Client::builder()
        .user_agent(self.user_agent.clone())
        .timeout(self.request_timeout())
        .build()?,
    )
  }
}

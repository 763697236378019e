//! The page-rendering capability injected into extractors.
//!
//! Some repositories serve their bibliographic metadata only after
//! client-side rendering. Extractors that need a rendered page depend on the
//! [`PageRenderer`] trait rather than branching per call site; the concrete
//! implementation is selected once at startup by [`detect`]:
//!
//! - [`BrowserRenderer`] drives a short-lived headless-browser process per
//!   call (`--dump-dom`), so the external session is released on every exit
//!   path: success, parse failure, or timeout.
//! - [`HttpRenderer`] is the fallback when no browser binary is available: a
//!   plain fetch whose result may miss late-rendered fields, but is enough
//!   for sources that embed metadata in the static document.

use std::{
  path::{Path, PathBuf},
  process::Stdio,
};

use tokio::process::Command;

use super::*;

/// Renders a URL to an HTML document.
#[async_trait]
pub trait PageRenderer: Send + Sync {
  /// Fetches and renders `url`, optionally sending a cookie header.
  ///
  /// # Errors
  ///
  /// Returns [`LibrisError::Network`] or [`LibrisError::Timeout`] when the
  /// page cannot be retrieved within the configured bounds.
  async fn render(&self, url: &str, cookie: Option<&str>) -> Result<String>;

  /// Short tag for logs.
  fn name(&self) -> &'static str;
}

/// Plain-HTTP renderer: fetches the document as served.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
  /// Shared HTTP client.
  client: reqwest::Client,
}

impl HttpRenderer {
  /// Creates a renderer over an existing client.
  pub fn new(client: reqwest::Client) -> Self { Self { client } }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
  async fn render(&self, url: &str, cookie: Option<&str>) -> Result<String> {
    let mut request = self.client.get(url);
    if let Some(cookie) = cookie {
      request = request.header(reqwest::header::COOKIE, cookie);
    }
    let response = request.send().await?.error_for_status()?;
    Ok(response.text().await?)
  }

  fn name(&self) -> &'static str { "http" }
}

/// Headless-browser renderer: one short-lived external process per call.
///
/// Cookie-bearing renders go through the HTTP fallback instead, since the
/// throwaway browser process carries no profile to inject cookies into.
#[derive(Debug)]
pub struct BrowserRenderer {
  /// Resolved browser binary.
  binary:   PathBuf,
  /// Per-render deadline; the process is killed when it elapses.
  timeout:  Duration,
  /// Fallback for cookie-bearing renders.
  fallback: HttpRenderer,
}

impl BrowserRenderer {
  /// Creates a renderer around a resolved browser binary.
  pub fn new(binary: PathBuf, timeout: Duration, fallback: HttpRenderer) -> Self {
    Self { binary, timeout, fallback }
  }
}

#[async_trait]
impl PageRenderer for BrowserRenderer {
  async fn render(&self, url: &str, cookie: Option<&str>) -> Result<String> {
    if cookie.is_some() {
      return self.fallback.render(url, cookie).await;
    }

    debug!(binary = %self.binary.display(), url, "rendering page");
    let child = Command::new(&self.binary)
      .arg("--headless=new")
      .arg("--disable-gpu")
      .arg("--no-sandbox")
      .arg("--dump-dom")
      .arg(url)
      .stdout(Stdio::piped())
      .stderr(Stdio::null())
      .kill_on_drop(true)
      .spawn()?;

    let output = tokio::time::timeout(self.timeout, child.wait_with_output())
      .await
      .map_err(|_| LibrisError::Timeout(format!("render of {url} exceeded deadline")))??;

    if !output.status.success() {
      return Err(LibrisError::Parse(format!(
        "browser exited with {} rendering {url}",
        output.status
      )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }

  fn name(&self) -> &'static str { "browser" }
}

/// Candidate browser binaries probed by [`detect`], in preference order.
const BROWSER_BINARIES: &[&str] =
  &["chromium", "chromium-browser", "google-chrome", "google-chrome-stable", "chrome"];

/// Selects the rendering implementation for this platform, once at startup.
///
/// Probes `PATH` for a headless-capable browser; when none is found every
/// render goes through plain HTTP and extractors degrade as documented in
/// their module docs.
pub fn detect(client: reqwest::Client, timeout: Duration) -> Arc<dyn PageRenderer> {
  let fallback = HttpRenderer::new(client);
  match find_browser() {
    Some(binary) => {
      debug!(binary = %binary.display(), "using headless browser renderer");
      Arc::new(BrowserRenderer::new(binary, timeout, fallback))
    },
    None => {
      debug!("no browser binary found, using plain HTTP renderer");
      Arc::new(fallback)
    },
  }
}

/// Scans `PATH` for the first available browser binary.
fn find_browser() -> Option<PathBuf> {
  let path_var = std::env::var_os("PATH")?;
  for dir in std::env::split_paths(&path_var) {
    for name in BROWSER_BINARIES {
      let candidate = dir.join(name);
      if is_executable(&candidate) {
        return Some(candidate);
      }
    }
  }
  None
}

/// Whether the path points at an executable file.
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;
  path.metadata().map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

/// Whether the path points at an executable file.
#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
  let mut with_ext = path.as_os_str().to_os_string();
  with_ext.push(".exe");
  path.is_file() || Path::new(&with_ext).is_file()
}

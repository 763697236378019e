//! Per-source authentication cookie store.
//!
//! Some repositories gate their pages behind institutional or subscription
//! cookies. The store keeps one entry per source, created or replaced only by
//! the explicit set-credentials operation; extraction logic reads entries but
//! never mutates them. Entries are replaced wholesale, so concurrent readers
//! never observe a partially written record, and no cross-entry locking
//! exists because entries are independent.

use std::path::PathBuf;

use dashmap::DashMap;

use super::*;

/// A stored credential for one gated source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
  /// Raw cookie header blob, `name=value; name2=value2; ...`.
  pub cookie:     String,
  /// Optional expiry; entries past it are treated as absent.
  pub expires_at: Option<DateTime<Utc>>,
  /// When the entry was last replaced.
  pub updated_at: DateTime<Utc>,
}

impl CredentialEntry {
  /// Whether the entry has passed its expiry.
  pub fn expired(&self) -> bool {
    self.expires_at.map(|at| at <= Utc::now()).unwrap_or(false)
  }

  /// Number of `name=value` pairs in the cookie blob.
  pub fn cookie_count(&self) -> usize {
    self.cookie.split(';').filter(|part| part.contains('=')).count()
  }
}

/// Per-source status row returned by the credential-status operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialStatus {
  /// Source name the entry is keyed by.
  pub source:       String,
  /// Number of cookies in the stored blob.
  pub cookie_count: usize,
  /// Whether the entry has expired.
  pub expired:      bool,
  /// When the entry was last replaced.
  pub updated_at:   DateTime<Utc>,
}

/// Process-lifetime keyed store of per-source cookies.
///
/// Keys are case-insensitive source names ("nature" and "Nature" address the
/// same entry). Reads take a shard reference only; writes replace the whole
/// entry.
#[derive(Debug, Default)]
pub struct CredentialStore {
  /// Entries keyed by lowercased source name.
  entries: DashMap<String, CredentialEntry>,
}

impl CredentialStore {
  /// Creates an empty store.
  pub fn new() -> Self { Self::default() }

  /// Creates or replaces the entry for `source`.
  pub fn set(&self, source: &str, cookie: &str, expires_at: Option<DateTime<Utc>>) {
    let entry = CredentialEntry {
      cookie: cookie.trim().to_string(),
      expires_at,
      updated_at: Utc::now(),
    };
    debug!(source = %source, cookies = entry.cookie_count(), "storing credentials");
    self.entries.insert(source.to_lowercase(), entry);
  }

  /// Returns the live cookie blob for `source`, or `None` when the entry is
  /// absent or expired.
  ///
  /// Callers that require authentication convert `None` into
  /// [`LibrisError::AuthRequired`]; expiry is never silently retried past.
  pub fn live_cookie(&self, source: &str) -> Option<String> {
    let entry = self.entries.get(&source.to_lowercase())?;
    if entry.expired() {
      trace!(source = %source, "credential entry expired");
      return None;
    }
    Some(entry.cookie.clone())
  }

  /// Status rows for every stored entry, sorted by source name.
  pub fn status(&self) -> Vec<CredentialStatus> {
    let mut rows: Vec<CredentialStatus> = self
      .entries
      .iter()
      .map(|kv| CredentialStatus {
        source:       kv.key().clone(),
        cookie_count: kv.value().cookie_count(),
        expired:      kv.value().expired(),
        updated_at:   kv.value().updated_at,
      })
      .collect();
    rows.sort_by(|a, b| a.source.cmp(&b.source));
    rows
  }

  /// Loads cookie files from the user's config directory.
  ///
  /// Missing directory is not an error; there is simply nothing to load.
  pub fn load_from_config_dir(&self) -> Result<usize> {
    match Self::default_config_dir() {
      Some(dir) => self.load_from_dir(&dir),
      None => Ok(0),
    }
  }

  /// Loads cookie files from a directory.
  ///
  /// Each `<source>_cookies.txt` file under the directory becomes an entry
  /// keyed by `<source>`; blank lines and `#` comments are ignored.
  pub fn load_from_dir(&self, dir: &std::path::Path) -> Result<usize> {
    if !dir.is_dir() {
      return Ok(0);
    }

    let mut loaded = 0;
    for entry in std::fs::read_dir(dir)? {
      let path = entry?.path();
      let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
      let Some(source) = name.strip_suffix("_cookies.txt") else { continue };

      let content = std::fs::read_to_string(&path)?;
      let cookie: String = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("; ");
      if cookie.is_empty() {
        warn!(file = %path.display(), "cookie file contained no cookies");
        continue;
      }
      self.set(source, &cookie, None);
      loaded += 1;
    }
    Ok(loaded)
  }

  /// Default directory for cookie files: `~/.config/libris` (platform
  /// equivalent).
  fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("libris"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn set_then_read_round_trips() {
    let store = CredentialStore::new();
    assert!(store.live_cookie("Nature").is_none());

    store.set("Nature", "session=abc; csrf=def", None);
    assert_eq!(store.live_cookie("nature").as_deref(), Some("session=abc; csrf=def"));
  }

  #[test]
  fn expired_entries_read_as_absent() {
    let store = CredentialStore::new();
    store.set("nature", "session=abc", Some(Utc::now() - chrono::Duration::minutes(1)));
    assert!(store.live_cookie("nature").is_none());

    // status still reports the entry so the operator can see it expired
    let status = store.status();
    assert_eq!(status.len(), 1);
    assert!(status[0].expired);
  }

  #[test]
  fn replacement_is_wholesale() {
    let store = CredentialStore::new();
    store.set("nature", "a=1; b=2", None);
    store.set("nature", "c=3", None);

    let status = store.status();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].cookie_count, 1);
    assert_eq!(store.live_cookie("nature").as_deref(), Some("c=3"));
  }

  #[test]
  fn cookie_files_load_by_source_name() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
      dir.path().join("nature_cookies.txt"),
      "# institutional session\nsession=abc\ncsrf=def\n\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a cookie file").unwrap();

    let store = CredentialStore::new();
    let loaded = store.load_from_dir(dir.path()).unwrap();
    assert_eq!(loaded, 1);
    assert_eq!(store.live_cookie("nature").as_deref(), Some("session=abc; csrf=def"));
  }
}

//! Core metadata types shared by every extractor and consumer.
//!
//! This module provides the normalized record produced by metadata
//! extraction, along with the normalization rules that make records from
//! different repositories comparable:
//!
//! - [`CanonicalItem`]: the normalized metadata record
//! - [`Author`]: a single byline entry, split into given/family parts
//! - [`Repository`]: the source repository tag
//! - DOI, date, and whitespace normalization helpers
//!
//! # Examples
//!
//! ```
//! use libris::item::{normalize_doi, Author};
//!
//! let author = Author::parse("Hinton, Geoffrey");
//! assert_eq!(author.family, "Hinton");
//! assert_eq!(author.given, "Geoffrey");
//!
//! assert_eq!(normalize_doi("https://doi.org/10.1038/NATURE12345"), "10.1038/nature12345");
//! ```

use super::*;

/// The normalized metadata record produced by an extractor.
///
/// Every producer (extractor variants) and consumer (PDF fetcher, validation
/// engine, connector persistence) shares this one shape. A successfully
/// extracted item always carries a non-empty title and source identifier;
/// extraction that cannot establish both fails with
/// [`LibrisError::Parse`](crate::error::LibrisError::Parse) rather than
/// producing a partially valid record.
///
/// Equality ignores [`retrieved_at`](Self::retrieved_at): the retrieval stamp
/// is declared volatile, so two extractions of unchanged upstream content
/// compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalItem {
  /// The paper's full title.
  pub title:             String,
  /// Byline authors in byline order, never reordered.
  pub authors:           Vec<Author>,
  /// Full abstract text, when the source provides one.
  pub abstract_text:     Option<String>,
  /// Publication date, normalized to a calendar date.
  pub publication_date:  Option<NaiveDate>,
  /// DOI, normalized lowercase with resolver prefixes stripped.
  pub doi:               Option<String>,
  /// Subject/category tags.
  pub subjects:          BTreeSet<String>,
  /// Source repository this record came from.
  pub source:            Repository,
  /// Source-specific identifier (arXiv id, DOI, or the URL itself).
  pub source_identifier: String,
  /// The URL the record was extracted from.
  pub source_url:        String,
  /// Resolved PDF location, when the source advertises one.
  pub pdf_url:           Option<String>,
  /// When this record was extracted. Volatile: excluded from equality.
  pub retrieved_at:      DateTime<Utc>,
}

impl PartialEq for CanonicalItem {
  fn eq(&self, other: &Self) -> bool {
    self.title == other.title
      && self.authors == other.authors
      && self.abstract_text == other.abstract_text
      && self.publication_date == other.publication_date
      && self.doi == other.doi
      && self.subjects == other.subjects
      && self.source == other.source
      && self.source_identifier == other.source_identifier
      && self.source_url == other.source_url
      && self.pdf_url == other.pdf_url
  }
}

impl Eq for CanonicalItem {}

impl CanonicalItem {
  /// Checks the title/identifier invariant, consuming and returning the item.
  ///
  /// # Errors
  ///
  /// Returns [`LibrisError::Parse`] when the title or source identifier is
  /// empty; absence of either is a typed failure, never a partially valid
  /// record.
  pub fn ensure_valid(self) -> Result<Self> {
    if self.title.trim().is_empty() {
      return Err(LibrisError::Parse(format!("no title extracted from {}", self.source_url)));
    }
    if self.source_identifier.trim().is_empty() {
      return Err(LibrisError::Parse(format!("no identifier extracted from {}", self.source_url)));
    }
    Ok(self)
  }

  /// Generates a filesystem-safe attachment filename from the title.
  pub fn filename(&self) -> String {
    format!("{}.pdf", format_title(&self.title, 50))
  }
}

/// A single byline author.
///
/// Order within [`CanonicalItem::authors`] is byline order; consumers never
/// reorder it. Sources that only give a single-token name leave
/// [`given`](Self::given) empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
  /// Given name(s), possibly empty.
  pub given:  String,
  /// Family name.
  pub family: String,
}

impl Author {
  /// Splits a display name into given/family parts.
  ///
  /// Handles both "Family, Given" and "Given Family" forms; a single token is
  /// treated as a bare family name.
  pub fn parse(name: &str) -> Self {
    let name = name.trim();
    if let Some((family, given)) = name.split_once(',') {
      return Self { given: given.trim().to_string(), family: family.trim().to_string() };
    }
    match name.rsplit_once(char::is_whitespace) {
      Some((given, family)) => Self { given: given.trim().to_string(), family: family.to_string() },
      None => Self { given: String::new(), family: name.to_string() },
    }
  }
}

impl Display for Author {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if self.given.is_empty() {
      write!(f, "{}", self.family)
    } else {
      write!(f, "{} {}", self.given, self.family)
    }
  }
}

/// Source repository a record was extracted from.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repository {
  /// arXiv.org, queried through the official metadata API.
  Arxiv,
  /// bioRxiv preprints, extracted from rendered pages.
  Biorxiv,
  /// Nature journals, cookie-gated.
  Nature,
  /// Any other site handled by the structural-HTML fallback.
  Web,
}

impl Display for Repository {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Repository::Arxiv => write!(f, "arxiv"),
      Repository::Biorxiv => write!(f, "biorxiv"),
      Repository::Nature => write!(f, "nature"),
      Repository::Web => write!(f, "web"),
    }
  }
}

impl FromStr for Repository {
  type Err = LibrisError;

  fn from_str(s: &str) -> Result<Self> {
    match &s.to_lowercase() as &str {
      "arxiv" => Ok(Repository::Arxiv),
      "biorxiv" => Ok(Repository::Biorxiv),
      "nature" => Ok(Repository::Nature),
      "web" => Ok(Repository::Web),
      s => Err(LibrisError::UnsupportedSource(s.to_owned())),
    }
  }
}

/// Normalizes a DOI for storage and comparison.
///
/// Strips resolver prefixes (`https://doi.org/`, `http://dx.doi.org/`) and a
/// `doi:` scheme, trims, and lowercases. DOIs are case-insensitive by
/// definition, so the lowercase form is canonical.
pub fn normalize_doi(raw: &str) -> String {
  let mut doi = raw.trim();
  for prefix in ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "http://dx.doi.org/"]
  {
    if let Some(rest) = doi.strip_prefix(prefix) {
      doi = rest;
      break;
    }
  }
  if let Some(rest) = doi.strip_prefix("doi:") {
    doi = rest;
  }
  doi.trim().to_lowercase()
}

/// Collapses runs of whitespace to single spaces and trims.
pub fn normalize_ws(raw: &str) -> String {
  raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses the date formats the supported repositories emit into a calendar
/// date.
///
/// Accepts RFC 3339 timestamps (the Atom feed form), bare `YYYY-MM-DD`, and
/// the slashed `YYYY/MM/DD` form some records carry. Returns `None` for
/// anything else; a missing date is representable, a garbled one is not worth
/// guessing at.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.date_naive());
  }
  for format in ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%d", "%Y/%m/%d"] {
    if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
      return Some(date);
    }
  }
  // Timestamp with a parseable date prefix
  if raw.len() >= 10 {
    if let Ok(date) = NaiveDate::parse_from_str(&raw[..10], "%Y-%m-%d") {
      return Some(date);
    }
  }
  None
}

lazy_static! {
  /// Matches a modern arXiv identifier with an optional version suffix.
  static ref ARXIV_ID: Regex = Regex::new(r"(\d{4}\.\d{4,5})(?:v\d+)?").unwrap();
}

/// Recovers an arXiv identifier from an abs/pdf URL or an `arxiv:` reference.
///
/// Parses forms like `https://arxiv.org/abs/2301.07041`,
/// `https://arxiv.org/pdf/2301.07041v2.pdf`, and `arXiv:2301.07041`.
pub fn arxiv_id_from_url(url: &str) -> Option<String> {
  let lower = url.to_lowercase();
  if !lower.contains("arxiv.org/") && !lower.contains("arxiv:") {
    return None;
  }
  ARXIV_ID.captures(url).map(|cap| cap[1].to_string())
}

/// Recovers an arXiv identifier from an arXiv-style DOI
/// (`10.48550/arXiv.2301.07041`) or a DOI that embeds an arXiv URL.
pub fn arxiv_id_from_doi(doi: &str) -> Option<String> {
  let lower = doi.to_lowercase();
  if !lower.contains("arxiv") {
    return None;
  }
  ARXIV_ID.captures(doi).map(|cap| cap[1].to_string())
}

/// Truncates and sanitizes a title for use in a filename.
fn format_title(title: &str, max_len: usize) -> String {
  let cleaned: String = title
    .chars()
    .map(|c| if c.is_alphanumeric() || c == ' ' || c == '-' { c } else { ' ' })
    .collect();
  let collapsed = normalize_ws(&cleaned);
  collapsed.chars().take(max_len).collect::<String>().trim_end().to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_item() -> CanonicalItem {
    CanonicalItem {
      title:             "Attention Is All You Need".into(),
      authors:           vec![Author::parse("Ashish Vaswani")],
      abstract_text:     Some("The dominant sequence transduction models...".into()),
      publication_date:  parse_date("2017-06-12T17:57:34Z"),
      doi:               Some(normalize_doi("10.48550/arXiv.1706.03762")),
      subjects:          BTreeSet::from(["cs.CL".to_string()]),
      source:            Repository::Arxiv,
      source_identifier: "1706.03762".into(),
      source_url:        "https://arxiv.org/abs/1706.03762".into(),
      pdf_url:           Some("https://arxiv.org/pdf/1706.03762.pdf".into()),
      retrieved_at:      Utc::now(),
    }
  }

  #[test]
  fn author_parse_handles_both_name_orders() {
    let comma = Author::parse("Hinton, Geoffrey E.");
    assert_eq!(comma.family, "Hinton");
    assert_eq!(comma.given, "Geoffrey E.");

    let plain = Author::parse("Geoffrey E. Hinton");
    assert_eq!(plain.family, "Hinton");
    assert_eq!(plain.given, "Geoffrey E.");

    let bare = Author::parse("Madonna");
    assert_eq!(bare.family, "Madonna");
    assert!(bare.given.is_empty());
  }

  #[test]
  fn doi_normalization_strips_prefixes_and_case() {
    assert_eq!(normalize_doi("doi:10.1145/1327452.1327492"), "10.1145/1327452.1327492");
    assert_eq!(normalize_doi("https://doi.org/10.1038/Nature12345 "), "10.1038/nature12345");
    assert_eq!(normalize_doi("10.48550/arXiv.2301.07041"), "10.48550/arxiv.2301.07041");
  }

  #[test]
  fn date_parsing_accepts_repository_forms() {
    let expected = NaiveDate::from_ymd_opt(2023, 1, 17).unwrap();
    assert_eq!(parse_date("2023-01-17T18:59:59Z"), Some(expected));
    assert_eq!(parse_date("2023-01-17"), Some(expected));
    assert_eq!(parse_date("2023/01/17"), Some(expected));
    assert_eq!(parse_date("January of last year"), None);
  }

  #[test]
  fn equality_ignores_retrieval_stamp() {
    let a = sample_item();
    let mut b = a.clone();
    b.retrieved_at = Utc::now() + chrono::Duration::hours(1);
    assert_eq!(a, b);

    b.title = "Attention Is Not All You Need".into();
    assert_ne!(a, b);
  }

  #[test]
  fn arxiv_id_recovery() {
    assert_eq!(arxiv_id_from_url("https://arxiv.org/abs/2301.07041"), Some("2301.07041".into()));
    assert_eq!(
      arxiv_id_from_url("https://arxiv.org/pdf/2301.07041v2.pdf"),
      Some("2301.07041".into())
    );
    assert_eq!(arxiv_id_from_url("https://example.com/2301.07041"), None);
    assert_eq!(arxiv_id_from_doi("10.48550/arXiv.1706.03762"), Some("1706.03762".into()));
    assert_eq!(arxiv_id_from_doi("10.1038/nature12345"), None);
  }

  #[test]
  fn invariant_rejects_empty_title() {
    let mut item = sample_item();
    item.title = "  ".into();
    assert!(matches!(item.ensure_valid(), Err(LibrisError::Parse(_))));
  }

  #[test]
  fn filename_is_sanitized_and_bounded() {
    let mut item = sample_item();
    item.title = "Scaling Laws: A Very / Long * Title That Goes On And On Well Past Fifty \
                  Characters Total"
      .into();
    let name = item.filename();
    assert!(name.ends_with(".pdf"));
    assert!(name.len() <= 54);
    assert!(!name.contains('/'));
    assert!(!name.contains(':'));
  }
}

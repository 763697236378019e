//! Primary-repository extractor: the official arXiv metadata API.
//!
//! arXiv is the one supported repository with a real metadata API, so this
//! extractor never scrapes: identifiers recovered from abs/pdf URLs are
//! resolved through the Atom query endpoint, and the same endpoint backs
//! [`ArxivExtractor::search`] with field-prefixed advanced queries
//! (`ti:`, `au:`, `abs:`).

use quick_xml::{events::Event, Reader};

use crate::config::Settings;

use super::*;

/// Hard cap on search results per query, mirroring the API's own etiquette.
const MAX_SEARCH_RESULTS: usize = 50;

/// Extractor for arXiv URLs and identifiers.
#[derive(Debug, Clone)]
pub struct ArxivExtractor {
  /// Shared HTTP client.
  client:   reqwest::Client,
  /// Metadata API query endpoint.
  api_base: String,
  /// Direct-PDF base for the canonical pdf_url.
  pdf_base: String,
}

impl ArxivExtractor {
  /// Builds the extractor from settings.
  pub fn new(settings: &Settings, client: reqwest::Client) -> Self {
    Self {
      client,
      api_base: settings.endpoints.arxiv_api.clone(),
      pdf_base: settings.endpoints.arxiv_pdf.trim_end_matches('/').to_string(),
    }
  }

  /// Queries the metadata API for one identifier.
  async fn query_by_id(&self, id: &str) -> Result<CanonicalItem> {
    let url = format!("{}?id_list={}&max_results=1", self.api_base, urlencoding::encode(id));
    let body = self.client.get(&url).send().await?.error_for_status()?.text().await?;
    trace!(id, "arxiv api response: {} bytes", body.len());

    let entries = parse_feed(&body)?;
    let entry = entries
      .into_iter()
      .next()
      .ok_or_else(|| LibrisError::Parse(format!("no feed entry for arXiv id {id}")))?;
    entry.into_item(id, &self.pdf_base)
  }

  /// Searches the repository feed.
  ///
  /// Field-prefixed queries (`ti:transformer au:hinton`) pass through to the
  /// API verbatim; `max_results` is capped at 50. Entries that cannot
  /// satisfy the title/identifier invariant are dropped rather than
  /// reported half-formed.
  pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<CanonicalItem>> {
    let capped = max_results.min(MAX_SEARCH_RESULTS);
    let url = format!(
      "{}?search_query={}&max_results={}&sortBy=submittedDate&sortOrder=descending",
      self.api_base,
      urlencoding::encode(query),
      capped
    );
    debug!(query, capped, "searching arxiv");
    let body = self.client.get(&url).send().await?.error_for_status()?.text().await?;

    let entries = parse_feed(&body)?;
    Ok(
      entries
        .into_iter()
        .filter_map(|entry| {
          let id = entry.identifier()?;
          entry.into_item(&id, &self.pdf_base).ok()
        })
        .collect(),
    )
  }
}

#[async_trait]
impl Extractor for ArxivExtractor {
  fn name(&self) -> &'static str { "arxiv" }

  fn matches(&self, url: &str) -> bool { arxiv_id_from_url(url).is_some() }

  async fn extract(&self, url: &str) -> Result<CanonicalItem> {
    let id = arxiv_id_from_url(url)
      .ok_or_else(|| LibrisError::UnsupportedSource(url.to_string()))?;
    self.query_by_id(&id).await
  }
}

/// One `<entry>` from the Atom feed, as raw strings.
#[derive(Debug, Default)]
struct FeedEntry {
  /// `<id>` element: the abs URL.
  id:         String,
  /// `<title>` text.
  title:      String,
  /// `<summary>` text.
  summary:    String,
  /// `<published>` timestamp.
  published:  String,
  /// `<author><name>` texts, in feed order.
  authors:    Vec<String>,
  /// `<category term=...>` attributes.
  categories: Vec<String>,
  /// `<arxiv:doi>` text, when present.
  doi:        String,
  /// PDF `<link>` href, when present.
  pdf_url:    String,
}

impl FeedEntry {
  /// Recovers the bare identifier from the entry's abs URL.
  fn identifier(&self) -> Option<String> { arxiv_id_from_url(&self.id) }

  /// Converts the raw entry into a canonical item.
  fn into_item(self, id: &str, pdf_base: &str) -> Result<CanonicalItem> {
    let identifier = self.identifier().unwrap_or_else(|| id.to_string());
    let doi = (!self.doi.is_empty()).then(|| normalize_doi(&self.doi));
    let abstract_text = {
      let cleaned = normalize_ws(&self.summary);
      (!cleaned.is_empty()).then_some(cleaned)
    };
    let pdf_url = if self.pdf_url.is_empty() {
      format!("{pdf_base}/{identifier}.pdf")
    } else {
      self.pdf_url
    };

    CanonicalItem {
      title: normalize_ws(&self.title),
      authors: self.authors.iter().map(|name| Author::parse(name)).collect(),
      abstract_text,
      publication_date: parse_date(&self.published),
      doi,
      subjects: self.categories.into_iter().collect(),
      source: Repository::Arxiv,
      source_url: format!("https://arxiv.org/abs/{identifier}"),
      source_identifier: identifier,
      pdf_url: Some(pdf_url),
      retrieved_at: Utc::now(),
    }
    .ensure_valid()
  }
}

/// Strips any namespace prefix from an element name.
fn local_name(raw: &[u8]) -> String {
  let name = String::from_utf8_lossy(raw);
  name.rsplit(':').next().unwrap_or(&name).to_string()
}

/// Reads one attribute off a start/empty tag.
fn attr_value(tag: &quick_xml::events::BytesStart<'_>, key: &str) -> Option<String> {
  tag
    .attributes()
    .flatten()
    .find(|attr| attr.key.as_ref() == key.as_bytes())
    .and_then(|attr| attr.unescape_value().ok())
    .map(|value| value.into_owned())
}

/// Parses an Atom feed into its entries.
///
/// Walks the event stream with an element-path stack instead of building a
/// DOM; the feed is flat enough that the path's tail identifies every field
/// we care about. Namespace prefixes (`arxiv:doi`) are stripped the same way
/// regardless of declaration.
fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
  let mut reader = Reader::from_str(xml);
  reader.config_mut().trim_text(true);

  let mut entries = Vec::new();
  let mut entry: Option<FeedEntry> = None;
  let mut path: Vec<String> = Vec::new();

  loop {
    match reader.read_event() {
      Ok(Event::Start(tag)) => {
        let name = local_name(tag.name().as_ref());
        if name == "entry" {
          entry = Some(FeedEntry::default());
        }
        if let Some(current) = entry.as_mut() {
          match name.as_str() {
            "author" => current.authors.push(String::new()),
            "category" =>
              if let Some(term) = attr_value(&tag, "term") {
                current.categories.push(term);
              },
            "link" => collect_pdf_link(current, &tag),
            _ => {},
          }
        }
        path.push(name);
      },
      Ok(Event::Empty(tag)) => {
        let name = local_name(tag.name().as_ref());
        if let Some(current) = entry.as_mut() {
          match name.as_str() {
            "category" =>
              if let Some(term) = attr_value(&tag, "term") {
                current.categories.push(term);
              },
            "link" => collect_pdf_link(current, &tag),
            _ => {},
          }
        }
      },
      Ok(Event::Text(text)) => {
        let Some(current) = entry.as_mut() else { continue };
        let value = text
          .unescape()
          .map_err(|e| LibrisError::Parse(format!("feed text: {e}")))?;
        match path.last().map(String::as_str) {
          Some("id") => append(&mut current.id, &value),
          Some("title") => append(&mut current.title, &value),
          Some("summary") => append(&mut current.summary, &value),
          Some("published") => append(&mut current.published, &value),
          Some("doi") => append(&mut current.doi, &value),
          Some("name") if path.iter().rev().nth(1).map(String::as_str) == Some("author") =>
            if let Some(author) = current.authors.last_mut() {
              append(author, &value);
            },
          _ => {},
        }
      },
      Ok(Event::End(tag)) => {
        if local_name(tag.name().as_ref()) == "entry" {
          if let Some(finished) = entry.take() {
            entries.push(finished);
          }
        }
        path.pop();
      },
      Ok(Event::Eof) => break,
      Err(e) => return Err(LibrisError::Parse(format!("feed XML: {e}"))),
      _ => {},
    }
  }
  Ok(entries)
}

/// Records a `<link>` pointing at the PDF rendition.
fn collect_pdf_link(entry: &mut FeedEntry, tag: &quick_xml::events::BytesStart<'_>) {
  let is_pdf = attr_value(tag, "title").is_some_and(|t| t == "pdf")
    || attr_value(tag, "type").is_some_and(|t| t == "application/pdf");
  if is_pdf {
    if let Some(href) = attr_value(tag, "href") {
      entry.pdf_url = href;
    }
  }
}

/// Appends a text chunk, joining split chunks with a space.
fn append(field: &mut String, chunk: &str) {
  if !field.is_empty() {
    field.push(' ');
  }
  field.push_str(chunk.trim());
}

#[cfg(test)]
mod tests {
  use super::*;

  const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
  <feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
    <entry>
      <id>http://arxiv.org/abs/2301.07041v1</id>
      <updated>2023-01-17T18:53:08Z</updated>
      <published>2023-01-17T18:53:08Z</published>
      <title>Verifiable Fully Homomorphic
        Encryption</title>
      <summary>  Fully Homomorphic Encryption (FHE) is seeing increasing real-world deployment...
      </summary>
      <author><name>Alexander Viand</name></author>
      <author><name>Christian Knabenhans</name></author>
      <arxiv:doi xmlns:arxiv="http://arxiv.org/schemas/atom">10.48550/arXiv.2301.07041</arxiv:doi>
      <link href="http://arxiv.org/abs/2301.07041v1" rel="alternate" type="text/html"/>
      <link title="pdf" href="http://arxiv.org/pdf/2301.07041v1" rel="related" type="application/pdf"/>
      <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="cs.CR" scheme="http://arxiv.org/schemas/atom"/>
      <category term="cs.CR" scheme="http://arxiv.org/schemas/atom"/>
      <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    </entry>
  </feed>"#;

  #[test]
  fn feed_parse_extracts_every_field() {
    let entries = parse_feed(FEED).unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.identifier().as_deref(), Some("2301.07041"));
    assert_eq!(entry.authors, vec!["Alexander Viand", "Christian Knabenhans"]);
    assert_eq!(entry.doi, "10.48550/arXiv.2301.07041");
    assert_eq!(entry.pdf_url, "http://arxiv.org/pdf/2301.07041v1");
    assert_eq!(entry.categories, vec!["cs.CR", "cs.LG"]);
  }

  #[test]
  fn entry_normalizes_into_canonical_item() {
    let entries = parse_feed(FEED).unwrap();
    let item = entries.into_iter().next().unwrap().into_item("2301.07041", "https://arxiv.org/pdf").unwrap();

    assert_eq!(item.title, "Verifiable Fully Homomorphic Encryption");
    assert_eq!(item.source, Repository::Arxiv);
    assert_eq!(item.source_identifier, "2301.07041");
    assert_eq!(item.doi.as_deref(), Some("10.48550/arxiv.2301.07041"));
    assert_eq!(item.publication_date, NaiveDate::from_ymd_opt(2023, 1, 17));
    assert!(item.subjects.contains("cs.CR") && item.subjects.contains("cs.LG"));
    assert_eq!(item.authors[0].family, "Viand");
  }

  #[test]
  fn empty_feed_yields_no_entries() {
    let entries =
      parse_feed(r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>query</title></feed>"#)
        .unwrap();
    assert!(entries.is_empty());
  }

  #[test]
  fn malformed_xml_is_a_parse_error() {
    assert!(matches!(
      parse_feed("<feed><entry></wrong></feed>"),
      Err(LibrisError::Parse(_))
    ));
  }
}

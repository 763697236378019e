//! Structural-HTML metadata scraping shared by the page-based extractors.
//!
//! Publisher pages embed bibliographic metadata as Highwire `citation_*`
//! meta tags. This module pulls those tags out of a document and assembles a
//! [`CanonicalItem`]; each extractor supplies the repository tag and an
//! identifier fallback.

use scraper::{Html, Selector};

use super::*;

/// Raw metadata pulled from a page's meta tags.
#[derive(Debug, Default)]
pub(crate) struct PageMeta {
  /// `citation_title`.
  pub title:         Option<String>,
  /// `citation_author`, in document order.
  pub authors:       Vec<String>,
  /// `citation_abstract`, falling back to `og:description`.
  pub abstract_text: Option<String>,
  /// First of `citation_publication_date`, `citation_date`,
  /// `citation_online_date`.
  pub date:          Option<String>,
  /// `citation_doi`.
  pub doi:           Option<String>,
  /// `citation_pdf_url`.
  pub pdf_url:       Option<String>,
  /// `citation_keywords` and section tags, split on separators.
  pub subjects:      Vec<String>,
}

/// Extracts the meta tags this pipeline understands from a document.
///
/// Purely synchronous: the parsed DOM never crosses an await point.
pub(crate) fn scrape_meta(html: &str) -> PageMeta {
  let document = Html::parse_document(html);
  let selector = Selector::parse("meta").expect("static selector");

  let mut meta = PageMeta::default();
  for element in document.select(&selector) {
    let Some(name) = element.value().attr("name").or_else(|| element.value().attr("property"))
    else {
      continue;
    };
    let Some(content) = element.value().attr("content") else { continue };
    let content = normalize_ws(content);
    if content.is_empty() {
      continue;
    }

    match name.to_ascii_lowercase().as_str() {
      "citation_title" | "dc.title" =>
        if meta.title.is_none() {
          meta.title = Some(content);
        },
      "citation_author" | "dc.creator" => meta.authors.push(content),
      "citation_abstract" => meta.abstract_text = Some(content),
      "og:description" | "description" =>
        if meta.abstract_text.is_none() {
          meta.abstract_text = Some(content);
        },
      "citation_publication_date" | "citation_date" | "citation_online_date" | "dc.date" =>
        if meta.date.is_none() {
          meta.date = Some(content);
        },
      "citation_doi" | "dc.identifier" =>
        if meta.doi.is_none() && content.contains('/') {
          meta.doi = Some(content);
        },
      "citation_pdf_url" =>
        if meta.pdf_url.is_none() {
          meta.pdf_url = Some(content);
        },
      "citation_keywords" | "citation_section" | "article:section" => meta
        .subjects
        .extend(content.split([';', ',']).map(normalize_ws).filter(|s| !s.is_empty())),
      _ => {},
    }
  }
  meta
}

impl PageMeta {
  /// Assembles a canonical item from scraped meta tags.
  ///
  /// `identifier_fallback` is used when the page carries no DOI; the
  /// title/identifier invariant is enforced before returning.
  pub(crate) fn into_item(
    self,
    source: Repository,
    source_url: &str,
    identifier_fallback: Option<String>,
  ) -> Result<CanonicalItem> {
    let doi = self.doi.as_deref().map(normalize_doi);
    let identifier = doi
      .clone()
      .or(identifier_fallback)
      .unwrap_or_default();

    CanonicalItem {
      title: self.title.unwrap_or_default(),
      authors: self.authors.iter().map(|name| Author::parse(name)).collect(),
      abstract_text: self.abstract_text,
      publication_date: self.date.as_deref().and_then(parse_date),
      doi,
      subjects: self.subjects.into_iter().collect(),
      source,
      source_identifier: identifier,
      source_url: source_url.to_string(),
      pdf_url: self.pdf_url,
      retrieved_at: Utc::now(),
    }
    .ensure_valid()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PAGE: &str = r#"
    <html><head>
      <meta name="citation_title" content="Cortical  plasticity in adult mice" />
      <meta name="citation_author" content="Doe, Jane" />
      <meta name="citation_author" content="Richard Roe" />
      <meta name="citation_publication_date" content="2023/05/01" />
      <meta name="citation_doi" content="10.1101/2023.05.01.538915" />
      <meta name="citation_pdf_url" content="https://www.biorxiv.org/content/10.1101/2023.05.01.538915.full.pdf" />
      <meta name="citation_abstract" content="We show that..." />
      <meta name="citation_keywords" content="neuroscience; plasticity" />
    </head><body></body></html>
  "#;

  #[test]
  fn scrape_reads_highwire_tags_in_order() {
    let meta = scrape_meta(PAGE);
    assert_eq!(meta.title.as_deref(), Some("Cortical plasticity in adult mice"));
    assert_eq!(meta.authors, vec!["Doe, Jane", "Richard Roe"]);
    assert_eq!(meta.doi.as_deref(), Some("10.1101/2023.05.01.538915"));
    assert_eq!(meta.subjects, vec!["neuroscience", "plasticity"]);
  }

  #[test]
  fn into_item_preserves_byline_order() {
    let item = scrape_meta(PAGE)
      .into_item(Repository::Biorxiv, "https://www.biorxiv.org/x", None)
      .unwrap();
    assert_eq!(item.authors[0].family, "Doe");
    assert_eq!(item.authors[1].family, "Roe");
    assert_eq!(item.source_identifier, "10.1101/2023.05.01.538915");
    assert_eq!(item.publication_date, NaiveDate::from_ymd_opt(2023, 5, 1));
  }

  #[test]
  fn page_without_title_fails_parse() {
    let meta = scrape_meta("<html><head></head></html>");
    let result = meta.into_item(Repository::Web, "https://example.com", None);
    assert!(matches!(result, Err(LibrisError::Parse(_))));
  }
}

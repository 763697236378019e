//! Stored-record drift detection and correction.
//!
//! A record saved months ago can drift from what the authoritative metadata
//! API now says: abstracts get revised, titles corrected, dates amended. The
//! [`ValidationEngine`] fetches the stored record through the connector,
//! re-extracts the canonical record via the primary-repository extractor
//! using the stored identifier, and computes one [`FieldDiff`] per tracked
//! field using field-appropriate normalization: whitespace and case for
//! textual fields, DOI and date normalization for structured ones, family-
//! name sets for authors.
//!
//! Corrections are opt-in and surgical: `validate_and_update` evaluates the
//! full diff set first, then writes exactly the differing fields in a single
//! connector update. Fields that compared equal are never touched.

use std::collections::BTreeMap;

use crate::{
  connector::{StoredItem, ZoteroConnector},
  extract::Extractor,
};

use super::*;

/// Per-field comparison between the stored and canonical record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDiff {
  /// Field name: title, abstract, date, authors, or doi.
  pub field:     String,
  /// The stored value, as the reference manager holds it.
  pub stored:    String,
  /// The freshly extracted canonical value.
  pub canonical: String,
  /// Whether the values differ after normalization.
  pub differs:   bool,
}

/// Compares stored records against fresh canonical extractions.
pub struct ValidationEngine {
  /// The record store being reconciled.
  connector: Arc<dyn ZoteroConnector>,
  /// Primary-repository extractor used for re-extraction.
  extractor: Arc<dyn Extractor>,
}

impl ValidationEngine {
  /// Builds the engine over a connector and the re-extraction source.
  pub fn new(connector: Arc<dyn ZoteroConnector>, extractor: Arc<dyn Extractor>) -> Self {
    Self { connector, extractor }
  }

  /// Computes the diff set for a stored item.
  ///
  /// # Errors
  ///
  /// - [`LibrisError::ZoteroUnreachable`] when the stored record cannot be
  ///   fetched
  /// - [`LibrisError::MissingIdentifier`] when the stored record carries no
  ///   identifier the primary repository can resolve
  /// - extraction errors from the re-extraction itself
  pub async fn validate(&self, item_key: &str) -> Result<Vec<FieldDiff>> {
    let (_, diffs) = self.diff_against_canonical(item_key).await?;
    Ok(diffs)
  }

  /// Computes the diff set and, when `apply` is set, writes the differing
  /// fields back in one connector call.
  ///
  /// Returns the diff set plus the names of the fields actually written.
  /// Nothing is written until the full diff set has been computed, and
  /// fields whose diff flag is false are never part of the update.
  pub async fn validate_and_update(
    &self,
    item_key: &str,
    apply: bool,
  ) -> Result<(Vec<FieldDiff>, Vec<String>)> {
    let (canonical, diffs) = self.diff_against_canonical(item_key).await?;
    if !apply {
      return Ok((diffs, Vec::new()));
    }

    let mut fields = BTreeMap::new();
    for diff in diffs.iter().filter(|diff| diff.differs) {
      match diff.field.as_str() {
        "title" => {
          fields.insert("title".to_string(), canonical.title.clone());
        },
        "abstract" => {
          fields.insert(
            "abstractNote".to_string(),
            canonical.abstract_text.clone().unwrap_or_default(),
          );
        },
        "date" => {
          fields.insert(
            "date".to_string(),
            canonical.publication_date.map(|d| d.to_string()).unwrap_or_default(),
          );
        },
        // author and DOI drift is surfaced but not auto-corrected: creator
        // rows and identifier fields need a human eye before overwriting
        _ => {},
      }
    }

    let applied: Vec<String> = fields.keys().cloned().collect();
    if !fields.is_empty() {
      debug!(item_key, fields = applied.len(), "applying validation corrections");
      self.connector.update_item(item_key, fields).await?;
    }
    Ok((diffs, applied))
  }

  /// Shared fetch + re-extract + compare path.
  async fn diff_against_canonical(
    &self,
    item_key: &str,
  ) -> Result<(CanonicalItem, Vec<FieldDiff>)> {
    let stored = self.connector.get_item(item_key).await?;

    let id = arxiv_id_from_url(&stored.url)
      .or_else(|| arxiv_id_from_doi(&stored.doi))
      .ok_or(LibrisError::MissingIdentifier("arxiv id"))?;
    let canonical = self.extractor.extract(&format!("https://arxiv.org/abs/{id}")).await?;

    let diffs = compare(&stored, &canonical);
    Ok((canonical, diffs))
  }
}

/// Computes the five tracked field diffs.
///
/// Each field is compared independently with its own normalization; one
/// field's result never influences another's.
fn compare(stored: &StoredItem, canonical: &CanonicalItem) -> Vec<FieldDiff> {
  let canonical_abstract = canonical.abstract_text.clone().unwrap_or_default();
  let canonical_date =
    canonical.publication_date.map(|d| d.to_string()).unwrap_or_default();
  let canonical_doi = canonical.doi.clone().unwrap_or_default();

  let stored_families: Vec<String> = stored
    .creators
    .iter()
    .filter(|creator| creator.creator_type == "author")
    .map(|creator| creator.last_name.trim().to_string())
    .filter(|name| !name.is_empty())
    .collect();
  let canonical_families: Vec<String> =
    canonical.authors.iter().map(|author| author.family.clone()).collect();

  vec![
    FieldDiff {
      field:     "title".into(),
      stored:    stored.title.clone(),
      canonical: canonical.title.clone(),
      differs:   !text_equal(&stored.title, &canonical.title),
    },
    FieldDiff {
      field:     "abstract".into(),
      stored:    stored.abstract_text.clone(),
      canonical: canonical_abstract.clone(),
      differs:   !text_equal(&stored.abstract_text, &canonical_abstract),
    },
    FieldDiff {
      field:     "date".into(),
      stored:    stored.date.clone(),
      canonical: canonical_date.clone(),
      differs:   date_differs(&stored.date, &canonical_date),
    },
    FieldDiff {
      field:     "authors".into(),
      stored:    stored_families.join(", "),
      canonical: canonical_families.join(", "),
      differs:   author_sets_differ(&stored_families, &canonical_families),
    },
    FieldDiff {
      field:     "doi".into(),
      stored:    stored.doi.clone(),
      canonical: canonical_doi.clone(),
      differs:   doi_differs(&stored.doi, &canonical_doi),
    },
  ]
}

/// Textual comparison: whitespace-collapsed, case-insensitive.
fn text_equal(a: &str, b: &str) -> bool {
  normalize_ws(a).to_lowercase() == normalize_ws(b).to_lowercase()
}

/// Date comparison: normalized calendar dates, and only when both sides
/// actually carry a date.
fn date_differs(stored: &str, canonical: &str) -> bool {
  match (parse_date(stored), parse_date(canonical)) {
    (Some(a), Some(b)) => a != b,
    _ => false,
  }
}

/// Author comparison: family-name sets, order-insensitive, and only when
/// both sides name someone.
fn author_sets_differ(stored: &[String], canonical: &[String]) -> bool {
  if stored.is_empty() || canonical.is_empty() {
    return false;
  }
  let a: BTreeSet<String> = stored.iter().map(|name| name.to_lowercase()).collect();
  let b: BTreeSet<String> = canonical.iter().map(|name| name.to_lowercase()).collect();
  a != b
}

/// DOI comparison: normalized form, and only when both sides carry one.
fn doi_differs(stored: &str, canonical: &str) -> bool {
  if stored.trim().is_empty() || canonical.trim().is_empty() {
    return false;
  }
  normalize_doi(stored) != normalize_doi(canonical)
}

#[cfg(test)]
mod tests {
  use crate::connector::StoredCreator;

  use super::*;

  fn stored_item() -> StoredItem {
    StoredItem {
      key: "ABC123".into(),
      item_type: "preprint".into(),
      title: "  Verifiable Fully Homomorphic Encryption ".into(),
      abstract_text: "An old abstract.".into(),
      date: "2023-01-17".into(),
      url: "https://arxiv.org/abs/2301.07041".into(),
      doi: "10.48550/arXiv.2301.07041".into(),
      creators: vec![
        StoredCreator {
          creator_type: "author".into(),
          first_name:   "Alexander".into(),
          last_name:    "Viand".into(),
        },
        StoredCreator {
          creator_type: "author".into(),
          first_name:   "Christian".into(),
          last_name:    "Knabenhans".into(),
        },
      ],
      tags: vec![],
    }
  }

  fn canonical_item() -> CanonicalItem {
    CanonicalItem {
      title:             "Verifiable Fully Homomorphic Encryption".into(),
      authors:           vec![
        Author { given: "Christian".into(), family: "Knabenhans".into() },
        Author { given: "Alexander".into(), family: "Viand".into() },
      ],
      abstract_text:     Some("A freshly revised abstract.".into()),
      publication_date:  NaiveDate::from_ymd_opt(2023, 1, 17),
      doi:               Some("10.48550/arxiv.2301.07041".into()),
      subjects:          BTreeSet::new(),
      source:            Repository::Arxiv,
      source_identifier: "2301.07041".into(),
      source_url:        "https://arxiv.org/abs/2301.07041".into(),
      pdf_url:           None,
      retrieved_at:      Utc::now(),
    }
  }

  fn diff_for<'a>(diffs: &'a [FieldDiff], field: &str) -> &'a FieldDiff {
    diffs.iter().find(|diff| diff.field == field).unwrap()
  }

  #[test]
  fn whitespace_and_case_do_not_count_as_drift() {
    let diffs = compare(&stored_item(), &canonical_item());
    assert!(!diff_for(&diffs, "title").differs);
    assert!(!diff_for(&diffs, "date").differs);
    assert!(!diff_for(&diffs, "doi").differs);
  }

  #[test]
  fn changed_abstract_is_drift() {
    let diffs = compare(&stored_item(), &canonical_item());
    let abstract_diff = diff_for(&diffs, "abstract");
    assert!(abstract_diff.differs);
    assert_eq!(abstract_diff.stored, "An old abstract.");
    assert_eq!(abstract_diff.canonical, "A freshly revised abstract.");
  }

  #[test]
  fn author_order_is_not_drift_but_membership_is() {
    // same families, different order
    let diffs = compare(&stored_item(), &canonical_item());
    assert!(!diff_for(&diffs, "authors").differs);

    let mut canonical = canonical_item();
    canonical.authors.push(Author { given: "Eve".into(), family: "Mallory".into() });
    let diffs = compare(&stored_item(), &canonical);
    assert!(diff_for(&diffs, "authors").differs);
  }

  #[test]
  fn each_field_is_diffed_independently() {
    let mut canonical = canonical_item();
    canonical.title = "A Different Title".into();
    let diffs = compare(&stored_item(), &canonical);
    assert!(diff_for(&diffs, "title").differs);
    // the changed title does not leak into the other fields' verdicts
    assert!(!diff_for(&diffs, "date").differs);
    assert!(!diff_for(&diffs, "doi").differs);
  }
}

//! Shared doubles for the integration tests.

#![allow(dead_code)]

use std::{
  collections::{BTreeMap, HashMap},
  sync::Mutex,
};

use async_trait::async_trait;
use libris::{
  connector::{Attachment, Collection, StoredCreator, StoredItem, ZoteroConnector},
  error::{LibrisError, Result},
  item::CanonicalItem,
};

/// In-memory connector double recording every write.
#[derive(Default)]
pub struct MockConnector {
  pub items:       Mutex<HashMap<String, StoredItem>>,
  pub updates:     Mutex<Vec<(String, BTreeMap<String, String>)>>,
  pub attachments: Mutex<Vec<(String, usize, String)>>,
  pub fail_attach: bool,
}

impl MockConnector {
  pub fn with_item(item: StoredItem) -> Self {
    let connector = Self::default();
    connector.items.lock().unwrap().insert(item.key.clone(), item);
    connector
  }

  pub fn failing_attach(item: StoredItem) -> Self {
    let mut connector = Self::with_item(item);
    connector.fail_attach = true;
    connector
  }
}

#[async_trait]
impl ZoteroConnector for MockConnector {
  async fn is_running(&self) -> bool { true }

  async fn get_collections(&self) -> Result<Vec<Collection>> { Ok(Vec::new()) }

  async fn get_library_items(&self, limit: usize) -> Result<Vec<StoredItem>> {
    Ok(self.items.lock().unwrap().values().take(limit).cloned().collect())
  }

  async fn get_item(&self, key: &str) -> Result<StoredItem> {
    self
      .items
      .lock()
      .unwrap()
      .get(key)
      .cloned()
      .ok_or_else(|| LibrisError::ZoteroUnreachable(format!("no item {key}")))
  }

  async fn update_item(&self, key: &str, fields: BTreeMap<String, String>) -> Result<()> {
    if let Some(item) = self.items.lock().unwrap().get_mut(key) {
      for (field, value) in &fields {
        match field.as_str() {
          "title" => item.title = value.clone(),
          "abstractNote" => item.abstract_text = value.clone(),
          "date" => item.date = value.clone(),
          _ => {},
        }
      }
    }
    self.updates.lock().unwrap().push((key.to_string(), fields));
    Ok(())
  }

  async fn update_item_tags(&self, key: &str, tags: &[String]) -> Result<()> {
    if let Some(item) = self.items.lock().unwrap().get_mut(key) {
      item.tags = tags.to_vec();
    }
    Ok(())
  }

  async fn delete_item(&self, key: &str) -> Result<()> {
    self.items.lock().unwrap().remove(key);
    Ok(())
  }

  async fn move_item(&self, _key: &str, _collection: &str) -> Result<()> { Ok(()) }

  async fn save_item(
    &self,
    item: &CanonicalItem,
    _attachment: Option<Attachment>,
  ) -> Result<String> {
    let key = "NEWITEM1".to_string();
    self.items.lock().unwrap().insert(key.clone(), StoredItem {
      key: key.clone(),
      item_type: "preprint".into(),
      title: item.title.clone(),
      abstract_text: item.abstract_text.clone().unwrap_or_default(),
      date: item.publication_date.map(|d| d.to_string()).unwrap_or_default(),
      url: item.source_url.clone(),
      doi: item.doi.clone().unwrap_or_default(),
      creators: item
        .authors
        .iter()
        .map(|author| StoredCreator {
          creator_type: "author".into(),
          first_name:   author.given.clone(),
          last_name:    author.family.clone(),
        })
        .collect(),
      tags: item.subjects.iter().cloned().collect(),
    });
    Ok(key)
  }

  async fn attach_pdf(&self, key: &str, bytes: Vec<u8>, filename: &str) -> Result<()> {
    if self.fail_attach {
      return Err(LibrisError::ZoteroUnreachable("connector went away mid-save".into()));
    }
    self.attachments.lock().unwrap().push((key.to_string(), bytes.len(), filename.to_string()));
    Ok(())
  }
}

/// A stored record pointing at an arXiv paper.
pub fn arxiv_stored_item(key: &str) -> StoredItem {
  StoredItem {
    key: key.to_string(),
    item_type: "preprint".into(),
    title: "Verifiable Fully Homomorphic Encryption".into(),
    abstract_text: "An old, stale abstract.".into(),
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

/// A minimal valid PDF payload above the test-size threshold.
pub fn pdf_bytes() -> Vec<u8> {
  let mut bytes = b"%PDF-1.5\n%test document\n".to_vec();
  bytes.resize(512, b' ');
  bytes.extend_from_slice(b"\n%%EOF\n");
  bytes
}

/// The Atom feed the arXiv double serves for 2301.07041.
pub const ARXIV_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <entry>
    <id>http://arxiv.org/abs/2301.07041v1</id>
    <published>2023-01-17T18:53:08Z</published>
    <title>Verifiable Fully Homomorphic Encryption</title>
    <summary>A freshly revised abstract about verifiable FHE.</summary>
    <author><name>Alexander Viand</name></author>
    <author><name>Christian Knabenhans</name></author>
    <arxiv:doi>10.48550/arXiv.2301.07041</arxiv:doi>
    <link title="pdf" href="http://arxiv.org/pdf/2301.07041v1" rel="related" type="application/pdf"/>
    <category term="cs.CR" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

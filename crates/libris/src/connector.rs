//! The reference-manager connector boundary.
//!
//! The reference manager (Zotero) runs as a desktop application exposing a
//! local HTTP API. This crate treats it purely as a remote record store
//! reachable only from the local host: the [`ZoteroConnector`] trait is the
//! whole contract, and [`HttpConnector`] is a thin client over the local
//! API. Everything that can go wrong on this boundary surfaces as
//! [`LibrisError::ZoteroUnreachable`] so callers can distinguish connector
//! trouble from source trouble.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::config::Settings;

use super::*;

/// A collection in the reference manager's library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
  /// Collection key.
  pub key:    String,
  /// Display name.
  pub name:   String,
  /// Parent collection key, when nested.
  pub parent: Option<String>,
}

/// A creator row on a stored item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCreator {
  /// Creator role, e.g. "author".
  pub creator_type: String,
  /// Given name(s).
  pub first_name:   String,
  /// Family name.
  pub last_name:    String,
}

/// The subset of a stored record the pipeline reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredItem {
  /// Item key.
  pub key:           String,
  /// Reference-manager item type.
  pub item_type:     String,
  /// Stored title.
  pub title:         String,
  /// Stored abstract.
  pub abstract_text: String,
  /// Stored date string, as the reference manager keeps it.
  pub date:          String,
  /// Stored URL.
  pub url:           String,
  /// Stored DOI, as entered.
  pub doi:           String,
  /// Creators in stored order.
  pub creators:      Vec<StoredCreator>,
  /// Tags on the item.
  pub tags:          Vec<String>,
}

/// An attachment payload for [`ZoteroConnector::save_item`].
#[derive(Debug, Clone)]
pub enum Attachment {
  /// Raw PDF bytes plus the filename to store them under.
  Bytes {
    /// The document bytes.
    bytes:    Vec<u8>,
    /// Attachment filename.
    filename: String,
  },
  /// A URL the reference manager should fetch itself.
  Url(String),
}

/// The local record store the pipeline saves into and reconciles against.
#[async_trait]
pub trait ZoteroConnector: Send + Sync {
  /// Whether the reference manager is up and answering.
  async fn is_running(&self) -> bool;

  /// Lists library collections.
  async fn get_collections(&self) -> Result<Vec<Collection>>;

  /// Lists up to `limit` top-level library items.
  async fn get_library_items(&self, limit: usize) -> Result<Vec<StoredItem>>;

  /// Fetches one item by key.
  async fn get_item(&self, key: &str) -> Result<StoredItem>;

  /// Updates the named fields on an item, in a single call.
  async fn update_item(&self, key: &str, fields: BTreeMap<String, String>) -> Result<()>;

  /// Replaces the tags on an item.
  async fn update_item_tags(&self, key: &str, tags: &[String]) -> Result<()>;

  /// Deletes an item.
  async fn delete_item(&self, key: &str) -> Result<()>;

  /// Moves an item into a collection.
  async fn move_item(&self, key: &str, collection: &str) -> Result<()>;

  /// Saves a new item, optionally with an attachment. Returns the new key.
  async fn save_item(&self, item: &CanonicalItem, attachment: Option<Attachment>)
    -> Result<String>;

  /// Attaches a PDF to an existing item.
  async fn attach_pdf(&self, key: &str, bytes: Vec<u8>, filename: &str) -> Result<()>;
}

/// `reqwest` client for the local connector API.
pub struct HttpConnector {
  /// Connector base, e.g. `http://127.0.0.1:23119`.
  base:   String,
  /// Shared HTTP client.
  client: reqwest::Client,
}

impl HttpConnector {
  /// Builds a connector client from settings.
  pub fn new(settings: &Settings) -> Self {
    Self {
      base:   settings.endpoints.zotero.trim_end_matches('/').to_string(),
      client: reqwest::Client::new(),
    }
  }

  /// Maps a transport error onto the connector failure variant.
  fn unreachable(err: reqwest::Error) -> LibrisError {
    LibrisError::ZoteroUnreachable(err.to_string())
  }

  /// GETs a JSON document from the local API.
  async fn get_json(&self, path: &str) -> Result<Value> {
    let response = self
      .client
      .get(format!("{}{path}", self.base))
      .send()
      .await
      .map_err(Self::unreachable)?
      .error_for_status()
      .map_err(Self::unreachable)?;
    response.json().await.map_err(Self::unreachable)
  }

  /// PATCHes a JSON body against an item.
  async fn patch_item(&self, key: &str, body: Value) -> Result<()> {
    self
      .client
      .patch(format!("{}/api/users/0/items/{key}", self.base))
      .json(&body)
      .send()
      .await
      .map_err(Self::unreachable)?
      .error_for_status()
      .map_err(Self::unreachable)?;
    Ok(())
  }

  /// Decodes one stored item from the local API's JSON shape.
  fn parse_item(value: &Value) -> StoredItem {
    let data = value.get("data").unwrap_or(value);
    let text = |field: &str| {
      data.get(field).and_then(Value::as_str).unwrap_or_default().to_string()
    };
    let creators = data
      .get("creators")
      .and_then(Value::as_array)
      .map(|rows| {
        rows
          .iter()
          .map(|row| StoredCreator {
            creator_type: row
              .get("creatorType")
              .and_then(Value::as_str)
              .unwrap_or("author")
              .to_string(),
            first_name:   row.get("firstName").and_then(Value::as_str).unwrap_or("").to_string(),
            last_name:    row.get("lastName").and_then(Value::as_str).unwrap_or("").to_string(),
          })
          .collect()
      })
      .unwrap_or_default();
    let tags = data
      .get("tags")
      .and_then(Value::as_array)
      .map(|rows| {
        rows
          .iter()
          .filter_map(|row| row.get("tag").and_then(Value::as_str))
          .map(str::to_string)
          .collect()
      })
      .unwrap_or_default();

    StoredItem {
      key: value
        .get("key")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| text("key")),
      item_type: text("itemType"),
      title: text("title"),
      abstract_text: text("abstractNote"),
      date: text("date"),
      url: text("url"),
      doi: text("DOI"),
      creators,
      tags,
    }
  }

  /// Encodes a canonical item into the connector's save payload.
  fn encode_item(item: &CanonicalItem, attachment: &Option<Attachment>) -> Value {
    let creators: Vec<Value> = item
      .authors
      .iter()
      .map(|author| {
        json!({
          "creatorType": "author",
          "firstName": author.given,
          "lastName": author.family,
        })
      })
      .collect();
    let mut payload = json!({
      "itemType": "preprint",
      "title": item.title,
      "abstractNote": item.abstract_text.clone().unwrap_or_default(),
      "date": item.publication_date.map(|d| d.to_string()).unwrap_or_default(),
      "url": item.source_url,
      "DOI": item.doi.clone().unwrap_or_default(),
      "creators": creators,
      "tags": item.subjects.iter().map(|s| json!({"tag": s})).collect::<Vec<_>>(),
    });
    if let Some(Attachment::Url(url)) = attachment {
      payload["attachments"] = json!([{"url": url, "mimeType": "application/pdf"}]);
    }
    payload
  }
}

#[async_trait]
impl ZoteroConnector for HttpConnector {
  async fn is_running(&self) -> bool {
    self
      .client
      .get(format!("{}/connector/ping", self.base))
      .send()
      .await
      .map(|r| r.status().is_success())
      .unwrap_or(false)
  }

  async fn get_collections(&self) -> Result<Vec<Collection>> {
    let value = self.get_json("/api/users/0/collections").await?;
    let rows = value.as_array().cloned().unwrap_or_default();
    Ok(
      rows
        .iter()
        .map(|row| {
          let data = row.get("data").unwrap_or(row);
          Collection {
            key:    row.get("key").and_then(Value::as_str).unwrap_or_default().to_string(),
            name:   data.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
            parent: data
              .get("parentCollection")
              .and_then(Value::as_str)
              .map(str::to_string),
          }
        })
        .collect(),
    )
  }

  async fn get_library_items(&self, limit: usize) -> Result<Vec<StoredItem>> {
    let value = self.get_json(&format!("/api/users/0/items?limit={limit}")).await?;
    let rows = value.as_array().cloned().unwrap_or_default();
    Ok(rows.iter().map(Self::parse_item).collect())
  }

  async fn get_item(&self, key: &str) -> Result<StoredItem> {
    let value = self.get_json(&format!("/api/users/0/items/{key}")).await?;
    Ok(Self::parse_item(&value))
  }

  async fn update_item(&self, key: &str, fields: BTreeMap<String, String>) -> Result<()> {
    debug!(key, fields = fields.len(), "updating stored item");
    let body: serde_json::Map<String, Value> =
      fields.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    self.patch_item(key, Value::Object(body)).await
  }

  async fn update_item_tags(&self, key: &str, tags: &[String]) -> Result<()> {
    let tags: Vec<Value> = tags.iter().map(|tag| json!({"tag": tag})).collect();
    self.patch_item(key, json!({"tags": tags})).await
  }

  async fn delete_item(&self, key: &str) -> Result<()> {
    self
      .client
      .delete(format!("{}/api/users/0/items/{key}", self.base))
      .send()
      .await
      .map_err(Self::unreachable)?
      .error_for_status()
      .map_err(Self::unreachable)?;
    Ok(())
  }

  async fn move_item(&self, key: &str, collection: &str) -> Result<()> {
    self.patch_item(key, json!({"collections": [collection]})).await
  }

  async fn save_item(
    &self,
    item: &CanonicalItem,
    attachment: Option<Attachment>,
  ) -> Result<String> {
    let payload = json!({"items": [Self::encode_item(item, &attachment)]});
    let response = self
      .client
      .post(format!("{}/connector/saveItems", self.base))
      .json(&payload)
      .send()
      .await
      .map_err(Self::unreachable)?
      .error_for_status()
      .map_err(Self::unreachable)?;
    let value: Value = response.json().await.map_err(Self::unreachable)?;
    let key = value
      .get("items")
      .and_then(Value::as_array)
      .and_then(|items| items.first())
      .and_then(|item| item.get("key"))
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_string();

    if let Some(Attachment::Bytes { bytes, filename }) = attachment {
      self.attach_pdf(&key, bytes, &filename).await?;
    }
    Ok(key)
  }

  async fn attach_pdf(&self, key: &str, bytes: Vec<u8>, filename: &str) -> Result<()> {
    self
      .client
      .post(format!("{}/connector/saveAttachment?parent={key}", self.base))
      .header(reqwest::header::CONTENT_TYPE, "application/pdf")
      .header("X-Attachment-Filename", filename.to_string())
      .body(bytes)
      .send()
      .await
      .map_err(Self::unreachable)?
      .error_for_status()
      .map_err(Self::unreachable)?;
    Ok(())
  }
}

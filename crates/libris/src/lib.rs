//! Paper metadata extraction and multi-source PDF acquisition.
//!
//! `libris` is the core of an assistant integration that saves academic papers
//! into a local reference manager and retrieves their PDFs from whichever of
//! several competing sources can supply one. It provides:
//!
//! - Normalized metadata extraction from repository URLs
//! - Ordered-fallback PDF acquisition with payload validation
//! - Reconciliation of stored records against the authoritative metadata API
//! - A keyed store of per-source authentication cookies
//!
//! # Features
//!
//! - **Multi-source extraction**: arXiv (official API), bioRxiv and Nature
//!   (rendered pages), plus a structural-HTML fallback for any other site
//! - **Fallback PDF fetching**: primary repository, open-access aggregators,
//!   secondary mirrors, and archive search, tried strictly in order with an
//!   at-most-one-success guarantee
//! - **Record validation**: field-level diffs between a stored record and a
//!   fresh canonical extraction, applied selectively on request
//! - **Explicit context**: settings, credentials, and the page renderer are
//!   constructed once and threaded into every operation, no ambient state
//!
//! # Getting Started
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use libris::{config::Settings, connector::HttpConnector, service::Service};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!   let settings = Settings::default();
//!   let connector = Arc::new(HttpConnector::new(&settings));
//!   let service = Service::new(settings, connector)?;
//!
//!   // Extract metadata from a repository URL
//!   let outcome = service.extract_metadata("https://arxiv.org/abs/2301.07041").await;
//!   println!("{outcome:?}");
//!
//!   // Acquire the PDF, saving it through the connector
//!   let fetched = service.fetch_pdf("76ZP9V4C", "auto", true).await;
//!   println!("{fetched:?}");
//!   Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`item`]: The canonical metadata record and its normalization rules
//! - [`extract`]: Extractor variants and the priority-ordered manager
//! - [`fetch`]: PDF source adapters and the ordered-fallback fetcher
//! - [`validate`]: Stored-record drift detection and correction
//! - [`credentials`]: Per-source authentication cookie store
//! - [`connector`]: The reference-manager connector boundary
//! - [`render`]: The page-rendering capability and its fallback
//! - [`service`]: Public operations as structured, never-throwing outcomes
//! - [`config`]: The explicit settings value threaded through everything

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  collections::BTreeSet,
  fmt::Display,
  str::FromStr,
  sync::Arc,
  time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

pub mod config;
pub mod connector;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod item;
pub mod render;
pub mod service;
pub mod validate;

use crate::{error::*, item::*};

/// Common traits and types for ergonomic imports.
///
/// # Usage
///
/// ```no_run
/// use libris::prelude::*;
/// ```
pub mod prelude {
  pub use crate::{
    error::{LibrisError, Result},
    extract::Extractor,
    fetch::SourceAdapter,
    item::CanonicalItem,
  };
}

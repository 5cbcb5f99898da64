//! On-disk storage for an issuefields site.
//!
//! A site directory holds:
//! - `.issuefields/config.yml`: Site settings (time tracking, linking, ...)
//! - `.issuefields/site.yml`: Catalog (projects, users, layouts, custom fields)
//! - `issues/<KEY>.yml`: One file per issue
//! - `activity/*.yml`: Comments, work logs and issue links
//! - `history/<KEY>.ndjson`: Append-only change history per issue

pub mod config;
pub mod error;
pub mod site;

pub use config::SiteConfig;
pub use error::{Result, StoreError};
pub use site::SiteStore;

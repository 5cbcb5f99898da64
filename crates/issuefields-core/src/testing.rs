//! Shared fixtures for unit tests, built on the demo site.

use std::sync::Arc;

use crate::issue::{Issue, Project, ProjectComponent, User};
use crate::memory::{InMemorySite, SiteActivity, SiteData};
use crate::services::FieldServices;
use crate::settings::SiteSettings;

pub use crate::demo::{HR, MKT};

/// A fresh demo site.
pub fn site() -> Arc<InMemorySite> {
    Arc::new(InMemorySite::new(SiteSettings::default(), SiteData::demo(), SiteActivity::demo()))
}

pub fn site_with(settings: SiteSettings) -> Arc<InMemorySite> {
    Arc::new(InMemorySite::new(settings, SiteData::demo(), SiteActivity::demo()))
}

/// Services over a fresh demo site; nothing is shared between calls.
pub fn services() -> FieldServices {
    site().services()
}

/// HR-1: a stored bug with a 2h original and 1h remaining estimate.
pub fn issue() -> Issue {
    stored("HR-1")
}

pub fn stored(key: &str) -> Issue {
    SiteActivity::demo()
        .issues
        .into_iter()
        .find(|i| i.key.as_deref() == Some(key))
        .unwrap_or_else(|| panic!("no demo issue {key}"))
}

pub fn user(name: &str) -> User {
    SiteData::demo()
        .users
        .into_iter()
        .find(|u| u.name == name)
        .unwrap_or_else(|| panic!("no demo user {name}"))
}

pub fn project(key: &str) -> Project {
    SiteData::demo()
        .projects
        .into_iter()
        .find(|p| p.key == key)
        .unwrap_or_else(|| panic!("no demo project {key}"))
}

pub fn hr() -> Project {
    project("HR")
}

pub fn marketing() -> Project {
    project("MKT")
}

pub fn backend() -> ProjectComponent {
    component("Backend")
}

pub fn component(name: &str) -> ProjectComponent {
    SiteData::demo()
        .components
        .into_iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no demo component {name}"))
}

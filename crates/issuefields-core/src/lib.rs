//! issuefields-core: The issue field layer of an issue tracker.
//!
//! This crate provides:
//! - `Field` and its capability traits: the contract every system and
//!   custom field implements (populate, validate, update, render, REST)
//! - The system fields (summary, assignee, components, time tracking, ...)
//! - Custom fields backed by pluggable `CustomFieldType` strategies
//! - `FieldManager`: the registry answering which fields exist, which are
//!   hidden or available, and which appear on a screen
//! - `IssueOperationRunner`: drives create and edit through validation,
//!   a single issue patch and the per-field side effects
//! - `InMemorySite`: in-memory implementations of every collaborator seam

pub mod custom;
pub mod demo;
pub mod duration;
pub mod error;
pub mod field;
pub mod fields;
pub mod history;
pub mod i18n;
pub mod issue;
pub mod layout;
pub mod lifecycle;
pub mod manager;
pub mod memory;
pub mod patch;
pub mod render;
pub mod rest;
pub mod services;
pub mod settings;
pub mod validation;
pub mod values;

#[cfg(test)]
mod testing;

pub use custom::{CustomField, CustomFieldDefinition, CustomFieldTypeRegistry, CustomFieldValue};
pub use duration::DurationFormatter;
pub use error::{FieldError, Result};
pub use field::{Field, FieldTraits, NavigableField, OrderableField, RestAwareField, SortOrder};
pub use history::{ChangeGroup, ChangeItemBean, IssueChangeHolder};
pub use i18n::{DefaultI18n, I18nHelper};
pub use issue::{Issue, IssueConstant, IssueType, Project, ProjectComponent, SecurityLevel, User, Version};
pub use layout::{BulkEditBean, BulkOperation, FieldLayout, FieldLayoutItem, IssueOperation, OperationContext};
pub use lifecycle::{BulkFieldStatus, IssueOperationRunner, MoveFieldStatus, OperationOutcome, ValidatedOperation};
pub use manager::FieldManager;
pub use memory::{InMemorySite, SiteActivity, SiteData};
pub use patch::{IssuePatch, IssueValue, ModifiedValue};
pub use rest::{FieldJsonRepresentation, FieldMeta, FieldOperation, StandardOperation};
pub use services::{Comment, FieldServices, IssueLink, IssueLinkType, Permission, Worklog};
pub use settings::SiteSettings;
pub use validation::{ErrorCollection, MessagedResult, Reason, Severity};
pub use values::{FieldValue, FieldValuesHolder, RequestParams};

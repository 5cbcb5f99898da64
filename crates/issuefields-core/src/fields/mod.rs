//! The system fields.
//!
//! Each module holds one field type (or a family sharing one
//! implementation, like [`text`], [`versions`] and [`navigable`]).
//! [`FieldManager`](crate::manager::FieldManager) builds and registers them.

pub mod assignee;
pub mod comment;
pub mod common;
pub mod components;
pub mod issue_links;
pub mod issue_type;
pub mod navigable;
pub mod project;
pub mod resolution;
pub mod security_level;
pub mod text;
pub mod time_tracking;
pub mod versions;
pub mod worklog;

pub use assignee::AssigneeSystemField;
pub use comment::CommentSystemField;
pub use components::{ComponentsQuery, ComponentsSystemField};
pub use issue_links::IssueLinksSystemField;
pub use issue_type::IssueTypeSystemField;
pub use navigable::{NavigableKind, NavigableSystemField};
pub use project::ProjectSystemField;
pub use resolution::ResolutionSystemField;
pub use security_level::SecurityLevelSystemField;
pub use text::{TextKind, TextSystemField};
pub use time_tracking::{TimeTrackingQuery, TimeTrackingSystemField};
pub use versions::{VersionKind, VersionsSystemField};
pub use worklog::WorklogSystemField;

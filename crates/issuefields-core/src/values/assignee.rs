//! Assignee selections.

use serde::{Deserialize, Serialize};

/// Parameter value asking for automatic assignment.
pub const AUTOMATIC_ASSIGNEE: &str = "-1";
/// Parameter value of the separator entry in the assignee picker.
pub const SEPARATOR_ASSIGNEE: &str = "-2";
/// Import-string spelling of automatic assignment.
pub const AUTOMATIC_ASSIGNEE_STRING: &str = "-automatic-";

/// What the user picked in the assignee field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum AssigneeSelection {
    #[default]
    Unassigned,
    Automatic,
    /// The picker's separator row; never a valid choice.
    Separator,
    User(String),
}

impl AssigneeSelection {
    /// Interpret a raw `assignee` parameter value.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::Unassigned,
            Some(AUTOMATIC_ASSIGNEE) => Self::Automatic,
            Some(SEPARATOR_ASSIGNEE) => Self::Separator,
            Some(name) => Self::User(name.to_string()),
        }
    }

    /// The parameter value reproducing this selection.
    #[must_use]
    pub fn to_param(&self) -> Option<String> {
        match self {
            Self::Unassigned => None,
            Self::Automatic => Some(AUTOMATIC_ASSIGNEE.to_string()),
            Self::Separator => Some(SEPARATOR_ASSIGNEE.to_string()),
            Self::User(name) => Some(name.clone()),
        }
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::User(name) => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markers() {
        assert_eq!(AssigneeSelection::parse(Some("-1")), AssigneeSelection::Automatic);
        assert_eq!(AssigneeSelection::parse(Some("-2")), AssigneeSelection::Separator);
        assert_eq!(AssigneeSelection::parse(Some("")), AssigneeSelection::Unassigned);
        assert_eq!(AssigneeSelection::parse(None), AssigneeSelection::Unassigned);
        assert_eq!(
            AssigneeSelection::parse(Some("fred")),
            AssigneeSelection::User("fred".into())
        );
    }

    #[test]
    fn test_automatic_distinct_from_username() {
        let automatic = AssigneeSelection::parse(Some(AUTOMATIC_ASSIGNEE));
        assert_eq!(automatic.username(), None);
        assert_ne!(automatic, AssigneeSelection::User(AUTOMATIC_ASSIGNEE.into()));
        assert_eq!(automatic.to_param().as_deref(), Some("-1"));
    }
}

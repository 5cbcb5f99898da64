//! Submitted comment values and visibility.

use serde::{Deserialize, Serialize};

/// Who may see a comment or worklog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Group(String),
    Role(i64),
}

impl Visibility {
    /// Parse a `commentLevel`-style value: `role:<id>`, `group:<name>`, or
    /// blank for public. Unknown shapes are treated as a group name.
    #[must_use]
    pub fn parse(level: Option<&str>) -> Self {
        let Some(level) = level.map(str::trim).filter(|l| !l.is_empty()) else {
            return Self::Public;
        };
        if let Some(role) = level.strip_prefix("role:") {
            return role.trim().parse().map_or(Self::Public, Self::Role);
        }
        let group = level.strip_prefix("group:").unwrap_or(level);
        Self::Group(group.trim().to_string())
    }

    /// Inverse of [`Visibility::parse`].
    #[must_use]
    pub fn to_level(&self) -> Option<String> {
        match self {
            Self::Public => None,
            Self::Group(name) => Some(format!("group:{name}")),
            Self::Role(id) => Some(format!("role:{id}")),
        }
    }

    #[must_use]
    pub fn group_level(&self) -> Option<&str> {
        match self {
            Self::Group(name) => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn role_level(&self) -> Option<i64> {
        match self {
            Self::Role(id) => Some(*id),
            _ => None,
        }
    }
}

/// What a comment submission asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentAction {
    /// A plain `comment` parameter; empty bodies are ignored.
    #[default]
    Implicit,
    /// Explicit create; empty bodies are rejected.
    Create,
    Edit,
    Remove,
}

/// A comment property attached at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentProperty {
    pub key: String,
    pub value: serde_json::Value,
}

/// Comment parameters as held during an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub action: CommentAction,
    /// Raw `comment:id` value; parsed during validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,
    /// Raw `commentProperty` JSON; parsed during validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_properties: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<CommentProperty>,
}

impl CommentParameters {
    #[must_use]
    pub fn body(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub const fn with_action(mut self, action: CommentAction) -> Self {
        self.action = action;
        self
    }

    #[must_use]
    pub fn with_comment_id(mut self, id: impl Into<String>) -> Self {
        self.comment_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.as_deref().is_some_and(|b| !b.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_parse() {
        assert_eq!(Visibility::parse(None), Visibility::Public);
        assert_eq!(Visibility::parse(Some("")), Visibility::Public);
        assert_eq!(Visibility::parse(Some("role:10002")), Visibility::Role(10002));
        assert_eq!(
            Visibility::parse(Some("group:jira-developers")),
            Visibility::Group("jira-developers".into())
        );
        assert_eq!(Visibility::parse(Some("admins")), Visibility::Group("admins".into()));
    }

    #[test]
    fn test_visibility_level_round_trip() {
        let role = Visibility::Role(7);
        assert_eq!(Visibility::parse(role.to_level().as_deref()), role);
        assert_eq!(role.role_level(), Some(7));
        assert_eq!(role.group_level(), None);
    }

    #[test]
    fn test_has_body() {
        assert!(!CommentParameters::default().has_body());
        assert!(!CommentParameters::body("  ").has_body());
        assert!(CommentParameters::body("Looks good").has_body());
    }
}

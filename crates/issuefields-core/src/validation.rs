//! Validation results: collected errors and needs-move verdicts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Why a validation failed, for callers mapping errors to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    ValidationFailed,
    Forbidden,
    NotFound,
    ServerError,
}

/// Errors gathered while validating submitted field values.
///
/// Field errors are keyed by field id or sub-field id; a later error for the
/// same key replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCollection {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    errors: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    messages: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    reasons: BTreeSet<Reason>,
}

impl ErrorCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error against a field or sub-field.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(field.into(), message.into());
    }

    pub fn add_error_with_reason(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        reason: Reason,
    ) {
        self.add_error(field, message);
        self.reasons.insert(reason);
    }

    /// Add a message that is not tied to a single field.
    pub fn add_error_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn add_reason(&mut self, reason: Reason) {
        self.reasons.insert(reason);
    }

    /// Merge another collection into this one.
    pub fn add_error_collection(&mut self, other: Self) {
        self.errors.extend(other.errors);
        self.messages.extend(other.messages);
        self.reasons.extend(other.reasons);
    }

    #[must_use]
    pub fn has_any_errors(&self) -> bool {
        !self.errors.is_empty() || !self.messages.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    #[must_use]
    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn error_messages(&self) -> &[String] {
        &self.messages
    }

    #[must_use]
    pub fn reasons(&self) -> &BTreeSet<Reason> {
        &self.reasons
    }

    /// Re-key every field error onto a single field id, keeping messages.
    ///
    /// Used when a collaborator reports errors against its own keys but the
    /// form only shows one input for the field.
    #[must_use]
    pub fn rekeyed_to(self, field: &str) -> Self {
        let mut out = Self {
            errors: BTreeMap::new(),
            messages: self.messages,
            reasons: self.reasons,
        };
        for message in self.errors.into_values() {
            out.errors.insert(field.to_string(), message);
        }
        out
    }
}

impl fmt::Display for ErrorCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for message in &self.messages {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{message}")?;
            first = false;
        }
        for (field, message) in &self.errors {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Severity of a [`MessagedResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

/// Verdict of a needs-move check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagedResult {
    /// Whether the user must supply a value before the move can proceed.
    pub needs_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub severity: Severity,
}

impl MessagedResult {
    /// The field carries over unchanged.
    #[must_use]
    pub fn no_input() -> Self {
        Self::default()
    }

    /// The user must supply a value.
    #[must_use]
    pub fn input_required() -> Self {
        Self {
            needs_input: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn new(needs_input: bool) -> Self {
        Self {
            needs_input,
            message: None,
            severity: Severity::Info,
        }
    }

    /// No input needed, but show the user a warning.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            needs_input: false,
            message: Some(message.into()),
            severity: Severity::Warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_errors_are_keyed_by_field() {
        let mut errors = ErrorCollection::new();
        assert!(!errors.has_any_errors());

        errors.add_error("assignee", "first");
        errors.add_error("assignee", "second");
        errors.add_error("components", "bad component");

        assert!(errors.has_any_errors());
        assert_eq!(errors.errors().len(), 2);
        assert_eq!(errors.error("assignee"), Some("second"));
    }

    #[test]
    fn test_merge_and_display() {
        let mut errors = ErrorCollection::new();
        errors.add_error_message("general");

        let mut other = ErrorCollection::new();
        other.add_error_with_reason("worklog_timeLogged", "required", Reason::ValidationFailed);
        errors.add_error_collection(other);

        assert_eq!(errors.to_string(), "general; worklog_timeLogged: required");
        assert!(errors.reasons().contains(&Reason::ValidationFailed));
    }

    #[test]
    fn test_rekeyed_to_single_field() {
        let mut errors = ErrorCollection::new();
        errors.add_error("linkKey", "Issue 'XX-1' does not exist");
        errors.add_error_message("kept");

        let rekeyed = errors.rekeyed_to("issuelinks");
        assert_eq!(rekeyed.error("issuelinks"), Some("Issue 'XX-1' does not exist"));
        assert_eq!(rekeyed.error_messages(), ["kept".to_string()]);
    }

    #[test]
    fn test_messaged_results() {
        assert!(!MessagedResult::no_input().needs_input);
        assert!(MessagedResult::input_required().needs_input);

        let warning = MessagedResult::warning("renderer.bulk.move.warning");
        assert!(!warning.needs_input);
        assert_eq!(warning.severity, Severity::Warning);
    }
}

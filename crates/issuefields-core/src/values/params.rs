//! Raw request parameters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Submitted form or REST-translated parameters: name -> string array.
///
/// Parameter names are a wire contract (`timetracking_originalestimate`,
/// `issuelinks-issues`, `commentLevel`, ...). An empty array counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParams(BTreeMap<String, Vec<String>>);

impl RequestParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `name=value` pairs; repeated names accumulate.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (k, v) in pairs {
            params.append(k, v);
        }
        params
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// Append a value to a parameter.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    /// Replace a parameter's values.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.0.insert(name.into(), values);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.0.remove(name)
    }

    /// Values for `name`, or `None` if missing or empty.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0
            .get(name)
            .map(Vec::as_slice)
            .filter(|values| !values.is_empty())
    }

    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|values| values.first()).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Parameter read as a boolean flag (`true`, case-insensitive).
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.first(name)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// Values as an owned vector, empty if missing.
    #[must_use]
    pub fn values(&self, name: &str) -> Vec<String> {
        self.get(name).map(<[String]>::to_vec).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Parameters whose names start with `prefix`.
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Vec<String>)> + 'a {
        self.0.iter().filter(move |(k, _)| k.starts_with(prefix))
    }
}

/// First non-blank value of a string array.
#[must_use]
pub fn first_non_blank(values: &[String]) -> Option<&str> {
    values
        .iter()
        .map(String::as_str)
        .find(|v| !v.trim().is_empty())
}

/// Whether an optional string is missing or whitespace only.
#[must_use]
pub fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_array_counts_as_absent() {
        let mut params = RequestParams::new();
        params.set("components", Vec::new());

        assert!(!params.contains("components"));
        assert_eq!(params.first("components"), None);
    }

    #[test]
    fn test_from_pairs_accumulates() {
        let params = RequestParams::from_pairs([("versions", "1"), ("versions", "2"), ("isCreateIssue", "TRUE")]);

        assert_eq!(params.values("versions"), vec!["1", "2"]);
        assert!(params.flag("isCreateIssue"));
        assert!(!params.flag("worklog_activate"));
    }

    #[test]
    fn test_prefix_and_blank_helpers() {
        let params = RequestParams::new()
            .with("worklog_timeLogged", "1h")
            .with("worklog_activate", "true")
            .with("comment", "hi");

        assert_eq!(params.with_prefix("worklog_").count(), 2);
        assert!(is_blank(None));
        assert!(is_blank(Some("  ")));
        assert!(!is_blank(Some("1h")));
        assert_eq!(first_non_blank(&[String::new(), "fred".into()]), Some("fred"));
    }
}

//! Id-list values for multi-select entity fields (components, versions).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Prefix marking a submitted value as the name of an entity to create.
pub const NEW_VALUE_PREFIX: &str = "nv_";

/// Parsed ids for a multi-select field, plus names to create inline and any
/// text that could not be resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongIdsValueHolder {
    pub ids: Vec<i64>,
    /// Names submitted with the `nv_` prefix, prefix stripped.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub values_to_add: BTreeSet<String>,
    /// Free text that was neither an id nor a new-value marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,
}

impl LongIdsValueHolder {
    #[must_use]
    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Parse raw submitted strings.
    ///
    /// Comma-separated values are split; numbers become ids, `nv_` values
    /// become names to create, anything else is kept as input text.
    #[must_use]
    pub fn from_raw(values: &[String]) -> Self {
        let mut holder = Self::default();
        let mut unresolved = Vec::new();
        for raw in values.iter().flat_map(|v| v.split(',')) {
            let value = raw.trim();
            if value.is_empty() {
                continue;
            }
            if let Some(name) = value.strip_prefix(NEW_VALUE_PREFIX) {
                holder.values_to_add.insert(name.trim().to_string());
            } else if let Ok(id) = value.parse::<i64>() {
                if !holder.ids.contains(&id) {
                    holder.ids.push(id);
                }
            } else {
                unresolved.push(value.to_string());
            }
        }
        if !unresolved.is_empty() {
            holder.input_text = Some(unresolved.join(", "));
        }
        holder
    }

    #[must_use]
    pub fn with_input_text(mut self, text: impl Into<String>) -> Self {
        self.input_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.values_to_add.is_empty() && self.input_text.is_none()
    }

    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Drop ids failing `is_valid`, returning the dropped ones.
    pub fn retain_valid(&mut self, is_valid: impl Fn(i64) -> bool) -> Vec<i64> {
        let (valid, invalid): (Vec<i64>, Vec<i64>) = self.ids.iter().partition(|id| is_valid(**id));
        self.ids = valid;
        invalid
    }

    /// Raw strings that reproduce this holder.
    #[must_use]
    pub fn to_raw(&self) -> Vec<String> {
        let mut raw: Vec<String> = self.ids.iter().map(ToString::to_string).collect();
        raw.extend(
            self.values_to_add
                .iter()
                .map(|name| format!("{NEW_VALUE_PREFIX}{name}")),
        );
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_from_raw_splits_kinds() {
        let holder = LongIdsValueHolder::from_raw(&raw(&["10000", "nv_Backend", "Frontend", "10001,10000"]));

        assert_eq!(holder.ids, vec![10000, 10001]);
        assert!(holder.values_to_add.contains("Backend"));
        assert_eq!(holder.input_text.as_deref(), Some("Frontend"));
        assert!(!holder.is_empty());
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let holder = LongIdsValueHolder::from_raw(&raw(&["", " , "]));
        assert!(holder.is_empty());
    }

    #[test]
    fn test_retain_valid() {
        let mut holder = LongIdsValueHolder::from_ids([1, 2, 3]);
        let dropped = holder.retain_valid(|id| id != 2);

        assert_eq!(holder.ids, vec![1, 3]);
        assert_eq!(dropped, vec![2]);
    }

    #[test]
    fn test_to_raw() {
        let holder = LongIdsValueHolder::from_raw(&raw(&["5", "nv_New"]));
        assert_eq!(holder.to_raw(), raw(&["5", "nv_New"]));
    }
}

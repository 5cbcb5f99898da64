//! JSON views of issues assembled from each field's REST representation.

use issuefields_core::{Field, FieldManager, Issue, User};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Fields that apply to `issue`: available on the site, not hidden by its
/// layout and, for custom fields, in scope.
fn visible_fields(manager: &FieldManager, issue: &Issue) -> Vec<Arc<dyn Field>> {
    let unavailable = manager.unavailable_fields();
    let layout = manager.field_layout(issue);
    manager
        .all_fields()
        .into_iter()
        .filter(|f| !unavailable.contains(f.id()) && !layout.is_field_hidden(f.id()))
        .filter(|f| {
            manager
                .custom_field(f.id())
                .is_none_or(|c| c.is_in_scope(issue.project.id, &issue.issue_type.id))
        })
        .collect()
}

/// The issue as `{"id", "key", "fields": {...}}`, plus `renderedFields`
/// when `render` is set.
#[must_use]
pub fn issue_json(manager: &FieldManager, issue: &Issue, render: bool) -> Value {
    let layout = manager.field_layout(issue);
    let mut fields = Map::new();
    let mut rendered = Map::new();

    for field in visible_fields(manager, issue) {
        let Some(rest) = field.as_rest_aware() else {
            continue;
        };
        let item = layout.item(field.id());
        let Some(json) = rest.json_from_issue(issue, render, Some(&item)) else {
            continue;
        };
        if let Some(value) = json.rendered {
            rendered.insert(field.id().to_string(), value);
        }
        fields.insert(field.id().to_string(), json.standard);
    }

    let mut out = json!({
        "id": issue.id.map(|id| id.to_string()),
        "key": issue.key,
        "fields": fields,
    });
    if render {
        out["renderedFields"] = Value::Object(rendered);
    }
    out
}

/// What a caller may edit on `issue`: schema, requiredness, operations and
/// allowed values per screen field.
#[must_use]
pub fn edit_meta(manager: &FieldManager, issue: &Issue, caller: Option<&User>) -> Value {
    let i18n = manager.services().i18n.clone();
    let layout = manager.field_layout(issue);
    let mut fields = Map::new();

    for field in manager.screen_fields(issue, caller) {
        let Some(rest) = field.as_rest_aware() else {
            continue;
        };
        let operations: Vec<&str> = rest.supported_operations().iter().map(|op| op.as_str()).collect();
        let mut meta = json!({
            "required": layout.item(field.id()).required,
            "name": field.name(i18n.as_ref()),
            "schema": rest.json_schema(),
            "operations": operations,
        });
        if let Ok(Value::Object(info)) = serde_json::to_value(rest.field_type_info(&issue.project, Some(issue))) {
            if let Some(object) = meta.as_object_mut() {
                object.extend(info);
            }
        }
        fields.insert(field.id().to_string(), meta);
    }

    json!({ "fields": fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use issuefields_core::services::IssueManager;
    use issuefields_core::{InMemorySite, SiteActivity, SiteData, SiteSettings};
    use pretty_assertions::assert_eq;

    fn setup() -> (Arc<InMemorySite>, FieldManager) {
        let site = Arc::new(InMemorySite::new(SiteSettings::default(), SiteData::demo(), SiteActivity::demo()));
        let manager = FieldManager::new(site.services());
        (site, manager)
    }

    #[test]
    fn test_issue_json_follows_layout_and_scope() {
        let (site, manager) = setup();
        let bug = site.issue_by_key("HR-1").unwrap();

        let json = issue_json(&manager, &bug, false);
        assert_eq!(json["key"], "HR-1");
        assert_eq!(json["id"], "1");
        assert_eq!(json["fields"]["summary"], "Payroll export drops the last row");
        assert_eq!(json["fields"]["assignee"]["name"], "fred");
        assert_eq!(json["fields"]["issuetype"]["name"], "Bug");
        assert!(json["fields"].get("environment").is_none());
        assert!(json["fields"].get("customfield_10000").is_some());
        assert!(json.get("renderedFields").is_none());

        let campaign = site.issue_by_key("MKT-1").unwrap();
        let json = issue_json(&manager, &campaign, false);
        assert!(json["fields"].get("environment").is_some());
        assert!(json["fields"].get("customfield_10000").is_none());
    }

    #[test]
    fn test_rendered_fields() {
        let (site, manager) = setup();
        let bug = site.issue_by_key("HR-1").unwrap();

        let json = issue_json(&manager, &bug, true);
        assert!(json["renderedFields"]["description"].is_string());
    }

    #[test]
    fn test_edit_meta_marks_required_fields() {
        let (site, manager) = setup();
        let bug = site.issue_by_key("HR-1").unwrap();
        let fred = User::new("fred", "Fred Normal");

        let meta = edit_meta(&manager, &bug, Some(&fred));
        assert_eq!(meta["fields"]["components"]["required"], true);
        assert_eq!(meta["fields"]["summary"]["operations"], json!(["set"]));
        assert!(meta["fields"]["components"]["allowedValues"].is_array());
        assert!(meta["fields"].get("environment").is_none());
    }
}

//! Helpers shared by the system fields.

use crate::i18n::I18nHelper;
use crate::issue::Issue;
use crate::layout::{BulkEditBean, BulkOperation};
use crate::render::{TemplateParams, TemplateRenderer};
use crate::error::Result;
use crate::history::ChangeItemBean;
use crate::services::{Permission, PermissionManager};
use crate::validation::ErrorCollection;

pub const BULK_UNAVAILABLE: &str = "bulk.edit.unavailable";
pub const BULK_UNAVAILABLE_HIDDEN: &str = "bulk.edit.unavailable.hidden";
pub const BULK_UNAVAILABLE_PERMISSION: &str = "bulk.edit.unavailable.permission";
pub const BULK_UNAVAILABLE_MULTIPLE_PROJECTS: &str = "bulk.edit.unavailable.multipleprojects";

/// Whether the bulk operation may touch `issue`.
pub fn has_bulk_update_permission(permissions: &dyn PermissionManager, bean: &BulkEditBean, issue: &Issue) -> bool {
    let caller = bean.caller.as_ref();
    match bean.operation {
        BulkOperation::Edit => permissions.has_permission(Permission::EditIssue, &issue.project, caller),
        BulkOperation::Move => permissions.has_permission(Permission::MoveIssue, &issue.project, caller),
        BulkOperation::Transition => true,
    }
}

/// The checks most fields end their bulk-edit availability with: hidden in
/// any selected issue's layout, then missing permission on any of them.
pub fn hidden_or_permission(
    field_id: &str,
    permissions: &dyn PermissionManager,
    bean: &BulkEditBean,
    permission: Option<Permission>,
) -> Option<&'static str> {
    if bean.is_hidden_in_any_layout(field_id) {
        return Some(BULK_UNAVAILABLE_HIDDEN);
    }
    let caller = bean.caller.as_ref();
    for issue in &bean.selected_issues {
        if !has_bulk_update_permission(permissions, bean, issue) {
            return Some(BULK_UNAVAILABLE_PERMISSION);
        }
        if let Some(permission) = permission {
            if !permissions.has_permission(permission, &issue.project, caller) {
                return Some(BULK_UNAVAILABLE_PERMISSION);
            }
        }
    }
    None
}

/// Add the standard "X is required." error for a field.
pub fn add_required_error(errors: &mut ErrorCollection, field_id: &str, name_key: &str, i18n: &dyn I18nHelper) {
    let name = i18n.text(name_key, &[]);
    errors.add_error(field_id, i18n.text("issue.field.required", &[&name]));
}

/// Render a template, logging the template name at debug level.
///
/// # Errors
/// Propagates renderer failures.
pub fn render(renderer: &dyn TemplateRenderer, template: &str, params: &TemplateParams) -> Result<String> {
    tracing::debug!(template, "Rendering field template");
    renderer.render(template, params)
}

/// Change items for a multi-valued entity field: one removal item per
/// entity dropped and one addition item per entity added.
pub fn entity_change_items(
    history_name: &str,
    old: &[(i64, String)],
    new: &[(i64, String)],
) -> Vec<ChangeItemBean> {
    let mut items = Vec::new();
    for (id, name) in old {
        if !new.iter().any(|(n, _)| n == id) {
            items.push(
                ChangeItemBean::jira(history_name).from_value(Some(id.to_string()), Some(name.clone())),
            );
        }
    }
    for (id, name) in new {
        if !old.iter().any(|(o, _)| o == id) {
            items.push(ChangeItemBean::jira(history_name).to_value(Some(id.to_string()), Some(name.clone())));
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entity_change_items() {
        let old = vec![(1, "Backend".to_string()), (2, "UI".to_string())];
        let new = vec![(2, "UI".to_string()), (3, "Docs".to_string())];

        let items = entity_change_items("Component", &old, &new);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].from.as_deref(), Some("1"));
        assert_eq!(items[0].to, None);
        assert_eq!(items[1].to_string.as_deref(), Some("Docs"));
        assert!(items.iter().all(|i| i.field == "Component"));
    }

    #[test]
    fn test_no_items_when_unchanged() {
        let same = vec![(1, "Backend".to_string())];
        assert!(entity_change_items("Component", &same, &same).is_empty());
    }
}

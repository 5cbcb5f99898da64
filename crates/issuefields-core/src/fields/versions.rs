//! Affects Version/s and Fix Version/s.
//!
//! Both fields share one implementation parameterized by [`VersionKind`].
//! The version picker submits real version ids plus three pseudo ids: "no
//! version" and the released/unreleased group headings.

use serde_json::{Value, json};
use tracing::debug;

use crate::error::{FieldError, Result};
use crate::field::ids::{AFFECTED_VERSIONS, FIX_VERSIONS};
use crate::field::{Field, FieldTraits, NavigableField, OrderableField, RestAwareField, SortOrder, check_supported};
use crate::fields::common::{
    BULK_UNAVAILABLE_MULTIPLE_PROJECTS, add_required_error, entity_change_items, hidden_or_permission, render,
};
use crate::history::IssueChangeHolder;
use crate::i18n::I18nHelper;
use crate::issue::{Issue, Project, User, Version};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, FieldTypeInfo, IdOrName, JsonType, StandardOperation, id_or_name};
use crate::services::{FieldServices, Permission};
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::{FieldValue, FieldValuesHolder, LongIdsValueHolder, RequestParams};

pub const UNKNOWN_VERSION_ID: i64 = -1;
pub const UNRELEASED_VERSION_ID: i64 = -2;
pub const RELEASED_VERSION_ID: i64 = -3;

pub const BULK_UNAVAILABLE_NO_VERSIONS: &str = "bulk.edit.unavailable.noversions";

/// Which of the two version fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionKind {
    Affected,
    Fix,
}

impl VersionKind {
    #[must_use]
    pub const fn field_id(self) -> &'static str {
        match self {
            Self::Affected => AFFECTED_VERSIONS,
            Self::Fix => FIX_VERSIONS,
        }
    }

    const fn name_key(self) -> &'static str {
        match self {
            Self::Affected => "issue.field.affectsversions",
            Self::Fix => "issue.field.fixversions",
        }
    }

    /// Field name written to change history.
    #[must_use]
    pub const fn history_name(self) -> &'static str {
        match self {
            Self::Affected => "Version",
            Self::Fix => "Fix Version",
        }
    }

    fn versions(self, issue: &Issue) -> &[Version] {
        match self {
            Self::Affected => &issue.affected_versions,
            Self::Fix => &issue.fix_versions,
        }
    }

    fn set(self, patch: &mut IssuePatch, versions: Vec<Version>) {
        match self {
            Self::Affected => patch.set_affected_versions(versions),
            Self::Fix => patch.set_fix_versions(versions),
        }
    }
}

#[derive(Debug)]
pub struct VersionsSystemField {
    kind: VersionKind,
    services: FieldServices,
}

impl VersionsSystemField {
    #[must_use]
    pub const fn new(kind: VersionKind, services: FieldServices) -> Self {
        Self { kind, services }
    }

    #[must_use]
    pub const fn affected(services: FieldServices) -> Self {
        Self::new(VersionKind::Affected, services)
    }

    #[must_use]
    pub const fn fix(services: FieldServices) -> Self {
        Self::new(VersionKind::Fix, services)
    }

    #[must_use]
    pub const fn kind(&self) -> VersionKind {
        self.kind
    }

    fn selected_ids(holder: &LongIdsValueHolder) -> impl Iterator<Item = i64> + '_ {
        holder
            .ids
            .iter()
            .copied()
            .filter(|id| ![UNKNOWN_VERSION_ID, UNRELEASED_VERSION_ID, RELEASED_VERSION_ID].contains(id))
    }

    fn resolve(&self, ids: impl Iterator<Item = i64>) -> Vec<Version> {
        ids.filter_map(|id| self.services.versions.version(id)).collect()
    }

    fn pairs(versions: &[Version]) -> Vec<(i64, String)> {
        versions.iter().map(|v| (v.id, v.name.clone())).collect()
    }

    fn version_json(version: &Version) -> Value {
        json!({
            "id": version.id.to_string(),
            "name": version.name,
            "released": version.released,
            "archived": version.archived,
        })
    }

    /// Versions offered in the picker. Archived versions are never offered;
    /// fix versions list unreleased versions first, affected versions list
    /// released ones first.
    #[must_use]
    pub fn possible_versions(&self, project: &Project) -> Vec<Version> {
        let (released, unreleased): (Vec<Version>, Vec<Version>) = self
            .services
            .versions
            .versions_for_project(project.id)
            .into_iter()
            .filter(|v| !v.archived)
            .partition(|v| v.released);
        match self.kind {
            VersionKind::Fix => unreleased.into_iter().chain(released).collect(),
            VersionKind::Affected => released.into_iter().chain(unreleased).collect(),
        }
    }

    fn ids_entry(&self, holder: &FieldValuesHolder) -> Option<LongIdsValueHolder> {
        holder.ids(self.kind.field_id()).cloned()
    }
}

impl Field for VersionsSystemField {
    fn id(&self) -> &str {
        self.kind.field_id()
    }

    fn name_key(&self) -> &str {
        self.kind.name_key()
    }

    fn traits(&self) -> FieldTraits {
        FieldTraits::hideable_requirable()
    }

    fn as_orderable(&self) -> Option<&dyn OrderableField> {
        Some(self)
    }

    fn as_navigable(&self) -> Option<&dyn NavigableField> {
        Some(self)
    }

    fn as_rest_aware(&self) -> Option<&dyn RestAwareField> {
        Some(self)
    }
}

impl NavigableField for VersionsSystemField {
    fn default_sort_order(&self) -> Option<SortOrder> {
        Some(SortOrder::Asc)
    }

    fn column_value(&self, issue: &Issue) -> Option<String> {
        let versions = self.kind.versions(issue);
        (!versions.is_empty()).then(|| versions.iter().map(|v| v.name.as_str()).collect::<Vec<_>>().join(", "))
    }
}

impl OrderableField for VersionsSystemField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        FieldValue::Ids(LongIdsValueHolder::from_raw(&params.values(self.id())))
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        let ids = self.kind.versions(issue).iter().map(|v| v.id);
        holder.insert(self.id(), FieldValue::Ids(LongIdsValueHolder::from_ids(ids)));
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, _issue: &Issue) {
        holder.insert(self.id(), FieldValue::Ids(LongIdsValueHolder::default()));
    }

    /// Versions are per project; carry them across by name.
    fn populate_for_move(&self, holder: &mut FieldValuesHolder, original: &Issue, target: &Issue) {
        let ids = self
            .kind
            .versions(original)
            .iter()
            .filter_map(|v| self.services.versions.version_by_name(target.project.id, &v.name))
            .map(|v| v.id);
        holder.insert(self.id(), FieldValue::Ids(LongIdsValueHolder::from_ids(ids)));
    }

    fn populate_from_string(&self, holder: &mut FieldValuesHolder, value: &str, issue: &Issue) -> Result<()> {
        let mut ids = Vec::new();
        for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let version = self
                .services
                .versions
                .version_by_name(issue.project.id, name)
                .ok_or_else(|| {
                    FieldError::FieldValidation(
                        self.services
                            .i18n
                            .text("issue.field.versions.invalid.version.id", &[name]),
                    )
                })?;
            ids.push(version.id);
        }
        holder.insert(self.id(), FieldValue::Ids(LongIdsValueHolder::from_ids(ids)));
        Ok(())
    }

    fn validate_params(
        &self,
        ctx: &mut OperationContext,
        errors: &mut ErrorCollection,
        i18n: &dyn I18nHelper,
        issue: &Issue,
        item: &FieldLayoutItem,
    ) {
        let id = self.id();
        let value = self.ids_entry(&ctx.holder).unwrap_or_default();
        if value.contains(UNKNOWN_VERSION_ID) && Self::selected_ids(&value).next().is_some() {
            errors.add_error(id, i18n.text("issue.field.versions.noneselectedwithother", &[]));
            return;
        }

        for version_id in Self::selected_ids(&value) {
            match self.services.versions.version(version_id) {
                Some(version) if version.project_id == issue.project.id => {}
                Some(version) => errors.add_error(
                    id,
                    i18n.text("issue.field.versions.not.valid.for.project", &[&version.name]),
                ),
                None => errors.add_error(
                    id,
                    i18n.text("issue.field.versions.invalid.version.id", &[&version_id.to_string()]),
                ),
            }
        }

        if !value.values_to_add.is_empty() {
            if !self.services.permissions.has_permission(
                Permission::AdministerProjects,
                &issue.project,
                ctx.caller.as_ref(),
            ) {
                errors.add_error(id, i18n.text("issue.field.versions.noadmin", &[]));
            }
            for name in &value.values_to_add {
                if self.services.versions.version_by_name(issue.project.id, name).is_some() {
                    errors.add_error(id, i18n.text("issue.field.versions.namenotunique", &[name]));
                }
            }
        }

        if let Some(text) = &value.input_text {
            errors.add_error(id, i18n.text("issue.field.versions.invalid.version.id", &[text]));
        }

        let nothing_selected = Self::selected_ids(&value).next().is_none() && value.values_to_add.is_empty();
        if item.required && nothing_selected {
            add_required_error(errors, id, self.name_key(), i18n);
        }
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        let Some(value) = holder.ids(self.id()) else {
            return Ok(IssueValue::Versions(Vec::new()));
        };
        Self::selected_ids(value)
            .map(|id| {
                self.services
                    .versions
                    .version(id)
                    .ok_or_else(|| FieldError::FieldValidation(format!("version {id} does not exist")))
            })
            .collect::<Result<Vec<_>>>()
            .map(IssueValue::Versions)
    }

    fn current_value(&self, issue: &Issue) -> IssueValue {
        IssueValue::Versions(self.kind.versions(issue).to_vec())
    }

    fn default_value(&self, _issue: &Issue) -> IssueValue {
        IssueValue::Versions(Vec::new())
    }

    /// Archived versions cannot be picked, so the ones already on the issue
    /// survive the edit.
    fn update_issue(
        &self,
        _item: Option<&FieldLayoutItem>,
        patch: &mut IssuePatch,
        holder: &mut FieldValuesHolder,
    ) -> Result<()> {
        let Some(value) = self.ids_entry(holder) else {
            return Ok(());
        };
        let mut versions = self.resolve(Self::selected_ids(&value));
        let archived: Vec<Version> = self
            .kind
            .versions(patch.issue())
            .iter()
            .filter(|v| v.archived && !versions.iter().any(|s| s.id == v.id))
            .cloned()
            .collect();
        versions.extend(archived);

        let project_id = patch.issue().project.id;
        for name in &value.values_to_add {
            let created = self.services.versions.create(project_id, name)?;
            debug!(project_id, version = %created.name, field = self.id(), "Created version inline");
            versions.push(created);
        }
        self.kind.set(patch, versions);
        Ok(())
    }

    fn update_value(
        &self,
        _caller: Option<&User>,
        _item: Option<&FieldLayoutItem>,
        _issue: &Issue,
        modified: &ModifiedValue,
        changes: &mut IssueChangeHolder,
    ) -> Result<()> {
        let old = Self::pairs(modified.old.as_versions());
        let new = Self::pairs(modified.new.as_versions());
        for item in entity_change_items(self.kind.history_name(), &old, &new) {
            changes.add_change_item(item);
        }
        Ok(())
    }

    fn has_value(&self, issue: &Issue) -> bool {
        !self.kind.versions(issue).is_empty()
    }

    fn can_remove_value_from_issue_object(&self, _issue: &Issue) -> bool {
        true
    }

    fn remove_value_from_issue_object(&self, patch: &mut IssuePatch) -> Result<()> {
        self.kind.set(patch, Vec::new());
        Ok(())
    }

    fn needs_move(&self, originals: &[Issue], target: &Issue, target_item: &FieldLayoutItem) -> MessagedResult {
        let needs_input = originals.iter().any(|original| {
            let versions = self.kind.versions(original);
            let project_changed = original.project.id != target.project.id;
            (project_changed && !versions.is_empty()) || (target_item.required && versions.is_empty())
        });
        MessagedResult::new(needs_input)
    }

    fn available_for_bulk_edit(&self, bean: &BulkEditBean) -> Option<&'static str> {
        if bean.is_multiple_projects() {
            return Some(BULK_UNAVAILABLE_MULTIPLE_PROJECTS);
        }
        if let Some(project) = bean.single_project() {
            if self.possible_versions(project).is_empty() {
                return Some(BULK_UNAVAILABLE_NO_VERSIONS);
            }
        }
        let permission = (self.kind == VersionKind::Fix).then_some(Permission::ResolveIssue);
        hidden_or_permission(self.id(), self.services.permissions.as_ref(), bean, permission)
    }

    /// Fix versions are only offered to users who may resolve the issue.
    fn is_shown(&self, issue: &Issue, caller: Option<&User>) -> bool {
        match self.kind {
            VersionKind::Affected => true,
            VersionKind::Fix => {
                self.services
                    .permissions
                    .has_permission(Permission::ResolveIssue, &issue.project, caller)
            }
        }
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        let i18n = self.services.i18n.as_ref();
        let mut params = TemplateParams::for_field(self.id(), &self.name(i18n), request);
        let issue = request.issue;
        match view {
            FieldView::View | FieldView::Column => {
                params.insert_serialized("versions", &self.kind.versions(issue));
            }
            FieldView::Create | FieldView::Edit | FieldView::BulkEdit => {
                let current: Vec<i64> = request
                    .holder
                    .and_then(|h| h.ids(self.id()))
                    .map_or_else(|| self.kind.versions(issue).iter().map(|v| v.id).collect(), |h| h.ids.clone());
                let (released, unreleased): (Vec<Version>, Vec<Version>) =
                    self.possible_versions(&issue.project).into_iter().partition(|v| v.released);
                params.insert_serialized("releasedVersions", &released);
                params.insert_serialized("unreleasedVersions", &unreleased);
                params.insert_serialized("currentVersions", &current);
                params.insert("unknownVersionId", UNKNOWN_VERSION_ID);
                params.insert("unreleasedVersionId", UNRELEASED_VERSION_ID);
                params.insert("releasedVersionId", RELEASED_VERSION_ID);
                params.insert(
                    "canCreateVersions",
                    self.services.permissions.has_permission(
                        Permission::AdministerProjects,
                        &issue.project,
                        request.caller,
                    ),
                );
            }
        }
        render(self.services.renderer.as_ref(), &format!("versions-{}.vm", view.suffix()), &params)
    }
}

impl RestAwareField for VersionsSystemField {
    fn json_schema(&self) -> JsonType {
        JsonType::system_array("version", self.id())
    }

    fn field_type_info(&self, project: &Project, _issue: Option<&Issue>) -> FieldTypeInfo {
        let allowed = self.possible_versions(project).iter().map(Self::version_json).collect();
        FieldTypeInfo {
            allowed_values: Some(allowed),
            auto_complete_url: None,
        }
    }

    fn json_from_issue(
        &self,
        issue: &Issue,
        _render: bool,
        _item: Option<&FieldLayoutItem>,
    ) -> Option<FieldJsonRepresentation> {
        let versions = self.kind.versions(issue).iter().map(Self::version_json).collect();
        Some(FieldJsonRepresentation::new(Value::Array(versions)))
    }

    fn json_default_value(&self, _issue: &Issue) -> Option<Value> {
        Some(Value::Array(Vec::new()))
    }

    fn supported_operations(&self) -> &'static [StandardOperation] {
        &[StandardOperation::Set, StandardOperation::Add, StandardOperation::Remove]
    }

    fn apply_operations(
        &self,
        issue: &Issue,
        operations: &[FieldOperation],
        params: &mut RequestParams,
        errors: &mut ErrorCollection,
    ) {
        let field_id = self.id();
        let mut ids: Vec<i64> = self.kind.versions(issue).iter().map(|v| v.id).collect();
        let lookup = |value: &Value, errors: &mut ErrorCollection| -> Option<i64> {
            let found = match id_or_name(value)? {
                IdOrName::Id(id) => id.parse().ok().and_then(|id| self.services.versions.version(id)),
                IdOrName::Name(name) => self.services.versions.version_by_name(issue.project.id, &name),
            };
            if found.is_none() {
                errors.add_error(
                    field_id,
                    self.services
                        .i18n
                        .text("issue.field.versions.invalid.version.id", &[&value.to_string()]),
                );
            }
            found.map(|v| v.id)
        };
        for op in check_supported(self, operations, errors) {
            match op.operation {
                StandardOperation::Set => {
                    let values = op.value.as_array().cloned().unwrap_or_default();
                    ids = values.iter().filter_map(|v| lookup(v, errors)).collect();
                }
                StandardOperation::Add => {
                    if let Some(id) = lookup(&op.value, errors).filter(|id| !ids.contains(id)) {
                        ids.push(id);
                    }
                }
                StandardOperation::Remove => {
                    if let Some(id) = lookup(&op.value, errors) {
                        ids.retain(|existing| *existing != id);
                    }
                }
                StandardOperation::Edit => {}
            }
        }
        params.set(field_id, ids.iter().map(ToString::to_string).collect());
    }
}

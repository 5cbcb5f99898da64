//! Linking other issues while creating or editing one.
//!
//! Like comments and work logs the field has no stored value of its own:
//! accepted links ride on the patch as an external value and are added
//! once the issue update commits.

use serde_json::{Value, json};
use tracing::{debug, error};

use crate::error::Result;
use crate::field::ids::{IS_CREATE_ISSUE, ISSUE_LINKS};
use crate::field::{Field, FieldTraits, NavigableField, OrderableField, RestAwareField, check_supported};
use crate::fields::common::{BULK_UNAVAILABLE, render};
use crate::history::IssueChangeHolder;
use crate::i18n::I18nHelper;
use crate::issue::{Issue, User};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, JsonType, StandardOperation};
use crate::services::{FieldServices, IssueLink, IssueLinkType, Permission};
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::issue_linking::split_issue_keys;
use crate::values::{FieldValue, FieldValuesHolder, IssueLinkingValue, RequestParams};

pub const LINK_TYPE: &str = "issuelinks-linktype";
pub const ISSUE_KEYS: &str = "issuelinks-issues";

#[derive(Debug)]
pub struct IssueLinksSystemField {
    services: FieldServices,
}

impl IssueLinksSystemField {
    #[must_use]
    pub const fn new(services: FieldServices) -> Self {
        Self { services }
    }

    fn linking_enabled(&self) -> bool {
        self.services.settings.issue_linking
    }

    fn empty_value(&self) -> FieldValue {
        FieldValue::IssueLinking(IssueLinkingValue::default().with_linking_enabled(self.linking_enabled()))
    }

    /// Link types sorted by name, as offered in the picker.
    fn sorted_link_types(&self) -> Vec<IssueLinkType> {
        let mut types = self.services.links.link_types();
        types.sort_by_key(|t| t.name.to_lowercase());
        types
    }

    /// Describe a stored link from `issue_key`'s point of view.
    fn link_json(&self, issue_key: &str, link: &IssueLink) -> Value {
        let link_type = self
            .services
            .links
            .link_types()
            .into_iter()
            .find(|t| t.id == link.link_type_id);
        let type_json = link_type.as_ref().map_or(Value::Null, |t| {
            json!({"id": t.id.to_string(), "name": t.name, "inward": t.inward, "outward": t.outward})
        });
        if link.source_key == issue_key {
            json!({"id": link.id.to_string(), "type": type_json, "outwardIssue": {"key": link.destination_key}})
        } else {
            json!({"id": link.id.to_string(), "type": type_json, "inwardIssue": {"key": link.source_key}})
        }
    }

    fn links_of(&self, issue: &Issue) -> Vec<IssueLink> {
        issue
            .key
            .as_deref()
            .map(|key| self.services.links.links_for_issue(key))
            .unwrap_or_default()
    }

    fn add_links(&self, caller: Option<&User>, issue: &Issue, value: &IssueLinkingValue) {
        if !self.linking_enabled() {
            return;
        }
        let Some(validation) = &value.validation else {
            return;
        };
        match self.services.links.add_links(caller, issue, validation) {
            Ok(links) => debug!(issue = issue.display_key(), count = links.len(), "Linked issues"),
            Err(e) => error!(issue = issue.display_key(), error = %e, "Could not link issues"),
        }
    }
}

impl Field for IssueLinksSystemField {
    fn id(&self) -> &str {
        ISSUE_LINKS
    }

    fn name_key(&self) -> &str {
        "issue.field.issuelinks"
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

impl NavigableField for IssueLinksSystemField {
    fn column_heading_key(&self) -> &str {
        "issue.column.heading.issuelinks"
    }

    fn column_value(&self, issue: &Issue) -> Option<String> {
        let key = issue.key.as_deref()?;
        let links: Vec<String> = self
            .links_of(issue)
            .iter()
            .map(|l| if l.source_key == key { l.destination_key.clone() } else { l.source_key.clone() })
            .collect();
        (!links.is_empty()).then(|| links.join(", "))
    }
}

impl OrderableField for IssueLinksSystemField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        let mut value = IssueLinkingValue::default()
            .with_linking_enabled(self.linking_enabled())
            .with_create_issue(params.flag(IS_CREATE_ISSUE));
        value.link_description = params.first(LINK_TYPE).map(str::to_string);
        value.linked_issues = params.get(ISSUE_KEYS).map(split_issue_keys).unwrap_or_default();
        FieldValue::IssueLinking(value)
    }

    fn has_param(&self, params: &RequestParams) -> bool {
        params.contains(LINK_TYPE) || params.contains(ISSUE_KEYS)
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, _issue: &Issue) {
        holder.insert(ISSUE_LINKS, self.empty_value());
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, _issue: &Issue) {
        holder.insert(ISSUE_LINKS, self.empty_value());
    }

    fn populate_for_move(&self, _holder: &mut FieldValuesHolder, _original: &Issue, _target: &Issue) {}

    fn populate_from_string(&self, _holder: &mut FieldValuesHolder, _value: &str, _issue: &Issue) -> Result<()> {
        Ok(())
    }

    fn validate_params(
        &self,
        ctx: &mut OperationContext,
        errors: &mut ErrorCollection,
        i18n: &dyn I18nHelper,
        issue: &Issue,
        _item: &FieldLayoutItem,
    ) {
        let Some(value) = ctx.holder.issue_linking(ISSUE_LINKS).filter(|v| v.has_links()).cloned() else {
            return;
        };
        if !self.linking_enabled() {
            errors.add_error(ISSUE_LINKS, i18n.text("issuelinking.service.error.disabled", &[]));
            return;
        }
        let description = value.link_description.clone().unwrap_or_default();
        let mut service_errors = ErrorCollection::new();
        let validation = self.services.links.validate_add(
            ctx.caller.as_ref(),
            issue,
            &description,
            &value.linked_issues,
            &mut service_errors,
        );
        match validation {
            Some(validation) => {
                ctx.holder
                    .insert(ISSUE_LINKS, FieldValue::IssueLinking(value.with_validation(Some(validation))));
            }
            None => {
                // The form has a single input for links; every service
                // complaint lands on it.
                for message in service_errors.error_messages().iter().chain(service_errors.errors().values()) {
                    errors.add_error(ISSUE_LINKS, message.clone());
                }
                for reason in service_errors.reasons() {
                    errors.add_reason(*reason);
                }
            }
        }
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        Ok(holder
            .issue_linking(ISSUE_LINKS)
            .cloned()
            .map_or(IssueValue::Empty, IssueValue::IssueLinking))
    }

    fn current_value(&self, _issue: &Issue) -> IssueValue {
        IssueValue::Empty
    }

    fn default_value(&self, _issue: &Issue) -> IssueValue {
        IssueValue::Empty
    }

    fn update_issue(
        &self,
        _item: Option<&FieldLayoutItem>,
        patch: &mut IssuePatch,
        holder: &mut FieldValuesHolder,
    ) -> Result<()> {
        if !self.linking_enabled() {
            return Ok(());
        }
        if let Some(value) = holder.issue_linking(ISSUE_LINKS).filter(|v| v.validation.is_some()) {
            patch.set_external_field_value(ISSUE_LINKS, IssueValue::Empty, IssueValue::IssueLinking(value.clone()));
        }
        Ok(())
    }

    /// Link failures are logged; the issue update itself stands.
    fn update_value(
        &self,
        caller: Option<&User>,
        _item: Option<&FieldLayoutItem>,
        issue: &Issue,
        modified: &ModifiedValue,
        _changes: &mut IssueChangeHolder,
    ) -> Result<()> {
        if let IssueValue::IssueLinking(value) = &modified.new {
            self.add_links(caller, issue, value);
        }
        Ok(())
    }

    fn create_value(&self, caller: Option<&User>, issue: &Issue, value: &IssueValue) -> Result<()> {
        if let IssueValue::IssueLinking(value) = value {
            self.add_links(caller, issue, value);
        }
        Ok(())
    }

    fn has_value(&self, _issue: &Issue) -> bool {
        false
    }

    fn can_remove_value_from_issue_object(&self, _issue: &Issue) -> bool {
        true
    }

    fn remove_value_from_issue_object(&self, _patch: &mut IssuePatch) -> Result<()> {
        Ok(())
    }

    fn needs_move(&self, _originals: &[Issue], _target: &Issue, _target_item: &FieldLayoutItem) -> MessagedResult {
        MessagedResult::no_input()
    }

    fn available_for_bulk_edit(&self, _bean: &BulkEditBean) -> Option<&'static str> {
        Some(BULK_UNAVAILABLE)
    }

    fn is_shown(&self, issue: &Issue, caller: Option<&User>) -> bool {
        self.linking_enabled()
            && self
                .services
                .permissions
                .has_permission(Permission::LinkIssue, &issue.project, caller)
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        let i18n = self.services.i18n.as_ref();
        let mut params = TemplateParams::for_field(ISSUE_LINKS, &self.name(i18n), request);
        let issue = request.issue;
        match view {
            FieldView::Create | FieldView::Edit | FieldView::BulkEdit => {
                let value = request.holder.and_then(|h| h.issue_linking(ISSUE_LINKS)).cloned();
                let link_types = self.sorted_link_types();
                let selected = value
                    .as_ref()
                    .and_then(|v| v.link_description.clone())
                    .filter(|d| !d.trim().is_empty())
                    .or_else(|| link_types.first().map(|t| t.outward.clone()));
                params.insert("isCreateIssue", view == FieldView::Create);
                params.insert_serialized("value", &value);
                params.insert_serialized("linkTypes", &link_types);
                params.insert("selectedLinkType", selected);
            }
            FieldView::View | FieldView::Column => {
                let key = issue.display_key();
                let links: Vec<Value> = self.links_of(issue).iter().map(|l| self.link_json(key, l)).collect();
                params.insert("links", links);
            }
        }
        render(self.services.renderer.as_ref(), &format!("issuelinks-{}.vm", view.suffix()), &params)
    }
}

impl RestAwareField for IssueLinksSystemField {
    fn json_schema(&self) -> JsonType {
        JsonType::system_array("issuelinks", ISSUE_LINKS)
    }

    fn json_from_issue(
        &self,
        issue: &Issue,
        _render: bool,
        _item: Option<&FieldLayoutItem>,
    ) -> Option<FieldJsonRepresentation> {
        if !self.linking_enabled() {
            return None;
        }
        let key = issue.display_key();
        let links: Vec<Value> = self.links_of(issue).iter().map(|l| self.link_json(key, l)).collect();
        Some(FieldJsonRepresentation::new(Value::Array(links)))
    }

    fn supported_operations(&self) -> &'static [StandardOperation] {
        &[StandardOperation::Add]
    }

    /// `{"type": {"name": "Blocks"}, "outwardIssue": {"key": "HR-2"}}`; the
    /// link type may be given by name or by the wording of either end.
    fn apply_operations(
        &self,
        _issue: &Issue,
        operations: &[FieldOperation],
        params: &mut RequestParams,
        errors: &mut ErrorCollection,
    ) {
        let types = self.services.links.link_types();
        for op in check_supported(self, operations, errors) {
            let type_ref = op.value.get("type");
            let by = |name: &str| type_ref.and_then(|t| t.get(name)).and_then(Value::as_str);
            let link_type = types.iter().find(|t| {
                by("id").is_some_and(|id| id == t.id.to_string())
                    || by("name").is_some_and(|n| n.eq_ignore_ascii_case(&t.name))
                    || by("outward").is_some_and(|n| n.eq_ignore_ascii_case(&t.outward))
                    || by("inward").is_some_and(|n| n.eq_ignore_ascii_case(&t.inward))
            });
            let Some(link_type) = link_type else {
                errors.add_error(ISSUE_LINKS, "Could not find a link type for the requested link");
                continue;
            };
            let end_key = |end: &str| {
                op.value
                    .get(end)
                    .and_then(|e| e.get("key"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            let (description, key) = match (end_key("outwardIssue"), end_key("inwardIssue")) {
                (Some(key), _) => (link_type.outward.clone(), key),
                (None, Some(key)) => (link_type.inward.clone(), key),
                (None, None) => {
                    errors.add_error(ISSUE_LINKS, "A link needs an inwardIssue or an outwardIssue");
                    continue;
                }
            };
            params.set(LINK_TYPE, vec![description]);
            params.set(ISSUE_KEYS, vec![key]);
        }
    }
}

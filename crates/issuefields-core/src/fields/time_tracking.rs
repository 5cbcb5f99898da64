//! Original and remaining estimate entry.
//!
//! Two modes: legacy, where a single estimate is edited (the original
//! estimate until work starts, the remaining one afterwards), and modern,
//! where original and remaining estimates are edited independently.

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{FieldError, Result};
use crate::field::ids::{IS_CREATE_ISSUE, TIMETRACKING};
use crate::field::{Field, FieldTraits, OrderableField, RestAwareField, check_supported};
use crate::fields::common::{BULK_UNAVAILABLE, add_required_error, render};
use crate::history::{ChangeItemBean, IssueChangeHolder};
use crate::i18n::I18nHelper;
use crate::issue::{Issue, User};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, JsonType, StandardOperation};
use crate::services::FieldServices;
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::params::is_blank;
use crate::values::{FieldValue, FieldValuesHolder, RequestParams, TargetSubField, TimeTrackingValue};

pub const TARGET_SUB_FIELD: &str = "timetracking_targetsubfield";
pub const ORIGINAL_ESTIMATE: &str = "timetracking_originalestimate";
pub const REMAINING_ESTIMATE: &str = "timetracking_remainingestimate";
/// Set by the work log field when work is being logged in the same request.
pub const LOG_WORK_ACTIVATE: &str = "worklog_activate";

/// Read access to the time tracking entry of a holder, for fields that
/// depend on it.
pub trait TimeTrackingQuery: Send + Sync + std::fmt::Debug {
    /// The remaining estimate the user entered, in display form.
    fn remaining_estimate_input(&self, holder: &FieldValuesHolder) -> Option<String>;

    /// Whether the holder's time tracking entry is in legacy mode.
    fn is_legacy_input(&self, holder: &FieldValuesHolder) -> bool;
}

#[derive(Debug)]
pub struct TimeTrackingSystemField {
    services: FieldServices,
}

impl TimeTrackingSystemField {
    #[must_use]
    pub const fn new(services: FieldServices) -> Self {
        Self { services }
    }

    /// Legacy when configured, or when the request only carries the single
    /// `timetracking` parameter.
    fn is_legacy(&self, params: &RequestParams) -> bool {
        self.services.settings.time_tracking_legacy_mode
            || (params.contains(TIMETRACKING)
                && !params.contains(ORIGINAL_ESTIMATE)
                && !params.contains(REMAINING_ESTIMATE))
    }

    fn format(&self, millis: Option<i64>) -> Option<String> {
        self.services.durations().format_opt(millis)
    }

    /// Parse a display value: blank is `None`, garbage is an error.
    fn parse(&self, display: Option<&str>) -> Result<Option<i64>> {
        match display.map(str::trim).filter(|d| !d.is_empty()) {
            None => Ok(None),
            Some(d) => self.services.durations().parse(d).map(Some),
        }
    }

    fn value_for_issue(&self, issue: &Issue) -> TimeTrackingValue {
        if self.services.settings.time_tracking_legacy_mode {
            TimeTrackingValue::legacy(self.format(issue.estimate)).with_estimate(issue.estimate)
        } else {
            TimeTrackingValue::modern(self.format(issue.original_estimate), self.format(issue.estimate))
                .with_estimates(issue.original_estimate, issue.estimate)
        }
    }

    fn validate_legacy(
        &self,
        mut value: TimeTrackingValue,
        ctx: &mut OperationContext,
        errors: &mut ErrorCollection,
        i18n: &dyn I18nHelper,
        issue: &Issue,
        item: &FieldLayoutItem,
    ) {
        let work_started = self.services.worklogs.has_work_started(issue);
        if value.log_work_activated && work_started {
            value.estimate_display = self.format(issue.estimate);
            value.estimate = issue.estimate;
        } else if !self.services.settings.time_tracking && !is_blank(value.estimate_display.as_deref()) {
            errors.add_error(TIMETRACKING, i18n.text("createissue.error.timetracking.disabled", &[]));
            return;
        } else if item.required && is_blank(value.estimate_display.as_deref()) {
            add_required_error(errors, TIMETRACKING, self.name_key(), i18n);
        } else {
            match self.parse(value.estimate_display.as_deref()) {
                Ok(estimate) => value.estimate = estimate,
                Err(_) => {
                    let key = if work_started {
                        "createissue.error.remaining.estimate.invalid"
                    } else {
                        "createissue.error.original.estimate.invalid"
                    };
                    errors.add_error(TIMETRACKING, i18n.text(key, &[]));
                }
            }
        }
        ctx.holder.insert(TIMETRACKING, FieldValue::TimeTracking(value));
    }

    fn validate_modern(
        &self,
        mut value: TimeTrackingValue,
        ctx: &mut OperationContext,
        errors: &mut ErrorCollection,
        i18n: &dyn I18nHelper,
        issue: &Issue,
        item: &FieldLayoutItem,
    ) {
        if !self.services.settings.time_tracking {
            errors.add_error(TIMETRACKING, i18n.text("createissue.error.timetracking.disabled", &[]));
            return;
        }

        if value.log_work_activated {
            // The work log field owns the remaining estimate for this request.
            value.remaining_estimate_display = self.format(issue.estimate);
            value.remaining_estimate = issue.estimate;
            if item.required && is_blank(value.original_estimate_display.as_deref()) {
                let name = i18n.text("issue.field.originalestimate", &[]);
                errors.add_error(ORIGINAL_ESTIMATE, i18n.text("issue.field.required", &[&name]));
                ctx.holder.insert(TIMETRACKING, FieldValue::TimeTracking(value));
                return;
            }
            match self.parse(value.original_estimate_display.as_deref()) {
                Ok(original) => value.original_estimate = original,
                Err(_) => {
                    errors.add_error(
                        ORIGINAL_ESTIMATE,
                        i18n.text("createissue.error.original.estimate.invalid", &[]),
                    );
                    ctx.holder.insert(TIMETRACKING, FieldValue::TimeTracking(value));
                    return;
                }
            }
        } else {
            if item.required && value.is_blank() {
                if value.targets_original() {
                    let name = i18n.text("issue.field.originalestimate", &[]);
                    errors.add_error(ORIGINAL_ESTIMATE, i18n.text("issue.field.required", &[&name]));
                }
                if value.targets_remaining() {
                    let name = i18n.text("issue.field.remainingestimate", &[]);
                    errors.add_error(REMAINING_ESTIMATE, i18n.text("issue.field.required", &[&name]));
                }
                return;
            }

            let mut valid = true;
            if value.targets_original() {
                match self.parse(value.original_estimate_display.as_deref()) {
                    Ok(original) => value.original_estimate = original,
                    Err(_) => {
                        valid = false;
                        errors.add_error(
                            ORIGINAL_ESTIMATE,
                            i18n.text("createissue.error.original.estimate.invalid", &[]),
                        );
                    }
                }
            }
            if value.targets_remaining() {
                match self.parse(value.remaining_estimate_display.as_deref()) {
                    Ok(remaining) => value.remaining_estimate = remaining,
                    Err(_) => {
                        valid = false;
                        errors.add_error(
                            REMAINING_ESTIMATE,
                            i18n.text("createissue.error.remaining.estimate.invalid", &[]),
                        );
                    }
                }
            }
            if !valid {
                return;
            }
        }

        // One estimate given and the other blank: copy it across.
        if value.target_sub_field.is_none() {
            match (value.original_estimate, value.remaining_estimate) {
                (Some(original), None) => {
                    value.remaining_estimate = Some(original);
                    value.remaining_estimate_display = value.original_estimate_display.clone();
                }
                (None, Some(remaining)) => {
                    value.original_estimate = Some(remaining);
                    value.original_estimate_display = value.remaining_estimate_display.clone();
                }
                _ => {}
            }
        }
        ctx.holder.insert(TIMETRACKING, FieldValue::TimeTracking(value));
    }

    fn estimate_item(name: &str, old: Option<i64>, new: Option<i64>) -> ChangeItemBean {
        let old = old.map(|ms| ms.to_string());
        let new = new.map(|ms| ms.to_string());
        ChangeItemBean::jira(name)
            .from_value(old.clone(), old)
            .to_value(new.clone(), new)
    }
}

impl TimeTrackingQuery for TimeTrackingSystemField {
    fn remaining_estimate_input(&self, holder: &FieldValuesHolder) -> Option<String> {
        let value = holder.time_tracking(TIMETRACKING)?;
        let display = if value.legacy_mode {
            value.estimate_display.as_deref()
        } else {
            value.remaining_estimate_display.as_deref()
        };
        display.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string)
    }

    fn is_legacy_input(&self, holder: &FieldValuesHolder) -> bool {
        holder.time_tracking(TIMETRACKING).is_some_and(|v| v.legacy_mode)
    }
}

impl Field for TimeTrackingSystemField {
    fn id(&self) -> &str {
        TIMETRACKING
    }

    fn name_key(&self) -> &str {
        "issue.field.timetracking"
    }

    fn traits(&self) -> FieldTraits {
        FieldTraits::hideable_requirable().not_searchable()
    }

    fn as_orderable(&self) -> Option<&dyn OrderableField> {
        Some(self)
    }

    fn as_rest_aware(&self) -> Option<&dyn RestAwareField> {
        Some(self)
    }
}

impl OrderableField for TimeTrackingSystemField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        let base = if self.is_legacy(params) {
            TimeTrackingValue::legacy(params.first(TIMETRACKING).map(str::to_string))
        } else {
            TimeTrackingValue::modern(
                params.first(ORIGINAL_ESTIMATE).map(str::to_string),
                params.first(REMAINING_ESTIMATE).map(str::to_string),
            )
        };
        FieldValue::TimeTracking(
            base.with_create_issue(params.flag(IS_CREATE_ISSUE))
                .with_log_work_activated(params.flag(LOG_WORK_ACTIVATE))
                .with_target_sub_field(params.first(TARGET_SUB_FIELD).and_then(TargetSubField::parse)),
        )
    }

    fn has_param(&self, params: &RequestParams) -> bool {
        params.contains(TIMETRACKING) || params.contains(ORIGINAL_ESTIMATE) || params.contains(REMAINING_ESTIMATE)
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        holder.insert(TIMETRACKING, FieldValue::TimeTracking(self.value_for_issue(issue)));
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, _issue: &Issue) {
        let value = if self.services.settings.time_tracking_legacy_mode {
            TimeTrackingValue::legacy(None)
        } else {
            TimeTrackingValue::modern(None, None)
        };
        holder.insert(TIMETRACKING, FieldValue::TimeTracking(value.with_create_issue(true)));
    }

    fn populate_from_string(&self, holder: &mut FieldValuesHolder, value: &str, _issue: &Issue) -> Result<()> {
        let millis = self.parse(Some(value))?;
        let entry = if self.services.settings.time_tracking_legacy_mode {
            TimeTrackingValue::legacy(Some(value.to_string())).with_estimate(millis)
        } else {
            TimeTrackingValue::modern(Some(value.to_string()), Some(value.to_string())).with_estimates(millis, millis)
        };
        holder.insert(TIMETRACKING, FieldValue::TimeTracking(entry));
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
        let Some(value) = ctx.holder.time_tracking(TIMETRACKING).cloned() else {
            return;
        };
        if value.legacy_mode {
            self.validate_legacy(value, ctx, errors, i18n, issue, item);
        } else {
            self.validate_modern(value, ctx, errors, i18n, issue, item);
        }
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        let Some(value) = holder.time_tracking(TIMETRACKING) else {
            return Ok(IssueValue::Empty);
        };
        if value.legacy_mode {
            return Ok(self
                .parse(value.estimate_display.as_deref())?
                .map_or(IssueValue::Empty, IssueValue::Estimate));
        }
        let original = self.parse(value.original_estimate_display.as_deref())?;
        let remaining = self.parse(value.remaining_estimate_display.as_deref())?;
        Ok(IssueValue::TimeTracking(value.clone().with_estimates(original, remaining)))
    }

    fn current_value(&self, issue: &Issue) -> IssueValue {
        if self.services.settings.time_tracking_legacy_mode {
            issue.estimate.map_or(IssueValue::Empty, IssueValue::Estimate)
        } else {
            IssueValue::TimeTracking(self.value_for_issue(issue))
        }
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
        let Some(value) = holder.time_tracking(TIMETRACKING).cloned() else {
            return Ok(());
        };
        let before = TimeTrackingValue::default()
            .with_estimates(patch.issue().original_estimate, patch.issue().estimate);

        if value.legacy_mode {
            if self.services.worklogs.has_work_started(patch.original()) {
                patch.set_estimate(value.estimate);
            } else {
                patch.set_original_estimate(value.estimate);
                patch.set_estimate(value.estimate);
            }
        } else {
            if value.targets_original() {
                patch.set_original_estimate(value.original_estimate);
            }
            if value.targets_remaining() {
                patch.set_estimate(value.remaining_estimate);
            }
        }

        let after = TimeTrackingValue {
            legacy_mode: value.legacy_mode,
            ..TimeTrackingValue::default()
        }
        .with_estimates(patch.issue().original_estimate, patch.issue().estimate);
        debug!(issue = patch.issue().display_key(), legacy = value.legacy_mode, "Applied time tracking");
        patch.set_external_field_value(TIMETRACKING, IssueValue::TimeTracking(before), IssueValue::TimeTracking(after));
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
        let (IssueValue::TimeTracking(old), IssueValue::TimeTracking(new)) = (&modified.old, &modified.new) else {
            return Ok(());
        };
        if old.original_estimate != new.original_estimate {
            changes.add_change_item(Self::estimate_item(
                "timeoriginalestimate",
                old.original_estimate,
                new.original_estimate,
            ));
        }
        if old.remaining_estimate != new.remaining_estimate {
            changes.add_change_item(Self::estimate_item("timeestimate", old.remaining_estimate, new.remaining_estimate));
        }
        Ok(())
    }

    fn has_value(&self, issue: &Issue) -> bool {
        issue.original_estimate.is_some() || issue.estimate.is_some()
    }

    fn can_remove_value_from_issue_object(&self, _issue: &Issue) -> bool {
        true
    }

    fn remove_value_from_issue_object(&self, patch: &mut IssuePatch) -> Result<()> {
        patch.set_original_estimate(None);
        patch.set_estimate(None);
        Ok(())
    }

    fn needs_move(&self, originals: &[Issue], _target: &Issue, target_item: &FieldLayoutItem) -> MessagedResult {
        if !self.services.settings.time_tracking || !target_item.required {
            return MessagedResult::no_input();
        }
        let legacy = self.services.settings.time_tracking_legacy_mode;
        let missing = originals.iter().any(|issue| {
            if legacy {
                issue.estimate.is_none()
            } else {
                issue.original_estimate.is_none()
            }
        });
        MessagedResult::new(missing)
    }

    fn available_for_bulk_edit(&self, _bean: &BulkEditBean) -> Option<&'static str> {
        Some(BULK_UNAVAILABLE)
    }

    fn is_shown(&self, _issue: &Issue, _caller: Option<&User>) -> bool {
        self.services.settings.time_tracking
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        let i18n = self.services.i18n.as_ref();
        let mut params = TemplateParams::for_field(TIMETRACKING, &self.name(i18n), request);
        let issue = request.issue;
        match view {
            FieldView::View | FieldView::Column => {
                params.insert("originalEstimate", self.format(issue.original_estimate));
                params.insert("remainingEstimate", self.format(issue.estimate));
                params.insert("timeSpent", self.format(issue.time_spent));
            }
            FieldView::Create | FieldView::Edit => {
                let value = request
                    .holder
                    .and_then(|h| h.time_tracking(TIMETRACKING).cloned())
                    .unwrap_or_else(|| self.value_for_issue(issue));
                let settings = &self.services.settings;
                params.insert("isLegacyBehaviour", value.legacy_mode);
                params.insert("isLogWorkActivated", value.log_work_activated);
                params.insert("estimate", value.estimate_display.clone());
                params.insert("originalEstimate", value.original_estimate_display.clone());
                params.insert("remainingEstimate", value.remaining_estimate_display.clone());
                params.insert_serialized("targetSubField", &value.target_sub_field);
                params.insert("hoursPerDay", settings.working_time.hours_per_day);
                params.insert("daysPerWeek", settings.working_time.days_per_week);
            }
            FieldView::BulkEdit => return Err(FieldError::unsupported(TIMETRACKING, "bulk edit")),
        }
        render(self.services.renderer.as_ref(), &format!("timetracking-{}.vm", view.suffix()), &params)
    }
}

impl RestAwareField for TimeTrackingSystemField {
    fn json_schema(&self) -> JsonType {
        JsonType::system("timetracking", TIMETRACKING)
    }

    fn json_from_issue(
        &self,
        issue: &Issue,
        _render: bool,
        _item: Option<&FieldLayoutItem>,
    ) -> Option<FieldJsonRepresentation> {
        if !self.services.settings.time_tracking {
            return None;
        }
        let mut json = Map::new();
        for (name, millis) in [
            ("originalEstimate", issue.original_estimate),
            ("remainingEstimate", issue.estimate),
            ("timeSpent", issue.time_spent),
        ] {
            if let Some(ms) = millis {
                json.insert(name.to_string(), json!(self.services.durations().short_format(ms)));
                json.insert(format!("{name}Seconds"), json!(ms / 1000));
            }
        }
        Some(FieldJsonRepresentation::new(Value::Object(json)))
    }

    fn supported_operations(&self) -> &'static [StandardOperation] {
        &[StandardOperation::Set, StandardOperation::Edit]
    }

    fn apply_operations(
        &self,
        _issue: &Issue,
        operations: &[FieldOperation],
        params: &mut RequestParams,
        errors: &mut ErrorCollection,
    ) {
        for op in check_supported(self, operations, errors) {
            let Some(object) = op.value.as_object() else {
                errors.add_error(TIMETRACKING, "Time tracking value must be an object");
                continue;
            };
            let original = object.get("originalEstimate").and_then(Value::as_str);
            let remaining = object.get("remainingEstimate").and_then(Value::as_str);
            if self.services.settings.time_tracking_legacy_mode {
                if let Some(estimate) = remaining.or(original) {
                    params.set(TIMETRACKING, vec![estimate.to_string()]);
                }
                continue;
            }
            if let Some(original) = original {
                params.set(ORIGINAL_ESTIMATE, vec![original.to_string()]);
            }
            if let Some(remaining) = remaining {
                params.set(REMAINING_ESTIMATE, vec![remaining.to_string()]);
            }
            match (original.is_some(), remaining.is_some()) {
                (true, false) => params.set(TARGET_SUB_FIELD, vec![ORIGINAL_ESTIMATE.to_string()]),
                (false, true) => params.set(TARGET_SUB_FIELD, vec![REMAINING_ESTIMATE.to_string()]),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SiteSettings;
    use crate::testing;
    use pretty_assertions::assert_eq;

    const HOUR: i64 = 3_600_000;

    fn field() -> TimeTrackingSystemField {
        TimeTrackingSystemField::new(testing::services())
    }

    fn validate(field: &TimeTrackingSystemField, params: &RequestParams, item: &FieldLayoutItem) -> (ErrorCollection, OperationContext) {
        validate_on(field, &testing::issue(), params, item)
    }

    fn validate_on(
        field: &TimeTrackingSystemField,
        issue: &Issue,
        params: &RequestParams,
        item: &FieldLayoutItem,
    ) -> (ErrorCollection, OperationContext) {
        let mut ctx = OperationContext::default();
        field.populate_from_params(&mut ctx.holder, params);
        let mut errors = ErrorCollection::new();
        field.validate_params(&mut ctx, &mut errors, &crate::i18n::DefaultI18n, issue, item);
        (errors, ctx)
    }

    #[test]
    fn test_blank_remaining_copied_from_original() {
        let params = RequestParams::new()
            .with(ORIGINAL_ESTIMATE, "1h")
            .with(REMAINING_ESTIMATE, "");
        let item = FieldLayoutItem::new(TIMETRACKING).required();

        let (errors, ctx) = validate(&field(), &params, &item);

        assert!(!errors.has_any_errors(), "{errors}");
        let value = ctx.holder.time_tracking(TIMETRACKING).unwrap();
        assert_eq!(value.remaining_estimate_display.as_deref(), Some("1h"));
        assert_eq!(value.remaining_estimate, Some(HOUR));
        assert_eq!(value.original_estimate, Some(HOUR));
    }

    #[test]
    fn test_required_and_both_blank() {
        let params = RequestParams::new()
            .with(ORIGINAL_ESTIMATE, "")
            .with(REMAINING_ESTIMATE, " ");
        let item = FieldLayoutItem::new(TIMETRACKING).required();

        let (errors, _) = validate(&field(), &params, &item);

        assert_eq!(
            errors.errors().keys().cloned().collect::<Vec<_>>(),
            vec![ORIGINAL_ESTIMATE.to_string(), REMAINING_ESTIMATE.to_string()]
        );
    }

    #[test]
    fn test_invalid_duration_reported_on_sub_field() {
        let params = RequestParams::new().with(ORIGINAL_ESTIMATE, "soon");
        let (errors, _) = validate(&field(), &params, &FieldLayoutItem::new(TIMETRACKING));

        assert!(errors.error(ORIGINAL_ESTIMATE).is_some());
        assert!(errors.error(REMAINING_ESTIMATE).is_none());
    }

    #[test]
    fn test_log_work_resets_remaining() {
        let params = RequestParams::new()
            .with(ORIGINAL_ESTIMATE, "")
            .with(REMAINING_ESTIMATE, "5h")
            .with(LOG_WORK_ACTIVATE, "true");
        let item = FieldLayoutItem::new(TIMETRACKING).required();

        let (errors, ctx) = validate(&field(), &params, &item);

        assert_eq!(errors.errors().len(), 1);
        assert!(errors.error(ORIGINAL_ESTIMATE).is_some());
        let value = ctx.holder.time_tracking(TIMETRACKING).unwrap();
        assert_eq!(value.remaining_estimate, testing::issue().estimate);
    }

    #[test]
    fn test_log_work_fills_remaining_when_issue_has_no_estimate() {
        let issue = testing::issue().with_estimates(None, None);
        let params = RequestParams::new()
            .with(ORIGINAL_ESTIMATE, "2h")
            .with(LOG_WORK_ACTIVATE, "true");

        let (errors, ctx) = validate_on(&field(), &issue, &params, &FieldLayoutItem::new(TIMETRACKING));

        assert!(!errors.has_any_errors(), "{errors}");
        let value = ctx.holder.time_tracking(TIMETRACKING).unwrap();
        assert_eq!(value.original_estimate, Some(2 * HOUR));
        assert_eq!(value.remaining_estimate, Some(2 * HOUR));
        assert_eq!(value.remaining_estimate_display.as_deref(), Some("2h"));
    }

    #[test]
    fn test_log_work_keeps_current_remaining() {
        let issue = testing::issue().with_estimates(Some(2 * HOUR), Some(HOUR));
        let params = RequestParams::new()
            .with(ORIGINAL_ESTIMATE, "3h")
            .with(REMAINING_ESTIMATE, "5h")
            .with(LOG_WORK_ACTIVATE, "true");

        let (errors, ctx) = validate_on(&field(), &issue, &params, &FieldLayoutItem::new(TIMETRACKING));

        assert!(!errors.has_any_errors(), "{errors}");
        let value = ctx.holder.time_tracking(TIMETRACKING).unwrap();
        assert_eq!(value.original_estimate, Some(3 * HOUR));
        assert_eq!(value.remaining_estimate, Some(HOUR));
    }

    #[test]
    fn test_disabled_legacy_only_rejects_submitted_estimate() {
        let settings = SiteSettings::default().with_time_tracking(false).with_legacy_mode(true);
        let field = TimeTrackingSystemField::new(testing::services().with_settings(settings));
        let item = FieldLayoutItem::new(TIMETRACKING);

        let (errors, _) = validate(&field, &RequestParams::new().with(TIMETRACKING, " "), &item);
        assert!(!errors.has_any_errors(), "{errors}");

        let (errors, _) = validate(&field, &RequestParams::new().with(TIMETRACKING, "2h"), &item);
        assert_eq!(errors.error(TIMETRACKING), Some("Time tracking is disabled."));
    }

    #[test]
    fn test_disabled_time_tracking() {
        let services = testing::services().with_settings(SiteSettings::default().with_time_tracking(false));
        let field = TimeTrackingSystemField::new(services);
        let params = RequestParams::new().with(ORIGINAL_ESTIMATE, "1h");

        let (errors, _) = validate(&field, &params, &FieldLayoutItem::new(TIMETRACKING));

        assert!(errors.error(TIMETRACKING).is_some());
        assert!(!field.is_shown(&testing::issue(), None));
    }

    #[test]
    fn test_single_timetracking_param_forces_legacy() {
        let params = RequestParams::new().with(TIMETRACKING, "2h");
        let FieldValue::TimeTracking(value) = field().relevant_params(&params) else {
            panic!("expected time tracking value");
        };
        assert!(value.legacy_mode);
        assert_eq!(value.estimate_display.as_deref(), Some("2h"));
    }

    #[test]
    fn test_round_trip_from_issue() {
        let field = field();
        let issue = testing::issue().with_estimates(Some(2 * HOUR), Some(HOUR));
        let mut holder = FieldValuesHolder::new();

        field.populate_from_issue(&mut holder, &issue);

        assert_eq!(field.value_from_params(&holder).unwrap(), field.current_value(&issue));
    }

    #[test]
    fn test_update_emits_change_items_per_sub_field() {
        let field = field();
        let issue = testing::issue().with_estimates(Some(2 * HOUR), Some(HOUR));
        let mut holder = FieldValuesHolder::new();
        holder.insert(
            TIMETRACKING,
            FieldValue::TimeTracking(
                TimeTrackingValue::modern(None, Some("3h".into()))
                    .with_target_sub_field(Some(TargetSubField::RemainingEstimate))
                    .with_estimates(None, Some(3 * HOUR)),
            ),
        );
        let mut patch = IssuePatch::new(issue.clone());

        field.update_issue(None, &mut patch, &mut holder).unwrap();
        assert_eq!(patch.issue().original_estimate, Some(2 * HOUR));
        assert_eq!(patch.issue().estimate, Some(3 * HOUR));

        let modified = patch.modified(TIMETRACKING).unwrap().clone();
        let mut changes = IssueChangeHolder::new();
        field.update_value(None, None, &issue, &modified, &mut changes).unwrap();

        assert_eq!(changes.items.len(), 1);
        let item = &changes.items[0];
        assert_eq!(item.field, "timeestimate");
        assert_eq!(item.from.as_deref(), Some("3600000"));
        assert_eq!(item.to.as_deref(), Some("10800000"));
    }

    #[test]
    fn test_needs_move_when_target_requires_estimate() {
        let field = field();
        let target = testing::issue();
        let item = FieldLayoutItem::new(TIMETRACKING).required();

        let without = testing::issue().with_estimates(None, None);
        assert!(field.needs_move(&[without], &target, &item).needs_input);

        let with = testing::issue().with_estimates(Some(HOUR), Some(HOUR));
        assert!(!field.needs_move(&[with], &target, &item).needs_input);
        assert!(field.available_for_bulk_edit(&BulkEditBean::default()).is_some());
    }

    #[test]
    fn test_rest_set_targets_one_sub_field() {
        let mut params = RequestParams::new();
        let mut errors = ErrorCollection::new();
        let ops = vec![FieldOperation::set(json!({"remainingEstimate": "4h"}))];

        field().apply_operations(&testing::issue(), &ops, &mut params, &mut errors);

        assert!(!errors.has_any_errors());
        assert_eq!(params.first(REMAINING_ESTIMATE), Some("4h"));
        assert_eq!(params.first(TARGET_SUB_FIELD), Some(REMAINING_ESTIMATE));
    }
}

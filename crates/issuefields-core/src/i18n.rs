//! Message key resolution.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Resolves message keys to user-facing text.
pub trait I18nHelper: Send + Sync {
    /// Resolve `key`, substituting `{0}`, `{1}`, ... with `args`.
    fn text(&self, key: &str, args: &[&str]) -> String;
}

static BUNDLE: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("issue.field.required", "{0} is required."),
        ("issue.field.summary", "Summary"),
        ("issue.field.description", "Description"),
        ("issue.field.environment", "Environment"),
        ("issue.field.assignee", "Assignee"),
        ("issue.field.components", "Component/s"),
        ("issue.field.affectsversions", "Affects Version/s"),
        ("issue.field.fixversions", "Fix Version/s"),
        ("issue.field.resolution", "Resolution"),
        ("issue.field.issuetype", "Issue Type"),
        ("issue.field.securitylevel", "Security Level"),
        ("issue.field.timetracking", "Time Tracking"),
        ("issue.field.originalestimate", "Original Estimate"),
        ("issue.field.remainingestimate", "Remaining Estimate"),
        ("issue.field.worklog", "Log Work"),
        ("issue.field.comment", "Comment"),
        ("issue.field.issuelinks", "Linked Issues"),
        ("issue.column.heading.issuelinks", "Links"),
        ("issue.field.project", "Project"),
        ("issue.field.summary.too.long", "Summary must be less than 255 characters."),
        ("createissue.error.timetracking.disabled", "Time tracking is disabled."),
        ("createissue.error.original.estimate.invalid", "Original estimate is invalid."),
        ("createissue.error.remaining.estimate.invalid", "Remaining estimate is invalid."),
        ("createissue.error.components.required", "Component/s is required but project {0} has no components."),
        ("createissue.error.security.level.invalid", "Security level is invalid."),
        ("createissue.error.invalid.project", "You cannot create issues in project '{0}'."),
        ("createissue.error.summary.newlines", "The summary must be a single line."),
        ("createissue.noissuetype", "You must specify an issue type."),
        ("createissue.invalidissuetype", "The issue type selected is invalid."),
        ("createissue.subtasks.notsubtask", "Issue type {0} is a sub-task issue type but the issue is not a sub-task."),
        ("createissue.subtasks.issubtask", "Issue type {0} is not a sub-task issue type but the issue is a sub-task."),
        ("assign.error.invaliduser", "You must select a valid assignee."),
        ("assign.error.no.permission", "You do not have permission to assign issues."),
        ("assign.error.user.cannot.be.assigned", "User '{0}' cannot be assigned issues."),
        ("assign.error.issues.unassigned", "Issues must be assigned."),
        ("assign.error.user.does.not.exist", "User '{0}' does not exist."),
        ("assign.error.no.default.assignee", "No default assignee could be determined."),
        ("issue.field.components.noneselectedwithother", "You cannot select \"Unknown\" together with other components."),
        ("issue.field.components.not.valid.for.project", "Component {0} is not valid for this project."),
        ("issue.field.components.namenotset", "A new component must have a name."),
        ("issue.field.components.namenotunique", "A component with the name {0} already exists in this project."),
        ("issue.field.components.noadmin", "You do not have permission to create components."),
        ("issue.field.components.does.not.exist", "Component name '{0}' is not valid."),
        ("issue.field.versions.noneselectedwithother", "You cannot select \"Unknown\" together with other versions."),
        ("issue.field.versions.not.valid.for.project", "Version {0} is not valid for this project."),
        ("issue.field.versions.invalid.version.id", "Version name '{0}' is not valid."),
        ("issue.field.versions.noadmin", "You do not have permission to create versions."),
        ("issue.field.versions.namenotunique", "A version with the name {0} already exists in this project."),
        ("field.error.invalidresolution", "The resolution '{0}' is invalid."),
        ("field.error.excludedresolution", "The resolution '{0}' is not allowed for this transition."),
        ("comment.service.error.no.comment.id", "No comment id specified."),
        ("comment.service.error.invalid.comment.id", "Invalid comment id specified."),
        ("comment.service.error.body.empty", "Comment body can not be empty!"),
        ("comment.service.error.visibility", "You are not a member of the visibility group or role."),
        ("jira.properties.service.invalid.json", "Invalid JSON in comment properties: {0}"),
        ("worklog.service.error.timespent.required", "Time Spent is required."),
        ("worklog.service.error.invalid.time.duration", "Invalid time duration entered."),
        ("worklog.service.error.date.required", "Date started is required."),
        ("worklog.service.error.newestimate", "You must supply a valid new estimate."),
        ("worklog.service.error.adjustmentamount", "You must supply a valid amount of time to adjust the estimate by."),
        ("issuelinking.service.error.invalid.link.type", "No link type named '{0}' exists."),
        ("issuelinking.service.error.issue.does.not.exist", "Issue '{0}' does not exist."),
        ("issuelinking.service.error.self.link", "You cannot link an issue to itself."),
        ("issuelinking.service.error.disabled", "Issue linking is disabled."),
        ("worklog.service.error.invalid.date", "Invalid date entered: '{0}'."),
        ("customfield.error.out.of.scope", "Field {0} is not available for this project and issue type."),
        ("customfield.error.invalid.number", "'{0}' is an invalid number."),
        ("customfield.error.invalid.option", "Option '{0}' is not valid for this field."),
        ("customfield.error.single.option", "Only one option may be selected."),
        ("issue.field.issuekey", "Key"),
        ("issue.field.status", "Status"),
        ("issue.field.priority", "Priority"),
        ("issue.field.reporter", "Reporter"),
        ("issue.field.creator", "Creator"),
        ("issue.field.created", "Created"),
        ("issue.field.lastviewed", "Last Viewed"),
        ("issue.field.updated", "Updated"),
        ("issue.field.resolution.date", "Resolved"),
        ("issue.field.duedate", "Due Date"),
        ("issue.field.votes", "Votes"),
        ("issue.field.watch", "Watchers"),
        ("issue.field.thumbnail", "Images"),
        ("issue.field.timespent", "Time Spent"),
        ("issue.field.workratio", "Work Ratio"),
        ("issue.field.subtasks", "Sub-Tasks"),
        ("issue.field.attachment", "Attachments"),
        ("issue.field.progress", "Progress"),
        ("issue.field.aggregateprogress", "\u{3a3} Progress"),
        ("issue.field.aggregatetimespent", "\u{3a3} Time Spent"),
        ("issue.field.aggregateestimate", "\u{3a3} Remaining Estimate"),
        ("issue.field.aggregateoriginalestimate", "\u{3a3} Original Estimate"),
        ("issue.field.labels", "Labels"),
        ("issuelinking.error.no.permission", "You do not have permission to link issues."),
        ("comment.service.error.no.permission", "You do not have permission to comment on this issue."),
        ("comment.bulk.move.renderer.warning", "The comment renderers differ between the source and target layouts."),
        ("editissue.error.no.permission", "You do not have permission to edit issues in this project."),
        ("createissue.error.no.permission", "You do not have permission to create issues in this project."),
        ("worklog.error.no.permission", "You do not have permission to log work on this issue."),
        ("renderer.bulk.move.warning", "The issues use different renderers for {0}; the content may display differently after the move."),
    ])
});

/// English message bundle; unknown keys resolve to the key itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultI18n;

impl I18nHelper for DefaultI18n {
    fn text(&self, key: &str, args: &[&str]) -> String {
        let template = BUNDLE.get(key).copied().unwrap_or(key);
        substitute(template, args)
    }
}

/// Replace `{n}` placeholders with positional arguments.
#[must_use]
pub fn substitute(template: &str, args: &[&str]) -> String {
    let mut out = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        out = out.replace(&format!("{{{i}}}"), arg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_key_with_args() {
        let i18n = DefaultI18n;
        assert_eq!(
            i18n.text("assign.error.user.cannot.be.assigned", &["fred"]),
            "User 'fred' cannot be assigned issues."
        );
    }

    #[test]
    fn test_unknown_key_falls_back_to_key() {
        assert_eq!(DefaultI18n.text("no.such.key", &[]), "no.such.key");
    }

    #[test]
    fn test_substitute_repeated_placeholder() {
        assert_eq!(substitute("{0} and {0} and {1}", &["a", "b"]), "a and a and b");
    }
}

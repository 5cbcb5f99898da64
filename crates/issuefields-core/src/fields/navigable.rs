//! Fields that only appear as navigator columns: issue key, status, dates,
//! time tracking figures and the like.
//!
//! None of them can be placed on a screen, so they are never hidden by a
//! layout.

use crate::field::ids;
use crate::field::{Field, FieldTraits, NavigableField, SortOrder};
use crate::issue::Issue;
use crate::services::FieldServices;

/// Which navigable-only field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigableKind {
    IssueKey,
    Status,
    Priority,
    Reporter,
    Creator,
    Created,
    LastViewed,
    Updated,
    ResolutionDate,
    DueDate,
    Votes,
    Watches,
    Thumbnail,
    OriginalEstimate,
    RemainingEstimate,
    TimeSpent,
    WorkRatio,
    Subtasks,
    Attachment,
    Progress,
    AggregateProgress,
    AggregateTimeSpent,
    AggregateRemainingEstimate,
    AggregateOriginalEstimate,
    Labels,
}

impl NavigableKind {
    pub const ALL: [Self; 25] = [
        Self::IssueKey,
        Self::Status,
        Self::Priority,
        Self::Reporter,
        Self::Creator,
        Self::Created,
        Self::LastViewed,
        Self::Updated,
        Self::ResolutionDate,
        Self::DueDate,
        Self::Votes,
        Self::Watches,
        Self::Thumbnail,
        Self::OriginalEstimate,
        Self::RemainingEstimate,
        Self::TimeSpent,
        Self::WorkRatio,
        Self::Subtasks,
        Self::Attachment,
        Self::Progress,
        Self::AggregateProgress,
        Self::AggregateTimeSpent,
        Self::AggregateRemainingEstimate,
        Self::AggregateOriginalEstimate,
        Self::Labels,
    ];

    #[must_use]
    pub const fn field_id(self) -> &'static str {
        match self {
            Self::IssueKey => ids::ISSUE_KEY,
            Self::Status => ids::STATUS,
            Self::Priority => ids::PRIORITY,
            Self::Reporter => ids::REPORTER,
            Self::Creator => ids::CREATOR,
            Self::Created => ids::CREATED,
            Self::LastViewed => ids::LAST_VIEWED,
            Self::Updated => ids::UPDATED,
            Self::ResolutionDate => ids::RESOLUTION_DATE,
            Self::DueDate => ids::DUE_DATE,
            Self::Votes => ids::VOTES,
            Self::Watches => ids::WATCHES,
            Self::Thumbnail => ids::THUMBNAIL,
            Self::OriginalEstimate => ids::TIME_ORIGINAL_ESTIMATE,
            Self::RemainingEstimate => ids::TIME_ESTIMATE,
            Self::TimeSpent => ids::TIME_SPENT,
            Self::WorkRatio => ids::WORK_RATIO,
            Self::Subtasks => ids::SUBTASKS,
            Self::Attachment => ids::ATTACHMENT,
            Self::Progress => ids::PROGRESS,
            Self::AggregateProgress => ids::AGGREGATE_PROGRESS,
            Self::AggregateTimeSpent => ids::AGGREGATE_TIME_SPENT,
            Self::AggregateRemainingEstimate => ids::AGGREGATE_TIME_ESTIMATE,
            Self::AggregateOriginalEstimate => ids::AGGREGATE_TIME_ORIGINAL_ESTIMATE,
            Self::Labels => ids::LABELS,
        }
    }

    const fn name_key(self) -> &'static str {
        match self {
            Self::IssueKey => "issue.field.issuekey",
            Self::Status => "issue.field.status",
            Self::Priority => "issue.field.priority",
            Self::Reporter => "issue.field.reporter",
            Self::Creator => "issue.field.creator",
            Self::Created => "issue.field.created",
            Self::LastViewed => "issue.field.lastviewed",
            Self::Updated => "issue.field.updated",
            Self::ResolutionDate => "issue.field.resolution.date",
            Self::DueDate => "issue.field.duedate",
            Self::Votes => "issue.field.votes",
            Self::Watches => "issue.field.watch",
            Self::Thumbnail => "issue.field.thumbnail",
            Self::OriginalEstimate => "issue.field.originalestimate",
            Self::RemainingEstimate => "issue.field.remainingestimate",
            Self::TimeSpent => "issue.field.timespent",
            Self::WorkRatio => "issue.field.workratio",
            Self::Subtasks => "issue.field.subtasks",
            Self::Attachment => "issue.field.attachment",
            Self::Progress => "issue.field.progress",
            Self::AggregateProgress => "issue.field.aggregateprogress",
            Self::AggregateTimeSpent => "issue.field.aggregatetimespent",
            Self::AggregateRemainingEstimate => "issue.field.aggregateestimate",
            Self::AggregateOriginalEstimate => "issue.field.aggregateoriginalestimate",
            Self::Labels => "issue.field.labels",
        }
    }

    const fn sort_order(self) -> Option<SortOrder> {
        match self {
            Self::Created
            | Self::LastViewed
            | Self::Updated
            | Self::ResolutionDate
            | Self::Votes
            | Self::Watches
            | Self::Priority => Some(SortOrder::Desc),
            Self::Thumbnail | Self::Attachment => None,
            _ => Some(SortOrder::Asc),
        }
    }

    const fn searchable(self) -> bool {
        !matches!(
            self,
            Self::Thumbnail
                | Self::Subtasks
                | Self::Progress
                | Self::AggregateProgress
                | Self::AggregateTimeSpent
                | Self::AggregateRemainingEstimate
                | Self::AggregateOriginalEstimate
        )
    }
}

/// Time figures of an issue, optionally summed over its sub-tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TimeFigures {
    original: Option<i64>,
    remaining: Option<i64>,
    spent: Option<i64>,
}

impl TimeFigures {
    const fn of(issue: &Issue) -> Self {
        Self {
            original: issue.original_estimate,
            remaining: issue.estimate,
            spent: issue.time_spent,
        }
    }

    fn add(self, other: Self) -> Self {
        let sum = |a: Option<i64>, b: Option<i64>| match (a, b) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
        };
        Self {
            original: sum(self.original, other.original),
            remaining: sum(self.remaining, other.remaining),
            spent: sum(self.spent, other.spent),
        }
    }

    /// Percentage of work done against work left.
    fn progress(self) -> Option<i64> {
        let spent = self.spent.unwrap_or(0);
        let total = spent + self.remaining.unwrap_or(0);
        (total > 0).then(|| spent * 100 / total)
    }
}

#[derive(Debug)]
pub struct NavigableSystemField {
    kind: NavigableKind,
    services: FieldServices,
}

impl NavigableSystemField {
    #[must_use]
    pub const fn new(kind: NavigableKind, services: FieldServices) -> Self {
        Self { kind, services }
    }

    #[must_use]
    pub const fn kind(&self) -> NavigableKind {
        self.kind
    }

    fn aggregate(&self, issue: &Issue) -> TimeFigures {
        let own = TimeFigures::of(issue);
        issue
            .id
            .map(|id| self.services.issues.subtasks(id))
            .unwrap_or_default()
            .iter()
            .fold(own, |total, subtask| total.add(TimeFigures::of(subtask)))
    }

    fn duration(&self, millis: Option<i64>) -> Option<String> {
        self.services.durations().format_opt(millis)
    }
}

impl Field for NavigableSystemField {
    fn id(&self) -> &str {
        self.kind.field_id()
    }

    fn name_key(&self) -> &str {
        self.kind.name_key()
    }

    fn traits(&self) -> FieldTraits {
        FieldTraits {
            searchable: self.kind.searchable(),
            ..FieldTraits::default()
        }
    }

    fn as_navigable(&self) -> Option<&dyn NavigableField> {
        Some(self)
    }
}

impl NavigableField for NavigableSystemField {
    fn default_sort_order(&self) -> Option<SortOrder> {
        self.kind.sort_order()
    }

    fn column_value(&self, issue: &Issue) -> Option<String> {
        match self.kind {
            NavigableKind::IssueKey => issue.key.clone(),
            NavigableKind::Status => issue.status.clone(),
            NavigableKind::Reporter | NavigableKind::Creator => issue.reporter.as_ref().map(|u| u.display_name.clone()),
            NavigableKind::Created => Some(issue.created.to_rfc3339()),
            NavigableKind::Updated => Some(issue.updated.to_rfc3339()),
            NavigableKind::OriginalEstimate => self.duration(issue.original_estimate),
            NavigableKind::RemainingEstimate => self.duration(issue.estimate),
            NavigableKind::TimeSpent => self.duration(issue.time_spent),
            NavigableKind::WorkRatio => match (issue.time_spent, issue.original_estimate) {
                (_, Some(0) | None) => None,
                (spent, Some(original)) => Some(format!("{}%", spent.unwrap_or(0) * 100 / original)),
            },
            NavigableKind::Subtasks => {
                (!issue.subtask_ids.is_empty()).then(|| issue.subtask_ids.len().to_string())
            }
            NavigableKind::Progress => TimeFigures::of(issue).progress().map(|p| format!("{p}%")),
            NavigableKind::AggregateProgress => self.aggregate(issue).progress().map(|p| format!("{p}%")),
            NavigableKind::AggregateTimeSpent => self.duration(self.aggregate(issue).spent),
            NavigableKind::AggregateRemainingEstimate => self.duration(self.aggregate(issue).remaining),
            NavigableKind::AggregateOriginalEstimate => self.duration(self.aggregate(issue).original),
            NavigableKind::Priority
            | NavigableKind::LastViewed
            | NavigableKind::ResolutionDate
            | NavigableKind::DueDate
            | NavigableKind::Votes
            | NavigableKind::Watches
            | NavigableKind::Thumbnail
            | NavigableKind::Attachment
            | NavigableKind::Labels => None,
        }
    }
}

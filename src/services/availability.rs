use time::PrimitiveDateTime;

use crate::db::models::Assessment;
use crate::db::types::AssessmentStatus;

/// The fields of an assessment that decide whether it may be started.
#[derive(Debug, Clone)]
pub(crate) struct AssessmentWindow {
    pub(crate) is_active: bool,
    pub(crate) start_date: Option<PrimitiveDateTime>,
    pub(crate) end_date: Option<PrimitiveDateTime>,
    pub(crate) allow_multiple_attempts: bool,
}

impl AssessmentWindow {
    pub(crate) fn of(assessment: &Assessment) -> Self {
        Self {
            is_active: assessment.is_active && assessment.status == AssessmentStatus::Active,
            start_date: assessment.start_date,
            end_date: assessment.end_date,
            allow_multiple_attempts: assessment.allow_multiple_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Availability {
    Allowed,
    Inactive,
    NotYetOpen,
    Closed,
    AlreadyAttempted,
}

impl Availability {
    pub(crate) fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Inactive => "inactive",
            Self::NotYetOpen => "not_yet_open",
            Self::Closed => "closed",
            Self::AlreadyAttempted => "already_attempted",
        }
    }

    pub(crate) fn message(self) -> &'static str {
        match self {
            Self::Allowed => "Assessment is available",
            Self::Inactive => "This assessment is not currently active",
            Self::NotYetOpen => "This assessment has not started yet",
            Self::Closed => "This assessment has ended",
            Self::AlreadyAttempted => "You have already completed this assessment",
        }
    }
}

/// Single predicate shared by the detail view, start and submit.
pub(crate) fn can_start(
    window: &AssessmentWindow,
    now: PrimitiveDateTime,
    prior_attempts: i64,
) -> Availability {
    if !window.is_active {
        return Availability::Inactive;
    }
    if window.start_date.is_some_and(|start| now < start) {
        return Availability::NotYetOpen;
    }
    if window.end_date.is_some_and(|end| now > end) {
        return Availability::Closed;
    }
    if prior_attempts > 0 && !window.allow_multiple_attempts {
        return Availability::AlreadyAttempted;
    }
    Availability::Allowed
}

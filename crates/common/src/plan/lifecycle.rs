//! Plan status transitions and target-plan selection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Draft,
    Review,
    Active,
    Archived,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Review => "review",
            PlanStatus::Active => "active",
            PlanStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PlanStatus::Draft),
            "review" => Some(PlanStatus::Review),
            "active" => Some(PlanStatus::Active),
            "archived" => Some(PlanStatus::Archived),
            _ => None,
        }
    }

    /// Whether an explicit status change from `self` to `next` is allowed.
    ///
    /// Archived is terminal. Activation goes through its own path because it
    /// also archives siblings.
    pub fn can_transition_to(&self, next: PlanStatus) -> bool {
        match (self, next) {
            (PlanStatus::Archived, _) => false,
            (_, PlanStatus::Archived) => true,
            (PlanStatus::Draft, PlanStatus::Review) => true,
            (PlanStatus::Review, PlanStatus::Draft) => true,
            (from, PlanStatus::Active) => *from != PlanStatus::Active,
            _ => false,
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fields of a plan row that target selection looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanCandidate {
    pub id: Uuid,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSelection {
    pub target: Option<Uuid>,
    /// Extra active plans to archive as a repair
    pub to_archive: Vec<Uuid>,
}

/// Pick the plan that document data should be merged into.
///
/// The most recent active plan wins, otherwise the most recent draft. Any
/// other active plans are returned for archiving.
pub fn select_target_plan(candidates: &[PlanCandidate]) -> TargetSelection {
    let mut active: Vec<&PlanCandidate> = candidates
        .iter()
        .filter(|p| p.status == PlanStatus::Active)
        .collect();
    active.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if let Some((keep, rest)) = active.split_first() {
        return TargetSelection {
            target: Some(keep.id),
            to_archive: rest.iter().map(|p| p.id).collect(),
        };
    }

    let draft = candidates
        .iter()
        .filter(|p| p.status == PlanStatus::Draft)
        .max_by_key(|p| p.created_at);

    TargetSelection {
        target: draft.map(|p| p.id),
        to_archive: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn candidate(status: PlanStatus, age_days: i64) -> PlanCandidate {
        PlanCandidate {
            id: Uuid::new_v4(),
            status,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn test_single_active_wins_over_newer_draft() {
        let active = candidate(PlanStatus::Active, 10);
        let draft = candidate(PlanStatus::Draft, 1);
        let selection = select_target_plan(&[draft, active]);
        assert_eq!(selection.target, Some(active.id));
        assert!(selection.to_archive.is_empty());
    }

    #[test]
    fn test_most_recent_draft_without_active() {
        let old = candidate(PlanStatus::Draft, 5);
        let new = candidate(PlanStatus::Draft, 1);
        let archived = candidate(PlanStatus::Archived, 0);
        let selection = select_target_plan(&[old, new, archived]);
        assert_eq!(selection.target, Some(new.id));
    }

    #[test]
    fn test_multiple_active_are_repaired() {
        let older = candidate(PlanStatus::Active, 7);
        let newest = candidate(PlanStatus::Active, 2);
        let middle = candidate(PlanStatus::Active, 4);
        let selection = select_target_plan(&[older, newest, middle]);

        assert_eq!(selection.target, Some(newest.id));
        assert_eq!(selection.to_archive, vec![middle.id, older.id]);
    }

    #[test]
    fn test_no_candidate() {
        let selection = select_target_plan(&[candidate(PlanStatus::Review, 1)]);
        assert_eq!(selection, TargetSelection::default());
    }

    #[test]
    fn test_transitions() {
        assert!(PlanStatus::Draft.can_transition_to(PlanStatus::Review));
        assert!(PlanStatus::Active.can_transition_to(PlanStatus::Archived));
        assert!(!PlanStatus::Archived.can_transition_to(PlanStatus::Draft));
        assert!(!PlanStatus::Archived.can_transition_to(PlanStatus::Active));
        assert!(!PlanStatus::Active.can_transition_to(PlanStatus::Review));
        assert_eq!(PlanStatus::parse("review"), Some(PlanStatus::Review));
        assert_eq!(PlanStatus::parse("deleted"), None);
    }
}

use serde::{Deserialize, Serialize};

use crate::services::ServiceError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[serde(alias = "admin")]
    Admin,
    #[serde(alias = "teacher")]
    Teacher,
    #[default]
    #[serde(alias = "student")]
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PlayTypingGame,
    ViewLeaderboard,
    ViewWallet,
    PurchaseItem,
    CompleteLesson,
    SubmitHomework,
    ReviewHomework,
    MarkAttendance,
    ViewAttendance,
    ManageSeasons,
}

const EVERYONE: &[Role] = &[Role::Admin, Role::Teacher, Role::Student];
const STAFF: &[Role] = &[Role::Admin, Role::Teacher];

static POLICY: &[(Action, &[Role])] = &[
    (Action::PlayTypingGame, EVERYONE),
    (Action::ViewLeaderboard, EVERYONE),
    (Action::ViewWallet, EVERYONE),
    (Action::PurchaseItem, EVERYONE),
    (Action::CompleteLesson, EVERYONE),
    (Action::SubmitHomework, &[Role::Student]),
    (Action::ReviewHomework, STAFF),
    (Action::MarkAttendance, STAFF),
    (Action::ViewAttendance, STAFF),
    (Action::ManageSeasons, &[Role::Admin]),
];

pub fn is_allowed(role: Role, action: Action) -> bool {
    POLICY
        .iter()
        .find(|(candidate, _)| *candidate == action)
        .map(|(_, roles)| roles.contains(&role))
        .unwrap_or(false)
}

pub fn authorize(role: Role, action: Action) -> Result<(), ServiceError> {
    if is_allowed(role, action) {
        Ok(())
    } else {
        tracing::warn!(role = role.as_str(), ?action, "Access denied");
        Err(ServiceError::Forbidden(format!(
            "Role {} may not perform {:?}",
            role.as_str(),
            action
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: &[Action] = &[
        Action::PlayTypingGame,
        Action::ViewLeaderboard,
        Action::ViewWallet,
        Action::PurchaseItem,
        Action::CompleteLesson,
        Action::SubmitHomework,
        Action::ReviewHomework,
        Action::MarkAttendance,
        Action::ViewAttendance,
        Action::ManageSeasons,
    ];

    #[test]
    fn every_action_has_a_policy_row() {
        for action in ALL_ACTIONS {
            assert!(
                POLICY.iter().any(|(a, _)| a == action),
                "missing policy for {:?}",
                action
            );
        }
    }

    #[test]
    fn only_admins_manage_seasons() {
        assert!(is_allowed(Role::Admin, Action::ManageSeasons));
        assert!(!is_allowed(Role::Teacher, Action::ManageSeasons));
        assert!(!is_allowed(Role::Student, Action::ManageSeasons));
    }

    #[test]
    fn staff_review_and_mark_attendance() {
        for action in [Action::ReviewHomework, Action::MarkAttendance] {
            assert!(is_allowed(Role::Teacher, action));
            assert!(is_allowed(Role::Admin, action));
            assert!(!is_allowed(Role::Student, action));
        }
    }

    #[test]
    fn homework_submission_is_student_only() {
        assert!(is_allowed(Role::Student, Action::SubmitHomework));
        assert!(!is_allowed(Role::Teacher, Action::SubmitHomework));
    }

    #[test]
    fn authorize_returns_forbidden() {
        let err = authorize(Role::Student, Action::ManageSeasons).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[test]
    fn role_accepts_both_cases() {
        let upper: Role = serde_json::from_str("\"TEACHER\"").unwrap();
        let lower: Role = serde_json::from_str("\"teacher\"").unwrap();
        assert_eq!(upper, Role::Teacher);
        assert_eq!(lower, Role::Teacher);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
    }
}

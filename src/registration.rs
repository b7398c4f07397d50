//! Role-dependent account registration
//!
//! CEOs and superusers place new accounts in any group and department. An HOD
//! can only add employees to their own first department. Nobody else may
//! register accounts.

use crate::auth::{hash_password, Principal, Role};
use crate::error::{not_found_error, validation_error, ApiResult, AppError};
use crate::models::{Group, NewUser, User};
use crate::state::AppState;
use crate::validation::validate_username;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "First name must be at most 150 characters"))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Last name must be at most 150 characters"))]
    pub last_name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password1: String,
    pub password2: String,
    /// Honoured for CEO and superuser registrars; defaults to EMPLOYEE
    pub group: Option<Group>,
    /// Honoured for CEO and superuser registrars
    pub department_id: Option<i32>,
}

/// Where a new account lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub group: Group,
    pub department_id: Option<i32>,
    pub is_staff: bool,
}

/// Decide group, department and staff flag for an account `registrar` creates
pub fn plan(registrar: &Principal, request: &RegistrationRequest) -> ApiResult<Placement> {
    match registrar.role {
        Role::Superuser | Role::Ceo => {
            let group = request.group.unwrap_or(Group::Employee);
            Ok(Placement {
                group,
                department_id: request.department_id,
                is_staff: group.is_staff(),
            })
        }
        Role::Hod {
            department: Some(department),
        } => Ok(Placement {
            group: Group::Employee,
            department_id: Some(department),
            is_staff: false,
        }),
        Role::Hod { department: None } => Err(AppError::Forbidden(
            "A head of department without a department cannot register users".to_string(),
        )),
        Role::Employee { .. } | Role::Unassigned => Err(AppError::Forbidden(
            "Only a CEO, superuser or head of department can register users".to_string(),
        )),
    }
}

/// Validate, place and create the account
pub async fn register(state: &AppState, registrar: &Principal, request: RegistrationRequest) -> ApiResult<User> {
    let placement = plan(registrar, &request)?;
    request.validate()?;
    if request.password1 != request.password2 {
        return Err(validation_error("password2", "The two password fields didn't match"));
    }

    if let Some(department) = placement.department_id {
        state
            .store
            .get_department(department)
            .await?
            .ok_or_else(|| not_found_error(format!("Department {} not found", department)))?;
    }

    let user = state
        .store
        .create_user(NewUser {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password_hash: hash_password(&request.password1)?,
            first_name: request.first_name,
            last_name: request.last_name,
            is_superuser: false,
            is_staff: placement.is_staff,
            groups: vec![placement.group],
            department_ids: placement.department_id.into_iter().collect(),
            profile_picture: Some(state.users.default_profile_picture().to_string()),
        })
        .await?;

    info!(
        "{} registered {} as {} (department {:?})",
        registrar.user.username, user.username, placement.group, placement.department_id
    );
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use pretty_assertions::assert_eq;

    fn request(username: &str) -> RegistrationRequest {
        RegistrationRequest {
            username: username.to_string(),
            email: format!("{}@example.org", username),
            first_name: "Neema".to_string(),
            last_name: "Kweka".to_string(),
            password1: "karibu-sana-1".to_string(),
            password2: "karibu-sana-1".to_string(),
            group: Some(Group::Hod),
            department_id: None,
        }
    }

    #[tokio::test]
    async fn test_ceo_chooses_group_and_department() {
        let f = Fixture::new().await;
        let state = f.state();
        let user = register(
            &state,
            &f.ceo,
            RegistrationRequest {
                department_id: Some(f.finance.id),
                ..request("neema")
            },
        )
        .await
        .unwrap();

        assert_eq!(user.groups, vec![Group::Hod]);
        assert_eq!(user.department_ids, vec![f.finance.id]);
        assert!(user.is_staff);
        assert_eq!(
            user.profile_picture.as_deref(),
            Some(state.settings.media.default_profile_picture.as_str())
        );
    }

    #[tokio::test]
    async fn test_hod_registers_employees_in_own_department() {
        let f = Fixture::new().await;
        let state = f.state();
        let user = register(
            &state,
            &f.works_hod,
            RegistrationRequest {
                department_id: Some(f.finance.id),
                ..request("neema")
            },
        )
        .await
        .unwrap();

        assert_eq!(user.groups, vec![Group::Employee]);
        assert_eq!(user.department_ids, vec![f.works.id]);
        assert!(!user.is_staff);
    }

    #[tokio::test]
    async fn test_others_are_forbidden() {
        let f = Fixture::new().await;
        let state = f.state();
        for registrar in [&f.employee, &f.lone_hod] {
            let err = register(&state, registrar, request("neema")).await.unwrap_err();
            assert!(matches!(err, AppError::Forbidden(_)));
        }
        assert!(f.store.find_user_by_username("neema").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicates_and_mismatched_passwords() {
        let f = Fixture::new().await;
        let state = f.state();

        let err = register(&state, &f.admin, request(&f.employee.user.username.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = register(
            &state,
            &f.admin,
            RegistrationRequest {
                password2: "something-else".to_string(),
                ..request("neema")
            },
        )
        .await
        .unwrap_err();
        match err {
            AppError::Validation(fields) => assert!(fields.contains("password2")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}

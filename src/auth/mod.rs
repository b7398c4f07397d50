//! Authentication and authorization module
//!
//! Provides JWT-based authentication and the resolved role every request
//! carries through the handlers.

mod jwt;
mod middleware;
mod password;

pub use jwt::{create_tokens, decode_token, refresh_tokens, Claims, TokenPair, TokenType};
pub use middleware::auth_middleware;
pub use password::{hash_password, verify_password};

use crate::models::{Group, User};
use serde::Serialize;

/// Effective role of a user, resolved once per request.
///
/// Department-scoped roles carry the department they are scoped to; `None`
/// means the user has no affiliation and therefore sees nothing of the
/// department views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Role {
    Superuser,
    Ceo,
    Hod { department: Option<i32> },
    Employee { department: Option<i32> },
    /// Authenticated but member of no known group
    Unassigned,
}

impl Role {
    /// The superuser flag wins; otherwise the first of CEO, HOD, EMPLOYEE the
    /// user is a member of.
    pub fn resolve(user: &User) -> Role {
        if user.is_superuser {
            return Role::Superuser;
        }
        let department = user.primary_department();
        if user.in_group(Group::Ceo) {
            Role::Ceo
        } else if user.in_group(Group::Hod) {
            Role::Hod { department }
        } else if user.in_group(Group::Employee) {
            Role::Employee { department }
        } else {
            Role::Unassigned
        }
    }

    /// CEO and superuser see and act on everything
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Role::Superuser | Role::Ceo)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Superuser => write!(f, "superuser"),
            Role::Ceo => write!(f, "ceo"),
            Role::Hod { .. } => write!(f, "hod"),
            Role::Employee { .. } => write!(f, "employee"),
            Role::Unassigned => write!(f, "unassigned"),
        }
    }
}

/// The authenticated caller of a request
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub role: Role,
}

impl Principal {
    pub fn new(user: User) -> Self {
        let role = Role::resolve(&user);
        Self { user, role }
    }

    pub fn id(&self) -> i32 {
        self.user.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::user;

    #[test]
    fn test_superuser_flag_wins_over_groups() {
        let mut admin = user(1, "root", &[Group::Employee], &[3]);
        admin.is_superuser = true;
        assert_eq!(Role::resolve(&admin), Role::Superuser);
    }

    #[test]
    fn test_first_matching_group_in_precedence_order() {
        let both = user(2, "boss", &[Group::Employee, Group::Hod], &[7, 8]);
        assert_eq!(Role::resolve(&both), Role::Hod { department: Some(7) });

        let ceo = user(3, "ceo", &[Group::Hod, Group::Ceo], &[]);
        assert_eq!(Role::resolve(&ceo), Role::Ceo);
    }

    #[test]
    fn test_department_less_roles() {
        let hod = user(4, "hod", &[Group::Hod], &[]);
        assert_eq!(Role::resolve(&hod), Role::Hod { department: None });

        let nobody = user(5, "guest", &[], &[1]);
        assert_eq!(Role::resolve(&nobody), Role::Unassigned);
        assert!(!Role::resolve(&nobody).is_unrestricted());
    }
}

//! Role-scoped visibility
//!
//! Decides which complaints and users a principal may list, view or act on.
//! Everything an unauthorized caller is refused surfaces as NotFound so the
//! existence of a record does not leak.

use crate::auth::{Principal, Role};
use crate::error::{not_found_error, ApiResult};
use crate::models::{Complaint, ComplaintFilter, Remark, User};

/// Complaints the department view shows to `principal`
pub fn complaint_scope(principal: &Principal) -> ComplaintFilter {
    match principal.role {
        Role::Superuser | Role::Ceo => ComplaintFilter::All,
        Role::Hod {
            department: Some(department),
        } => ComplaintFilter::Department(department),
        Role::Hod { department: None } | Role::Employee { .. } | Role::Unassigned => {
            ComplaintFilter::Nothing
        }
    }
}

/// Complaints the personal view shows, whatever the role
pub fn personal_scope(principal: &Principal) -> ComplaintFilter {
    ComplaintFilter::Involving(principal.id())
}

fn targeted_by_remark(principal: &Principal, remarks: &[Remark]) -> bool {
    remarks
        .iter()
        .any(|r| r.targeted_personnel_id == principal.id())
}

pub fn can_view_complaint(principal: &Principal, complaint: &Complaint, remarks: &[Remark]) -> bool {
    principal.role.is_unrestricted()
        || complaint.complainant_id == principal.id()
        || complaint.targeted_personnel_id == principal.id()
        || targeted_by_remark(principal, remarks)
}

pub fn ensure_can_view(principal: &Principal, complaint: &Complaint, remarks: &[Remark]) -> ApiResult<()> {
    if can_view_complaint(principal, complaint, remarks) {
        Ok(())
    } else {
        Err(not_found_error(format!("Complaint {} not found", complaint.id)))
    }
}

/// Who may add a remark: targets of the complaint or its remarks and the HOD
/// of the department currently holding it. The complainant alone may not
/// respond to their own complaint unless they are also a target.
pub fn can_respond(principal: &Principal, complaint: &Complaint, remarks: &[Remark]) -> bool {
    let heads_department = matches!(
        principal.role,
        Role::Hod { department: Some(d) } if d == complaint.targeted_department_id
    );
    principal.role.is_unrestricted()
        || heads_department
        || complaint.targeted_personnel_id == principal.id()
        || targeted_by_remark(principal, remarks)
}

pub fn ensure_can_respond(principal: &Principal, complaint: &Complaint, remarks: &[Remark]) -> ApiResult<()> {
    if can_respond(principal, complaint, remarks) {
        Ok(())
    } else {
        Err(not_found_error(format!("Complaint {} not found", complaint.id)))
    }
}

/// Direct edits and deletion
pub fn can_edit_complaint(principal: &Principal, complaint: &Complaint) -> bool {
    principal.role.is_unrestricted() || complaint.complainant_id == principal.id()
}

/// Whether `principal` may look up `target`. Everyone may look themselves up.
pub fn can_view_user(principal: &Principal, target: &User) -> bool {
    if target.id == principal.id() {
        return true;
    }
    if target.is_superuser {
        return false;
    }
    match principal.role {
        Role::Superuser | Role::Ceo => true,
        Role::Hod {
            department: Some(department),
        } => target.shares_department(department),
        _ => false,
    }
}

/// Scope, search and order a user listing.
///
/// The requester comes first, then users by group rank and username.
/// Superusers are never listed, not even to themselves.
pub fn scope_users(principal: &Principal, users: Vec<User>, search: Option<&str>) -> Vec<User> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());

    let mut visible: Vec<User> = users
        .into_iter()
        .filter(|u| !u.is_superuser)
        .filter(|u| can_view_user(principal, u))
        .filter(|u| search.map_or(true, |needle| u.matches_search(needle)))
        .collect();

    let me = principal.id();
    visible.sort_by(|a, b| {
        (a.id != me)
            .cmp(&(b.id != me))
            .then(a.rank().cmp(&b.rank()))
            .then_with(|| a.username.cmp(&b.username))
    });
    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComplaintStatus, Group, RemarkAction};
    use crate::testing::user;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn principal(id: i32, name: &str, groups: &[Group], departments: &[i32]) -> Principal {
        Principal::new(user(id, name, groups, departments))
    }

    fn complaint(complainant: i32, personnel: i32, department: i32) -> Complaint {
        let now = Utc::now();
        Complaint {
            id: 1,
            title: "Late salary".to_string(),
            description: "March salary not received".to_string(),
            complainant_id: complainant,
            targeted_department_id: department,
            targeted_personnel_id: personnel,
            status: ComplaintStatus::Opened,
            attachment_ids: vec![],
            date_added: now,
            date_modified: now,
        }
    }

    fn remark_targeting(personnel: i32) -> Remark {
        Remark {
            id: 1,
            complaint_id: 1,
            respondent_id: 99,
            content: "over to you".to_string(),
            status: RemarkAction::Forwarded,
            targeted_department_id: 2,
            targeted_personnel_id: personnel,
            attachment_ids: vec![],
            date: Utc::now(),
        }
    }

    #[test]
    fn test_complaint_scope_per_role() {
        let mut root = user(1, "root", &[], &[]);
        root.is_superuser = true;
        assert_eq!(complaint_scope(&Principal::new(root)), ComplaintFilter::All);
        assert_eq!(complaint_scope(&principal(2, "ceo", &[Group::Ceo], &[])), ComplaintFilter::All);
        assert_eq!(
            complaint_scope(&principal(3, "hod", &[Group::Hod], &[5, 6])),
            ComplaintFilter::Department(5)
        );
        assert_eq!(
            complaint_scope(&principal(4, "lonely", &[Group::Hod], &[])),
            ComplaintFilter::Nothing
        );
        assert_eq!(
            complaint_scope(&principal(5, "emp", &[Group::Employee], &[5])),
            ComplaintFilter::Nothing
        );
        assert_eq!(complaint_scope(&principal(6, "guest", &[], &[])), ComplaintFilter::Nothing);
    }

    #[test]
    fn test_unrelated_user_cannot_view() {
        let c = complaint(10, 11, 1);
        let stranger = principal(12, "stranger", &[Group::Hod], &[1]);
        assert!(!can_view_complaint(&stranger, &c, &[]));
        assert!(ensure_can_view(&stranger, &c, &[]).is_err());

        assert!(can_view_complaint(&principal(10, "complainant", &[], &[]), &c, &[]));
        assert!(can_view_complaint(&principal(11, "target", &[Group::Employee], &[1]), &c, &[]));
        assert!(can_view_complaint(&stranger, &c, &[remark_targeting(12)]));
        assert!(can_view_complaint(&principal(13, "ceo", &[Group::Ceo], &[]), &c, &[]));
    }

    #[test]
    fn test_complainant_cannot_respond_to_own_complaint() {
        let c = complaint(10, 11, 1);
        assert!(!can_respond(&principal(10, "complainant", &[Group::Employee], &[1]), &c, &[]));
        assert!(can_respond(&principal(11, "target", &[Group::Employee], &[1]), &c, &[]));
        assert!(can_respond(&principal(12, "forwarded", &[], &[]), &c, &[remark_targeting(12)]));
        assert!(can_respond(&principal(14, "hod", &[Group::Hod], &[1]), &c, &[]));
        assert!(!can_respond(&principal(15, "other hod", &[Group::Hod], &[2]), &c, &[]));
        assert!(can_edit_complaint(&principal(10, "complainant", &[], &[]), &c));
        assert!(!can_edit_complaint(&principal(11, "target", &[], &[]), &c));
    }

    #[test]
    fn test_hod_without_department_sees_only_themself() {
        let lonely = principal(4, "lonely", &[Group::Hod], &[]);
        let users = vec![
            user(1, "alpha", &[Group::Employee], &[]),
            user(2, "beta", &[Group::Employee], &[3]),
            lonely.user.clone(),
        ];
        let visible = scope_users(&lonely, users, None);
        let ids: Vec<i32> = visible.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![4]);
    }

    #[test]
    fn test_user_list_order_and_search() {
        let mut root = user(9, "root", &[], &[]);
        root.is_superuser = true;
        let ceo = principal(1, "zawadi", &[Group::Ceo], &[]);
        let users = vec![
            root,
            user(2, "eliya", &[Group::Employee], &[1]),
            user(3, "baraka", &[Group::Hod], &[1]),
            user(4, "anna", &[Group::Employee], &[2]),
            user(5, "guest", &[], &[]),
            ceo.user.clone(),
            user(6, "mwita", &[Group::Ceo], &[]),
        ];

        let names: Vec<String> = scope_users(&ceo, users.clone(), None)
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["zawadi", "mwita", "baraka", "anna", "eliya", "guest"]);

        let hod = Principal::new(users[2].clone());
        let names: Vec<String> = scope_users(&hod, users.clone(), None)
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["baraka", "eliya"]);

        let names: Vec<String> = scope_users(&ceo, users, Some("AN"))
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["anna"]);
    }

    #[test]
    fn test_superuser_not_listed_to_themself() {
        let mut root = user(9, "root", &[], &[]);
        root.is_superuser = true;
        let admin = Principal::new(root.clone());
        let users = vec![root.clone(), user(2, "eliya", &[Group::Employee], &[1])];

        let names: Vec<String> = scope_users(&admin, users, None)
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["eliya"]);
        assert!(can_view_user(&admin, &root));
    }
}

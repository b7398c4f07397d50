//! Complaint routing engine
//!
//! Owns the complaint lifecycle: filing (always `Opened`), remark-driven
//! transitions, direct edits, and the department history written whenever the
//! status changes. The pure functions at the top decide *what* a save does;
//! the stores call them inside their transactions so the decision and the
//! writes are one atomic unit.

use crate::auth::Principal;
use crate::db::Store;
use crate::error::{not_found_error, validation_error, ApiResult, AppError, FieldErrors};
use crate::models::{
    Complaint, ComplaintChange, ComplaintStatus, DepartmentHistory, NewComplaint,
    NewDepartmentHistory, NewRemark, Remark, RemarkAction,
};
use crate::visibility;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const TITLE_MAX_LEN: usize = 200;

/// History row a save of `stored` with `change` must append, if any.
///
/// Only a status change produces a row; department-only changes do not. The
/// row records the department that owned the complaint when the transition
/// happened (the stored one) and the new status.
pub fn record_history_on_save(
    stored: &Complaint,
    change: &ComplaintChange,
) -> Option<NewDepartmentHistory> {
    match change.status {
        Some(status) if status != stored.status => Some(NewDepartmentHistory {
            complaint_id: stored.id,
            department_id: stored.targeted_department_id,
            status,
        }),
        _ => None,
    }
}

/// The complaint as it will look after `change` is saved
pub fn apply_change(stored: &Complaint, change: &ComplaintChange, now: DateTime<Utc>) -> Complaint {
    let mut next = stored.clone();
    if let Some(title) = &change.title {
        next.title = title.clone();
    }
    if let Some(description) = &change.description {
        next.description = description.clone();
    }
    if let Some(status) = change.status {
        next.status = status;
    }
    if let Some(department) = change.targeted_department_id {
        next.targeted_department_id = department;
    }
    if let Some(personnel) = change.targeted_personnel_id {
        next.targeted_personnel_id = personnel;
    }
    next.date_modified = now;
    next
}

/// Complaint change a new remark causes.
///
/// Forwarding moves the complaint to the remark's department and marks it
/// `Forwarded`. Closing leaves the complaint untouched; closure shows through
/// the remark ledger's latest status until someone saves the status directly.
pub fn route_remark(remark: &NewRemark) -> Option<ComplaintChange> {
    match remark.status {
        RemarkAction::Forwarded => Some(ComplaintChange {
            status: Some(ComplaintStatus::Forwarded),
            targeted_department_id: Some(remark.targeted_department_id),
            ..ComplaintChange::default()
        }),
        RemarkAction::Closed => None,
    }
}

/// Request to file a complaint. Any status the client sends is accepted by
/// the parser and then ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filing {
    pub title: String,
    pub description: String,
    pub targeted_department_id: i32,
    pub targeted_personnel_id: i32,
    #[serde(default)]
    pub attachment_ids: Vec<i32>,
    #[serde(default)]
    pub status: Option<ComplaintStatus>,
}

/// Direct edit of an existing complaint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Honoured for CEO and superuser only
    pub status: Option<ComplaintStatus>,
}

fn check_text(errors: &mut FieldErrors, field: &str, value: &str, max: Option<usize>) {
    if value.trim().is_empty() {
        errors.add(field, format!("{} is required", field));
    } else if let Some(max) = max {
        if value.chars().count() > max {
            errors.add(field, format!("{} must be at most {} characters", field, max));
        }
    }
}

#[derive(Clone)]
pub struct RoutingEngine {
    store: Arc<dyn Store>,
}

impl RoutingEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn ensure_department(&self, id: i32) -> ApiResult<()> {
        self.store
            .get_department(id)
            .await?
            .map(|_| ())
            .ok_or_else(|| not_found_error(format!("Department {} not found", id)))
    }

    async fn ensure_personnel(&self, id: i32) -> ApiResult<()> {
        self.store
            .get_user(id)
            .await?
            .map(|_| ())
            .ok_or_else(|| not_found_error(format!("User {} not found", id)))
    }

    /// File a new complaint on behalf of `complainant`
    pub async fn file(&self, complainant: &Principal, filing: Filing) -> ApiResult<Complaint> {
        let mut errors = FieldErrors::new();
        check_text(&mut errors, "title", &filing.title, Some(TITLE_MAX_LEN));
        check_text(&mut errors, "description", &filing.description, None);
        errors.into_result()?;

        if let Some(status) = filing.status.filter(|s| *s != ComplaintStatus::INITIAL) {
            debug!("Ignoring client-supplied status {} on filing", status);
        }

        self.ensure_department(filing.targeted_department_id).await?;
        self.ensure_personnel(filing.targeted_personnel_id).await?;

        let complaint = self
            .store
            .insert_complaint(NewComplaint {
                title: filing.title.trim().to_string(),
                description: filing.description,
                complainant_id: complainant.id(),
                targeted_department_id: filing.targeted_department_id,
                targeted_personnel_id: filing.targeted_personnel_id,
                attachment_ids: filing.attachment_ids,
            })
            .await?;

        info!(
            "Complaint {} filed by {} against department {}",
            complaint.id, complainant.user.username, complaint.targeted_department_id
        );
        Ok(complaint)
    }

    /// Apply a remark to its complaint: checks every reference, then lets the
    /// store write the routed complaint change, its history row and the remark
    /// in one transaction.
    pub async fn apply_remark(&self, remark: NewRemark) -> ApiResult<(Remark, Complaint)> {
        self.store
            .get_complaint(remark.complaint_id)
            .await?
            .ok_or_else(|| not_found_error(format!("Complaint {} not found", remark.complaint_id)))?;
        self.ensure_department(remark.targeted_department_id).await?;
        self.ensure_personnel(remark.targeted_personnel_id).await?;

        let routed = route_remark(&remark);
        let (remark, complaint) = self.store.insert_remark(remark, routed).await?;

        info!(
            "Remark {} ({}) applied to complaint {}: status {}, department {}",
            remark.id, remark.status, complaint.id, complaint.status, complaint.targeted_department_id
        );
        Ok((remark, complaint))
    }

    /// Direct edit by the complainant, a CEO or a superuser
    pub async fn edit(&self, editor: &Principal, id: i32, edit: ComplaintEdit) -> ApiResult<Complaint> {
        let complaint = self.load(id).await?;
        if !visibility::can_edit_complaint(editor, &complaint) {
            return Err(not_found_error(format!("Complaint {} not found", id)));
        }

        let mut errors = FieldErrors::new();
        if let Some(title) = &edit.title {
            check_text(&mut errors, "title", title, Some(TITLE_MAX_LEN));
        }
        if let Some(description) = &edit.description {
            check_text(&mut errors, "description", description, None);
        }
        errors.into_result()?;

        let status = if editor.role.is_unrestricted() {
            edit.status
        } else {
            None
        };

        let change = ComplaintChange {
            title: edit.title.map(|t| t.trim().to_string()),
            description: edit.description,
            status,
            ..ComplaintChange::default()
        };
        if change.is_empty() {
            return Err(validation_error("complaint", "Nothing to update"));
        }

        let saved = self.store.save_complaint(id, change).await?;
        info!("Complaint {} edited by {}", id, editor.user.username);
        Ok(saved)
    }

    /// Authorized deletion; cascades to remarks, history and attachment links
    pub async fn delete(&self, requester: &Principal, id: i32) -> ApiResult<()> {
        let complaint = self.load(id).await?;
        if !visibility::can_edit_complaint(requester, &complaint) {
            return Err(not_found_error(format!("Complaint {} not found", id)));
        }
        self.store.delete_complaint(id).await?;
        info!("Complaint {} deleted by {}", id, requester.user.username);
        Ok(())
    }

    /// Department history of a complaint the requester may view
    pub async fn history(&self, requester: &Principal, id: i32) -> ApiResult<Vec<DepartmentHistory>> {
        let complaint = self.load(id).await?;
        let remarks = self.store.list_remarks(id).await?;
        visibility::ensure_can_view(requester, &complaint, &remarks)?;
        self.store.department_history(id).await
    }

    async fn load(&self, id: i32) -> ApiResult<Complaint> {
        self.store
            .get_complaint(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Complaint {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use pretty_assertions::assert_eq;

    fn filing(f: &Fixture) -> Filing {
        Filing {
            title: "Broken water pump".to_string(),
            description: "The pump at block C has been leaking for a week".to_string(),
            targeted_department_id: f.works.id,
            targeted_personnel_id: f.works_staff.id(),
            attachment_ids: vec![],
            status: None,
        }
    }

    fn forward(complaint: &Complaint, by: &Principal, department: i32, personnel: i32) -> NewRemark {
        NewRemark {
            complaint_id: complaint.id,
            respondent_id: by.id(),
            content: "Passing this on".to_string(),
            status: RemarkAction::Forwarded,
            targeted_department_id: department,
            targeted_personnel_id: personnel,
            attachment_ids: vec![],
        }
    }

    #[tokio::test]
    async fn test_file_forces_opened_status() {
        let f = Fixture::new().await;
        for requested in [None, Some(ComplaintStatus::Closed), Some(ComplaintStatus::Forwarded)] {
            let complaint = f
                .routing
                .file(&f.employee, Filing { status: requested, ..filing(&f) })
                .await
                .unwrap();
            assert_eq!(complaint.status, ComplaintStatus::Opened);
            let stored = f.store.get_complaint(complaint.id).await.unwrap().unwrap();
            assert_eq!(stored.status, ComplaintStatus::Opened);
        }
    }

    #[tokio::test]
    async fn test_file_rejects_empty_fields() {
        let f = Fixture::new().await;
        let err = f
            .routing
            .file(
                &f.employee,
                Filing {
                    title: "   ".to_string(),
                    description: String::new(),
                    ..filing(&f)
                },
            )
            .await
            .unwrap_err();
        match err {
            AppError::Validation(fields) => {
                assert!(fields.contains("title"));
                assert!(fields.contains("description"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(f.store.list_complaints(crate::models::ComplaintFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_rejects_unknown_references() {
        let f = Fixture::new().await;
        let err = f
            .routing
            .file(&f.employee, Filing { targeted_department_id: 999, ..filing(&f) })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = f
            .routing
            .file(&f.employee, Filing { targeted_personnel_id: 999, ..filing(&f) })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_forwarded_remark_moves_complaint_and_records_history() {
        let f = Fixture::new().await;
        let complaint = f.routing.file(&f.employee, filing(&f)).await.unwrap();

        let (remark, routed) = f
            .routing
            .apply_remark(forward(&complaint, &f.works_staff, f.finance.id, f.finance_hod.id()))
            .await
            .unwrap();

        assert_eq!(remark.status, RemarkAction::Forwarded);
        assert_eq!(routed.status, ComplaintStatus::Forwarded);
        assert_eq!(routed.targeted_department_id, f.finance.id);
        // personnel on the complaint itself stays as filed
        assert_eq!(routed.targeted_personnel_id, f.works_staff.id());

        let history = f.store.department_history(complaint.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].department_id, f.works.id);
        assert_eq!(history[0].status, ComplaintStatus::Forwarded);
    }

    #[tokio::test]
    async fn test_closed_remark_leaves_complaint_untouched() {
        let f = Fixture::new().await;
        let complaint = f.routing.file(&f.employee, filing(&f)).await.unwrap();

        let closing = NewRemark {
            status: RemarkAction::Closed,
            ..forward(&complaint, &f.works_staff, f.finance.id, f.finance_hod.id())
        };
        let (_, after) = f.routing.apply_remark(closing).await.unwrap();

        assert_eq!(after.targeted_department_id, f.works.id);
        assert_eq!(after.status, ComplaintStatus::Opened);
        assert!(f.store.department_history(complaint.id).await.unwrap().is_empty());
        assert_eq!(f.store.list_remarks(complaint.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_forward_does_not_add_history() {
        let f = Fixture::new().await;
        let complaint = f.routing.file(&f.employee, filing(&f)).await.unwrap();

        f.routing
            .apply_remark(forward(&complaint, &f.works_staff, f.finance.id, f.finance_hod.id()))
            .await
            .unwrap();
        let (_, after) = f
            .routing
            .apply_remark(forward(&complaint, &f.finance_hod, f.works.id, f.works_staff.id()))
            .await
            .unwrap();

        // Forwarded -> Forwarded is a department change only
        assert_eq!(after.targeted_department_id, f.works.id);
        assert_eq!(f.store.department_history(complaint.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remark_with_unknown_reference_has_no_side_effects() {
        let f = Fixture::new().await;
        let complaint = f.routing.file(&f.employee, filing(&f)).await.unwrap();

        let err = f
            .routing
            .apply_remark(forward(&complaint, &f.works_staff, 999, f.finance_hod.id()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = f
            .routing
            .apply_remark(NewRemark {
                attachment_ids: vec![12345],
                ..forward(&complaint, &f.works_staff, f.finance.id, f.finance_hod.id())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let stored = f.store.get_complaint(complaint.id).await.unwrap().unwrap();
        assert_eq!(stored, complaint);
        assert!(f.store.list_remarks(complaint.id).await.unwrap().is_empty());
        assert!(f.store.department_history(complaint.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remark_on_missing_complaint_is_not_found() {
        let f = Fixture::new().await;
        let complaint = f.routing.file(&f.employee, filing(&f)).await.unwrap();
        let remark = forward(&complaint, &f.works_staff, f.finance.id, f.finance_hod.id());
        f.store.delete_complaint(complaint.id).await.unwrap();

        let err = f.routing.apply_remark(remark).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_status_save_records_one_row_department_save_none() {
        let f = Fixture::new().await;
        let complaint = f.routing.file(&f.employee, filing(&f)).await.unwrap();

        f.store
            .save_complaint(
                complaint.id,
                ComplaintChange {
                    targeted_department_id: Some(f.finance.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(f.store.department_history(complaint.id).await.unwrap().is_empty());

        let closed = f
            .routing
            .edit(
                &f.ceo,
                complaint.id,
                ComplaintEdit {
                    status: Some(ComplaintStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(closed.status, ComplaintStatus::Closed);

        let history = f.store.department_history(complaint.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].department_id, f.finance.id);
        assert_eq!(history[0].status, ComplaintStatus::Closed);

        // same status again: no new row
        f.store
            .save_complaint(
                complaint.id,
                ComplaintChange {
                    status: Some(ComplaintStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(f.store.department_history(complaint.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_complainant_edit_ignores_status() {
        let f = Fixture::new().await;
        let complaint = f.routing.file(&f.employee, filing(&f)).await.unwrap();

        let edited = f
            .routing
            .edit(
                &f.employee,
                complaint.id,
                ComplaintEdit {
                    title: Some("Water pump still broken".to_string()),
                    description: None,
                    status: Some(ComplaintStatus::Closed),
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.title, "Water pump still broken");
        assert_eq!(edited.status, ComplaintStatus::Opened);
        assert!(f.store.department_history(complaint.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_and_delete_by_outsider_are_not_found() {
        let f = Fixture::new().await;
        let complaint = f.routing.file(&f.employee, filing(&f)).await.unwrap();

        let err = f
            .routing
            .edit(
                &f.outsider,
                complaint.id,
                ComplaintEdit {
                    title: Some("hijacked".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = f.routing.delete(&f.outsider, complaint.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        f.routing.delete(&f.employee, complaint.id).await.unwrap();
        assert!(f.store.get_complaint(complaint.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_remarks_and_history() {
        let f = Fixture::new().await;
        let complaint = f.routing.file(&f.employee, filing(&f)).await.unwrap();
        let (remark, _) = f
            .routing
            .apply_remark(forward(&complaint, &f.works_staff, f.finance.id, f.finance_hod.id()))
            .await
            .unwrap();

        f.routing.delete(&f.ceo, complaint.id).await.unwrap();

        assert!(f.store.get_remark(remark.id).await.unwrap().is_none());
        assert!(f.store.department_history(complaint.id).await.unwrap().is_empty());
    }

    #[test]
    fn test_record_history_on_save_is_pure_status_comparison() {
        let now = Utc::now();
        let stored = Complaint {
            id: 1,
            title: "t".to_string(),
            description: "d".to_string(),
            complainant_id: 1,
            targeted_department_id: 10,
            targeted_personnel_id: 2,
            status: ComplaintStatus::Opened,
            attachment_ids: vec![],
            date_added: now,
            date_modified: now,
        };

        assert_eq!(record_history_on_save(&stored, &ComplaintChange::default()), None);
        let same = ComplaintChange {
            status: Some(ComplaintStatus::Opened),
            targeted_department_id: Some(11),
            ..Default::default()
        };
        assert_eq!(record_history_on_save(&stored, &same), None);

        let forwarded = ComplaintChange {
            status: Some(ComplaintStatus::Forwarded),
            targeted_department_id: Some(11),
            ..Default::default()
        };
        assert_eq!(
            record_history_on_save(&stored, &forwarded),
            Some(NewDepartmentHistory {
                complaint_id: 1,
                department_id: 10,
                status: ComplaintStatus::Forwarded,
            })
        );

        let next = apply_change(&stored, &forwarded, now);
        assert_eq!(next.targeted_department_id, 11);
        assert_eq!(next.status, ComplaintStatus::Forwarded);
    }
}

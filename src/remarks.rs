//! Remark ledger
//!
//! Remarks are append-only. The only edit is the respondent changing the text
//! or the attached files of their own remark; routing fields are fixed once a
//! remark is accepted.

use crate::auth::Principal;
use crate::db::Store;
use crate::error::{not_found_error, validation_error, ApiResult};
use crate::models::{Complaint, ComplaintStatus, NewRemark, Remark, RemarkAction, RemarkEdit};
use crate::routing::RoutingEngine;
use crate::visibility;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Request to add a remark. `status` is parsed as a full complaint status so
/// an `Opened` remark is reported as a validation error instead of a decoding
/// failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemarkRequest {
    pub content: String,
    pub status: ComplaintStatus,
    pub targeted_department_id: i32,
    pub targeted_personnel_id: i32,
    #[serde(default)]
    pub attachment_ids: Vec<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemarkUpdate {
    pub content: Option<String>,
    pub attachment_ids: Option<Vec<i32>>,
}

/// Status a complaint shows once its remarks are taken into account: the last
/// remark's, or the complaint's own when nobody has responded.
pub fn latest_status(complaint: &Complaint, remarks: &[Remark]) -> ComplaintStatus {
    remarks
        .last()
        .map(|r| r.status.status())
        .unwrap_or(complaint.status)
}

#[derive(Clone)]
pub struct RemarkLedger {
    store: Arc<dyn Store>,
    routing: RoutingEngine,
}

impl RemarkLedger {
    pub fn new(store: Arc<dyn Store>, routing: RoutingEngine) -> Self {
        Self { store, routing }
    }

    async fn load_complaint(&self, id: i32) -> ApiResult<Complaint> {
        self.store
            .get_complaint(id)
            .await?
            .ok_or_else(|| not_found_error(format!("Complaint {} not found", id)))
    }

    /// Add a remark on behalf of `respondent` and route the complaint
    pub async fn add(
        &self,
        respondent: &Principal,
        complaint_id: i32,
        request: RemarkRequest,
    ) -> ApiResult<(Remark, Complaint)> {
        if request.content.trim().is_empty() {
            return Err(validation_error("content", "content is required"));
        }
        let action = RemarkAction::try_from(request.status)
            .map_err(|_| validation_error("status", "A remark must forward or close the complaint"))?;

        let complaint = self.load_complaint(complaint_id).await?;
        let remarks = self.store.list_remarks(complaint_id).await?;
        visibility::ensure_can_respond(respondent, &complaint, &remarks)?;

        self.routing
            .apply_remark(NewRemark {
                complaint_id,
                respondent_id: respondent.id(),
                content: request.content,
                status: action,
                targeted_department_id: request.targeted_department_id,
                targeted_personnel_id: request.targeted_personnel_id,
                attachment_ids: request.attachment_ids,
            })
            .await
    }

    /// Edit content or attachments of a remark the caller wrote
    pub async fn update(&self, respondent: &Principal, remark_id: i32, update: RemarkUpdate) -> ApiResult<Remark> {
        let remark = self
            .store
            .get_remark(remark_id)
            .await?
            .filter(|r| r.respondent_id == respondent.id())
            .ok_or_else(|| not_found_error(format!("Remark {} not found", remark_id)))?;

        if let Some(content) = &update.content {
            if content.trim().is_empty() {
                return Err(validation_error("content", "content is required"));
            }
        }
        if update.content.is_none() && update.attachment_ids.is_none() {
            return Err(validation_error("remark", "Nothing to update"));
        }

        let updated = self
            .store
            .update_remark(
                remark.id,
                RemarkEdit {
                    content: update.content,
                    attachment_ids: update.attachment_ids,
                },
            )
            .await?;
        info!("Remark {} updated by {}", remark.id, respondent.user.username);
        Ok(updated)
    }

    /// Remarks of a complaint the caller may view, in creation order
    pub async fn list(&self, viewer: &Principal, complaint_id: i32) -> ApiResult<(Complaint, Vec<Remark>)> {
        let complaint = self.load_complaint(complaint_id).await?;
        let remarks = self.store.list_remarks(complaint_id).await?;
        visibility::ensure_can_view(viewer, &complaint, &remarks)?;
        Ok((complaint, remarks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::routing::Filing;
    use crate::testing::Fixture;
    use pretty_assertions::assert_eq;

    async fn filed(f: &Fixture) -> Complaint {
        f.routing
            .file(
                &f.employee,
                Filing {
                    title: "Unpaid overtime".to_string(),
                    description: "Overtime from May is missing".to_string(),
                    targeted_department_id: f.works.id,
                    targeted_personnel_id: f.works_staff.id(),
                    attachment_ids: vec![],
                    status: None,
                },
            )
            .await
            .unwrap()
    }

    fn request(f: &Fixture, status: ComplaintStatus) -> RemarkRequest {
        RemarkRequest {
            content: "Sent to finance".to_string(),
            status,
            targeted_department_id: f.finance.id,
            targeted_personnel_id: f.finance_hod.id(),
            attachment_ids: vec![],
        }
    }

    #[tokio::test]
    async fn test_opened_remark_is_rejected() {
        let f = Fixture::new().await;
        let complaint = filed(&f).await;
        let err = f
            .remarks
            .add(&f.works_staff, complaint.id, request(&f, ComplaintStatus::Opened))
            .await
            .unwrap_err();
        match err {
            AppError::Validation(fields) => assert!(fields.contains("status")),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(f.store.list_remarks(complaint.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected() {
        let f = Fixture::new().await;
        let complaint = filed(&f).await;
        let err = f
            .remarks
            .add(
                &f.works_staff,
                complaint.id,
                RemarkRequest {
                    content: "  ".to_string(),
                    ..request(&f, ComplaintStatus::Forwarded)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unauthorized_respondent_gets_not_found() {
        let f = Fixture::new().await;
        let complaint = filed(&f).await;

        for outsider in [&f.outsider, &f.employee, &f.finance_hod, &f.lone_hod] {
            let err = f
                .remarks
                .add(outsider, complaint.id, request(&f, ComplaintStatus::Forwarded))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)));
        }
        let stored = f.store.get_complaint(complaint.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ComplaintStatus::Opened);
    }

    #[tokio::test]
    async fn test_hod_of_holding_department_can_respond() {
        let f = Fixture::new().await;
        let complaint = filed(&f).await;

        let (_, routed) = f
            .remarks
            .add(&f.works_hod, complaint.id, request(&f, ComplaintStatus::Forwarded))
            .await
            .unwrap();
        assert_eq!(routed.targeted_department_id, f.finance.id);

        // finance holds it now, works no longer does and was never targeted
        let err = f
            .remarks
            .add(&f.works_hod, complaint.id, request(&f, ComplaintStatus::Closed))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_forward_then_new_target_can_respond() {
        let f = Fixture::new().await;
        let complaint = filed(&f).await;

        let (first, routed) = f
            .remarks
            .add(&f.works_staff, complaint.id, request(&f, ComplaintStatus::Forwarded))
            .await
            .unwrap();
        assert_eq!(routed.status, ComplaintStatus::Forwarded);
        assert_eq!(routed.targeted_department_id, f.finance.id);

        let (second, _) = f
            .remarks
            .add(
                &f.finance_hod,
                complaint.id,
                RemarkRequest {
                    content: "Paid in June payroll".to_string(),
                    ..request(&f, ComplaintStatus::Closed)
                },
            )
            .await
            .unwrap();

        let (_, remarks) = f.remarks.list(&f.employee, complaint.id).await.unwrap();
        let ids: Vec<i32> = remarks.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);

        let stored = f.store.get_complaint(complaint.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ComplaintStatus::Forwarded);
        assert_eq!(latest_status(&stored, &remarks), ComplaintStatus::Closed);
    }

    #[tokio::test]
    async fn test_latest_status_without_remarks_is_complaint_status() {
        let f = Fixture::new().await;
        let complaint = filed(&f).await;
        let (_, remarks) = f.remarks.list(&f.ceo, complaint.id).await.unwrap();
        assert!(remarks.is_empty());
        assert_eq!(latest_status(&complaint, &remarks), ComplaintStatus::Opened);
    }

    #[tokio::test]
    async fn test_only_respondent_may_update() {
        let f = Fixture::new().await;
        let complaint = filed(&f).await;
        let (remark, _) = f
            .remarks
            .add(&f.works_staff, complaint.id, request(&f, ComplaintStatus::Forwarded))
            .await
            .unwrap();

        let edit = RemarkUpdate {
            content: Some("Sent to finance, ref 2291".to_string()),
            attachment_ids: None,
        };
        let err = f.remarks.update(&f.ceo, remark.id, edit.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let updated = f.remarks.update(&f.works_staff, remark.id, edit).await.unwrap();
        assert_eq!(updated.content, "Sent to finance, ref 2291");
        assert_eq!(updated.status, remark.status);
        assert_eq!(updated.targeted_department_id, remark.targeted_department_id);
    }

    #[tokio::test]
    async fn test_unrelated_user_cannot_list_remarks() {
        let f = Fixture::new().await;
        let complaint = filed(&f).await;
        let err = f.remarks.list(&f.outsider, complaint.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

//! PostgreSQL store
//!
//! Every multi-table write runs in one transaction. Saves lock the complaint
//! row first (`SELECT ... FOR UPDATE`) so concurrent remarks on the same
//! complaint are serialized and no reader sees a status change without its
//! history row.

use crate::db::{queries, Store};
use crate::error::{map_write_error, not_found_error, ApiResult, AppError};
use crate::models::{
    Attachment, AttachmentKind, Complaint, ComplaintChange, ComplaintFilter, ComplaintStatus,
    Department, DepartmentHistory, Group, NewAttachment, NewComplaint, NewDepartment, NewRemark,
    NewUser, ProfileUpdate, Remark, RemarkAction, RemarkEdit, User,
};
use crate::routing::{apply_change, record_history_on_save};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Pool, Transaction};
use postgres_types::ToSql;
use std::str::FromStr;
use tokio_postgres::Row;
use tracing::debug;

pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// Parse a textual enum column; a value outside the CHECK constraint means the
/// table was written by something else.
fn parse_column<T: FromStr<Err = String>>(value: &str) -> ApiResult<T> {
    value.parse::<T>().map_err(AppError::Internal)
}

fn department_from_row(row: &Row) -> Department {
    Department {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
    }
}

fn user_from_row(row: &Row) -> ApiResult<User> {
    let groups: Vec<String> = row.get("groups");
    let groups = groups
        .iter()
        .map(|g| parse_column::<Group>(g))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        is_superuser: row.get("is_superuser"),
        is_staff: row.get("is_staff"),
        groups,
        department_ids: row.get("department_ids"),
        phone_number: row.get("phone_number"),
        region: row.get("region"),
        district: row.get("district"),
        profile_picture: row.get("profile_picture"),
        date_joined: row.get("date_joined"),
    })
}

fn complaint_from_row(row: &Row) -> ApiResult<Complaint> {
    Ok(Complaint {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        complainant_id: row.get("complainant_id"),
        targeted_department_id: row.get("targeted_department_id"),
        targeted_personnel_id: row.get("targeted_personnel_id"),
        status: parse_column(row.get::<_, &str>("status"))?,
        attachment_ids: row.get("attachment_ids"),
        date_added: row.get("date_added"),
        date_modified: row.get("date_modified"),
    })
}

fn remark_from_row(row: &Row) -> ApiResult<Remark> {
    let status: ComplaintStatus = parse_column(row.get::<_, &str>("status"))?;
    let status = RemarkAction::try_from(status)
        .map_err(|s| AppError::Internal(format!("Remark stored with status {}", s)))?;

    Ok(Remark {
        id: row.get("id"),
        complaint_id: row.get("complaint_id"),
        respondent_id: row.get("respondent_id"),
        content: row.get("content"),
        status,
        targeted_department_id: row.get("targeted_department_id"),
        targeted_personnel_id: row.get("targeted_personnel_id"),
        attachment_ids: row.get("attachment_ids"),
        date: row.get("date"),
    })
}

fn history_from_row(row: &Row) -> ApiResult<DepartmentHistory> {
    Ok(DepartmentHistory {
        id: row.get("id"),
        complaint_id: row.get("complaint_id"),
        department_id: row.get("department_id"),
        status: parse_column(row.get::<_, &str>("status"))?,
        recorded_at: row.get("recorded_at"),
    })
}

fn attachment_from_row(row: &Row) -> ApiResult<Attachment> {
    Ok(Attachment {
        id: row.get("id"),
        kind: parse_column::<AttachmentKind>(row.get::<_, &str>("kind"))?,
        url: row.get("url"),
        file_name: row.get("file_name"),
        content_type: row.get("content_type"),
        size_bytes: row.get("size_bytes"),
        sha256: row.get("sha256"),
        uploaded_by: row.get("uploaded_by"),
        uploaded_at: row.get("uploaded_at"),
    })
}

/// Shared save path, run inside the caller's transaction
/// Only the uploader may link a file; anything else reads as missing
async fn require_own_attachments(tx: &Transaction<'_>, ids: &[i32], owner: i32) -> ApiResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    match tx.query_opt(queries::FOREIGN_ATTACHMENT, &[&ids, &owner]).await? {
        Some(row) => {
            let id: i32 = row.get("id");
            Err(not_found_error(format!("Attachment {} not found", id)))
        }
        None => Ok(()),
    }
}

async fn save_in(tx: &Transaction<'_>, id: i32, change: &ComplaintChange) -> ApiResult<Complaint> {
    if tx.query_opt(queries::LOCK_COMPLAINT, &[&id]).await?.is_none() {
        return Err(AppError::Integrity(format!("Complaint {} disappeared during save", id)));
    }
    let stored = complaint_from_row(&tx.query_one(queries::GET_COMPLAINT, &[&id]).await?)?;

    if let Some(row) = record_history_on_save(&stored, change) {
        debug!(
            "Complaint {} leaving {} for status {}",
            row.complaint_id, row.department_id, row.status
        );
        tx.execute(
            queries::INSERT_HISTORY,
            &[&row.complaint_id, &row.department_id, &row.status.as_str()],
        )
        .await
        .map_err(|e| map_write_error(e, "Department history"))?;
    }

    let next = apply_change(&stored, change, Utc::now());
    tx.execute(
        queries::UPDATE_COMPLAINT,
        &[
            &id,
            &next.title,
            &next.description,
            &next.status.as_str(),
            &next.targeted_department_id,
            &next.targeted_personnel_id,
            &next.date_modified,
        ],
    )
    .await
    .map_err(|e| map_write_error(e, "Complaint"))?;

    Ok(next)
}

#[async_trait]
impl Store for PgStore {
    async fn create_department(&self, new: NewDepartment) -> ApiResult<Department> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(queries::INSERT_DEPARTMENT, &[&new.name, &new.description])
            .await
            .map_err(|e| map_write_error(e, "Department"))?;
        Ok(department_from_row(&row))
    }

    async fn get_department(&self, id: i32) -> ApiResult<Option<Department>> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::GET_DEPARTMENT, &[&id]).await?;
        Ok(row.as_ref().map(department_from_row))
    }

    async fn list_departments(&self) -> ApiResult<Vec<Department>> {
        let client = self.pool.get().await?;
        let rows = client.query(queries::LIST_DEPARTMENTS, &[]).await?;
        Ok(rows.iter().map(department_from_row).collect())
    }

    async fn create_user(&self, new: NewUser) -> ApiResult<User> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_one(
                queries::INSERT_USER,
                &[
                    &new.username,
                    &new.email,
                    &new.password_hash,
                    &new.first_name,
                    &new.last_name,
                    &new.is_superuser,
                    &new.is_staff,
                    &new.profile_picture,
                ],
            )
            .await
            .map_err(|e| map_write_error(e, "User"))?;
        let id: i32 = row.get("id");

        if !new.groups.is_empty() {
            let groups: Vec<&str> = new.groups.iter().map(Group::as_str).collect();
            tx.execute(queries::INSERT_USER_GROUPS, &[&id, &groups])
                .await
                .map_err(|e| map_write_error(e, "Group membership"))?;
        }
        if !new.department_ids.is_empty() {
            tx.execute(queries::INSERT_USER_DEPARTMENTS, &[&id, &new.department_ids])
                .await
                .map_err(|e| map_write_error(e, "Department affiliation"))?;
        }

        let user = user_from_row(&tx.query_one(queries::GET_USER, &[&id]).await?)?;
        tx.commit().await?;
        Ok(user)
    }

    async fn get_user(&self, id: i32) -> ApiResult<Option<User>> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::GET_USER, &[&id]).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> ApiResult<Option<User>> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::FIND_USER_BY_USERNAME, &[&username]).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> ApiResult<Vec<User>> {
        let client = self.pool.get().await?;
        let rows = client.query(queries::LIST_USERS, &[]).await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn update_profile(&self, id: i32, update: ProfileUpdate) -> ApiResult<User> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        if tx.query_opt(queries::LOCK_USER, &[&id]).await?.is_none() {
            return Err(not_found_error(format!("User {} not found", id)));
        }
        let mut user = user_from_row(&tx.query_one(queries::GET_USER, &[&id]).await?)?;
        update.apply_to(&mut user);

        let params: [&(dyn ToSql + Sync); 9] = [
            &id,
            &user.username,
            &user.email,
            &user.first_name,
            &user.last_name,
            &user.phone_number,
            &user.region,
            &user.district,
            &user.profile_picture,
        ];
        tx.execute(queries::UPDATE_USER_PROFILE, &params)
            .await
            .map_err(|e| map_write_error(e, "User"))?;

        tx.commit().await?;
        Ok(user)
    }

    async fn set_password(&self, id: i32, password_hash: String) -> ApiResult<()> {
        let client = self.pool.get().await?;
        let updated = client.execute(queries::SET_PASSWORD, &[&id, &password_hash]).await?;
        if updated == 0 {
            return Err(not_found_error(format!("User {} not found", id)));
        }
        Ok(())
    }

    async fn delete_user(&self, id: i32) -> ApiResult<()> {
        let client = self.pool.get().await?;
        let deleted = client.execute(queries::DELETE_USER, &[&id]).await?;
        if deleted == 0 {
            return Err(not_found_error(format!("User {} not found", id)));
        }
        Ok(())
    }

    async fn insert_complaint(&self, new: NewComplaint) -> ApiResult<Complaint> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_one(
                queries::INSERT_COMPLAINT,
                &[
                    &new.title,
                    &new.description,
                    &new.complainant_id,
                    &new.targeted_department_id,
                    &new.targeted_personnel_id,
                    &ComplaintStatus::INITIAL.as_str(),
                ],
            )
            .await
            .map_err(|e| map_write_error(e, "Complaint"))?;
        let id: i32 = row.get("id");

        require_own_attachments(&tx, &new.attachment_ids, new.complainant_id).await?;
        if !new.attachment_ids.is_empty() {
            tx.execute(queries::LINK_COMPLAINT_ATTACHMENTS, &[&id, &new.attachment_ids])
                .await
                .map_err(|e| map_write_error(e, "Attachment link"))?;
        }

        let complaint = complaint_from_row(&tx.query_one(queries::GET_COMPLAINT, &[&id]).await?)?;
        tx.commit().await?;
        Ok(complaint)
    }

    async fn get_complaint(&self, id: i32) -> ApiResult<Option<Complaint>> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::GET_COMPLAINT, &[&id]).await?;
        row.as_ref().map(complaint_from_row).transpose()
    }

    async fn list_complaints(&self, filter: ComplaintFilter) -> ApiResult<Vec<Complaint>> {
        let client = self.pool.get().await?;
        let rows = match filter {
            ComplaintFilter::All => client.query(queries::LIST_COMPLAINTS, &[]).await?,
            ComplaintFilter::Department(id) => {
                client.query(queries::LIST_COMPLAINTS_BY_DEPARTMENT, &[&id]).await?
            }
            ComplaintFilter::Involving(user_id) => {
                client.query(queries::LIST_COMPLAINTS_INVOLVING, &[&user_id]).await?
            }
            ComplaintFilter::Nothing => return Ok(Vec::new()),
        };
        rows.iter().map(complaint_from_row).collect()
    }

    async fn save_complaint(&self, id: i32, change: ComplaintChange) -> ApiResult<Complaint> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let saved = save_in(&tx, id, &change).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_complaint(&self, id: i32) -> ApiResult<()> {
        let client = self.pool.get().await?;
        let deleted = client.execute(queries::DELETE_COMPLAINT, &[&id]).await?;
        if deleted == 0 {
            return Err(not_found_error(format!("Complaint {} not found", id)));
        }
        Ok(())
    }

    async fn department_history(&self, complaint_id: i32) -> ApiResult<Vec<DepartmentHistory>> {
        let client = self.pool.get().await?;
        let rows = client.query(queries::LIST_HISTORY, &[&complaint_id]).await?;
        rows.iter().map(history_from_row).collect()
    }

    async fn insert_remark(
        &self,
        remark: NewRemark,
        routed: Option<ComplaintChange>,
    ) -> ApiResult<(Remark, Complaint)> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let complaint = match routed {
            Some(change) => save_in(&tx, remark.complaint_id, &change).await?,
            None => {
                if tx
                    .query_opt(queries::LOCK_COMPLAINT, &[&remark.complaint_id])
                    .await?
                    .is_none()
                {
                    return Err(AppError::Integrity(format!(
                        "Complaint {} disappeared before the remark was written",
                        remark.complaint_id
                    )));
                }
                complaint_from_row(
                    &tx.query_one(queries::GET_COMPLAINT, &[&remark.complaint_id]).await?,
                )?
            }
        };

        let row = tx
            .query_one(
                queries::INSERT_REMARK,
                &[
                    &remark.complaint_id,
                    &remark.respondent_id,
                    &remark.content,
                    &remark.status.as_str(),
                    &remark.targeted_department_id,
                    &remark.targeted_personnel_id,
                ],
            )
            .await
            .map_err(|e| map_write_error(e, "Remark"))?;
        let id: i32 = row.get("id");

        require_own_attachments(&tx, &remark.attachment_ids, remark.respondent_id).await?;
        if !remark.attachment_ids.is_empty() {
            tx.execute(queries::LINK_REMARK_ATTACHMENTS, &[&id, &remark.attachment_ids])
                .await
                .map_err(|e| map_write_error(e, "Attachment link"))?;
        }

        let stored = remark_from_row(&tx.query_one(queries::GET_REMARK, &[&id]).await?)?;
        tx.commit().await?;
        Ok((stored, complaint))
    }

    async fn get_remark(&self, id: i32) -> ApiResult<Option<Remark>> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::GET_REMARK, &[&id]).await?;
        row.as_ref().map(remark_from_row).transpose()
    }

    async fn list_remarks(&self, complaint_id: i32) -> ApiResult<Vec<Remark>> {
        let client = self.pool.get().await?;
        let rows = client.query(queries::LIST_REMARKS, &[&complaint_id]).await?;
        rows.iter().map(remark_from_row).collect()
    }

    async fn update_remark(&self, id: i32, edit: RemarkEdit) -> ApiResult<Remark> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let respondent: i32 = tx
            .query_opt(queries::LOCK_REMARK, &[&id])
            .await?
            .ok_or_else(|| not_found_error(format!("Remark {} not found", id)))?
            .get("respondent_id");
        if let Some(ids) = &edit.attachment_ids {
            require_own_attachments(&tx, ids, respondent).await?;
        }
        if let Some(content) = &edit.content {
            tx.execute(queries::UPDATE_REMARK_CONTENT, &[&id, content]).await?;
        }
        if let Some(ids) = &edit.attachment_ids {
            tx.execute(queries::UNLINK_REMARK_ATTACHMENTS, &[&id]).await?;
            if !ids.is_empty() {
                tx.execute(queries::LINK_REMARK_ATTACHMENTS, &[&id, ids])
                    .await
                    .map_err(|e| map_write_error(e, "Attachment link"))?;
            }
        }

        let remark = remark_from_row(&tx.query_one(queries::GET_REMARK, &[&id]).await?)?;
        tx.commit().await?;
        Ok(remark)
    }

    async fn insert_attachment(&self, new: NewAttachment) -> ApiResult<Attachment> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                queries::INSERT_ATTACHMENT,
                &[
                    &new.kind.as_str(),
                    &new.url,
                    &new.file_name,
                    &new.content_type,
                    &new.size_bytes,
                    &new.sha256,
                    &new.uploaded_by,
                ],
            )
            .await
            .map_err(|e| map_write_error(e, "Attachment"))?;
        attachment_from_row(&row)
    }

    async fn get_attachments(&self, ids: &[i32]) -> ApiResult<Vec<Attachment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.pool.get().await?;
        let rows = client.query(queries::GET_ATTACHMENTS, &[&ids]).await?;
        rows.iter().map(attachment_from_row).collect()
    }
}

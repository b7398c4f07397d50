//! In-memory store
//!
//! Used when no database is configured and by the test suite. Every operation
//! takes the single table lock once, so multi-table writes are as atomic here
//! as they are inside a postgres transaction.

use crate::db::Store;
use crate::error::{not_found_error, ApiResult, AppError};
use crate::models::{
    Attachment, Complaint, ComplaintChange, ComplaintFilter, ComplaintStatus, Department,
    DepartmentHistory, NewAttachment, NewComplaint, NewDepartment, NewRemark, NewUser,
    ProfileUpdate, Remark, RemarkEdit, User,
};
use crate::routing::{apply_change, record_history_on_save};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    departments: BTreeMap<i32, Department>,
    users: BTreeMap<i32, User>,
    complaints: BTreeMap<i32, Complaint>,
    remarks: BTreeMap<i32, Remark>,
    history: Vec<DepartmentHistory>,
    attachments: BTreeMap<i32, Attachment>,
    seq: Sequences,
}

#[derive(Default)]
struct Sequences {
    department: i32,
    user: i32,
    complaint: i32,
    remark: i32,
    history: i32,
    attachment: i32,
}

fn next(seq: &mut i32) -> i32 {
    *seq += 1;
    *seq
}

/// Attachment links are a set; keep them in id order like the SQL does
fn link_set(ids: &[i32]) -> Vec<i32> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

impl Tables {
    fn require_department(&self, id: i32) -> ApiResult<()> {
        if self.departments.contains_key(&id) {
            Ok(())
        } else {
            Err(not_found_error(format!("Department {} not found", id)))
        }
    }

    fn require_user(&self, id: i32) -> ApiResult<()> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(not_found_error(format!("User {} not found", id)))
        }
    }

    /// Only the uploader may link a file; anything else reads as missing
    fn require_own_attachments(&self, ids: &[i32], owner: i32) -> ApiResult<()> {
        let owned = |id: &i32| {
            self.attachments
                .get(id)
                .is_some_and(|a| a.uploaded_by == owner)
        };
        match ids.iter().find(|id| !owned(id)) {
            Some(missing) => Err(not_found_error(format!("Attachment {} not found", missing))),
            None => Ok(()),
        }
    }

    fn check_unique_user(&self, id: Option<i32>, username: &str, email: &str) -> ApiResult<()> {
        let others = self.users.values().filter(|u| Some(u.id) != id);
        for other in others {
            if other.username == username {
                return Err(AppError::Conflict(format!("Username {} already exists", username)));
            }
            if !email.is_empty() && other.email.eq_ignore_ascii_case(email) {
                return Err(AppError::Conflict(format!("Email {} already exists", email)));
            }
        }
        Ok(())
    }

    fn remark_targets(&self, complaint_id: i32) -> Vec<i32> {
        self.remarks
            .values()
            .filter(|r| r.complaint_id == complaint_id)
            .map(|r| r.targeted_personnel_id)
            .collect()
    }

    /// Shared save path: validates, appends the history row, then overwrites
    fn save_complaint(&mut self, id: i32, change: &ComplaintChange) -> ApiResult<Complaint> {
        let stored = self
            .complaints
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::Integrity(format!("Complaint {} disappeared during save", id)))?;

        if let Some(department) = change.targeted_department_id {
            self.require_department(department)?;
        }
        if let Some(personnel) = change.targeted_personnel_id {
            self.require_user(personnel)?;
        }

        if let Some(row) = record_history_on_save(&stored, change) {
            let history_id = next(&mut self.seq.history);
            self.history.push(DepartmentHistory {
                id: history_id,
                complaint_id: row.complaint_id,
                department_id: row.department_id,
                status: row.status,
                recorded_at: Utc::now(),
            });
        }

        let saved = apply_change(&stored, change, Utc::now());
        self.complaints.insert(id, saved.clone());
        Ok(saved)
    }

    fn remove_complaint(&mut self, id: i32) {
        self.complaints.remove(&id);
        self.remarks.retain(|_, r| r.complaint_id != id);
        self.history.retain(|h| h.complaint_id != id);
    }
}

/// Thread-safe in-memory implementation of [`Store`]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_department(&self, new: NewDepartment) -> ApiResult<Department> {
        let mut tables = self.tables.write().await;
        if tables.departments.values().any(|d| d.name == new.name) {
            return Err(AppError::Conflict(format!("Department {} already exists", new.name)));
        }
        let id = next(&mut tables.seq.department);
        let department = Department {
            id,
            name: new.name,
            description: new.description,
        };
        tables.departments.insert(id, department.clone());
        Ok(department)
    }

    async fn get_department(&self, id: i32) -> ApiResult<Option<Department>> {
        Ok(self.tables.read().await.departments.get(&id).cloned())
    }

    async fn list_departments(&self) -> ApiResult<Vec<Department>> {
        let tables = self.tables.read().await;
        let mut departments: Vec<Department> = tables.departments.values().cloned().collect();
        departments.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(departments)
    }

    async fn create_user(&self, new: NewUser) -> ApiResult<User> {
        let mut tables = self.tables.write().await;
        tables.check_unique_user(None, &new.username, &new.email)?;
        for department in &new.department_ids {
            tables.require_department(*department)?;
        }

        let mut groups = new.groups;
        groups.dedup();
        let mut department_ids = Vec::new();
        for d in new.department_ids {
            if !department_ids.contains(&d) {
                department_ids.push(d);
            }
        }

        let id = next(&mut tables.seq.user);
        let user = User {
            id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            is_superuser: new.is_superuser,
            is_staff: new.is_staff,
            groups,
            department_ids,
            phone_number: None,
            region: None,
            district: None,
            profile_picture: new.profile_picture,
            date_joined: Utc::now(),
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i32) -> ApiResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> ApiResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self) -> ApiResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn update_profile(&self, id: i32, update: ProfileUpdate) -> ApiResult<User> {
        let mut tables = self.tables.write().await;
        let mut user = tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error(format!("User {} not found", id)))?;

        update.apply_to(&mut user);
        tables.check_unique_user(Some(id), &user.username, &user.email)?;
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn set_password(&self, id: i32, password_hash: String) -> ApiResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| not_found_error(format!("User {} not found", id)))?;
        user.password_hash = password_hash;
        Ok(())
    }

    async fn delete_user(&self, id: i32) -> ApiResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Err(not_found_error(format!("User {} not found", id)));
        }

        let doomed: Vec<i32> = tables
            .complaints
            .values()
            .filter(|c| c.complainant_id == id || c.targeted_personnel_id == id)
            .map(|c| c.id)
            .collect();
        for complaint in doomed {
            tables.remove_complaint(complaint);
        }
        tables
            .remarks
            .retain(|_, r| r.respondent_id != id && r.targeted_personnel_id != id);

        let uploads: Vec<i32> = tables
            .attachments
            .values()
            .filter(|a| a.uploaded_by == id)
            .map(|a| a.id)
            .collect();
        if !uploads.is_empty() {
            tables.attachments.retain(|_, a| a.uploaded_by != id);
            for complaint in tables.complaints.values_mut() {
                complaint.attachment_ids.retain(|a| !uploads.contains(a));
            }
            for remark in tables.remarks.values_mut() {
                remark.attachment_ids.retain(|a| !uploads.contains(a));
            }
        }
        Ok(())
    }

    async fn insert_complaint(&self, new: NewComplaint) -> ApiResult<Complaint> {
        let mut tables = self.tables.write().await;
        tables.require_user(new.complainant_id)?;
        tables.require_department(new.targeted_department_id)?;
        tables.require_user(new.targeted_personnel_id)?;
        tables.require_own_attachments(&new.attachment_ids, new.complainant_id)?;

        let id = next(&mut tables.seq.complaint);
        let now = Utc::now();
        let complaint = Complaint {
            id,
            title: new.title,
            description: new.description,
            complainant_id: new.complainant_id,
            targeted_department_id: new.targeted_department_id,
            targeted_personnel_id: new.targeted_personnel_id,
            status: ComplaintStatus::INITIAL,
            attachment_ids: link_set(&new.attachment_ids),
            date_added: now,
            date_modified: now,
        };
        tables.complaints.insert(id, complaint.clone());
        Ok(complaint)
    }

    async fn get_complaint(&self, id: i32) -> ApiResult<Option<Complaint>> {
        Ok(self.tables.read().await.complaints.get(&id).cloned())
    }

    async fn list_complaints(&self, filter: ComplaintFilter) -> ApiResult<Vec<Complaint>> {
        let tables = self.tables.read().await;
        let mut complaints: Vec<Complaint> = tables
            .complaints
            .values()
            .filter(|c| filter.matches(c, &tables.remark_targets(c.id)))
            .cloned()
            .collect();
        complaints.sort_by(|a, b| b.date_added.cmp(&a.date_added).then(b.id.cmp(&a.id)));
        Ok(complaints)
    }

    async fn save_complaint(&self, id: i32, change: ComplaintChange) -> ApiResult<Complaint> {
        let mut tables = self.tables.write().await;
        tables.save_complaint(id, &change)
    }

    async fn delete_complaint(&self, id: i32) -> ApiResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.complaints.contains_key(&id) {
            return Err(not_found_error(format!("Complaint {} not found", id)));
        }
        tables.remove_complaint(id);
        Ok(())
    }

    async fn department_history(&self, complaint_id: i32) -> ApiResult<Vec<DepartmentHistory>> {
        let tables = self.tables.read().await;
        Ok(tables
            .history
            .iter()
            .filter(|h| h.complaint_id == complaint_id)
            .cloned()
            .collect())
    }

    async fn insert_remark(
        &self,
        remark: NewRemark,
        routed: Option<ComplaintChange>,
    ) -> ApiResult<(Remark, Complaint)> {
        let mut tables = self.tables.write().await;
        if !tables.complaints.contains_key(&remark.complaint_id) {
            return Err(AppError::Integrity(format!(
                "Complaint {} disappeared before the remark was written",
                remark.complaint_id
            )));
        }
        tables.require_user(remark.respondent_id)?;
        tables.require_department(remark.targeted_department_id)?;
        tables.require_user(remark.targeted_personnel_id)?;
        tables.require_own_attachments(&remark.attachment_ids, remark.respondent_id)?;

        let complaint = match routed {
            Some(change) => tables.save_complaint(remark.complaint_id, &change)?,
            None => tables
                .complaints
                .get(&remark.complaint_id)
                .cloned()
                .ok_or_else(|| AppError::Integrity("Complaint vanished".to_string()))?,
        };

        let id = next(&mut tables.seq.remark);
        let stored = Remark {
            id,
            complaint_id: remark.complaint_id,
            respondent_id: remark.respondent_id,
            content: remark.content,
            status: remark.status,
            targeted_department_id: remark.targeted_department_id,
            targeted_personnel_id: remark.targeted_personnel_id,
            attachment_ids: link_set(&remark.attachment_ids),
            date: Utc::now(),
        };
        tables.remarks.insert(id, stored.clone());
        Ok((stored, complaint))
    }

    async fn get_remark(&self, id: i32) -> ApiResult<Option<Remark>> {
        Ok(self.tables.read().await.remarks.get(&id).cloned())
    }

    async fn list_remarks(&self, complaint_id: i32) -> ApiResult<Vec<Remark>> {
        let tables = self.tables.read().await;
        Ok(tables
            .remarks
            .values()
            .filter(|r| r.complaint_id == complaint_id)
            .cloned()
            .collect())
    }

    async fn update_remark(&self, id: i32, edit: RemarkEdit) -> ApiResult<Remark> {
        let mut tables = self.tables.write().await;
        if let Some(ids) = &edit.attachment_ids {
            let respondent = tables
                .remarks
                .get(&id)
                .map(|r| r.respondent_id)
                .ok_or_else(|| not_found_error(format!("Remark {} not found", id)))?;
            tables.require_own_attachments(ids, respondent)?;
        }
        let remark = tables
            .remarks
            .get_mut(&id)
            .ok_or_else(|| not_found_error(format!("Remark {} not found", id)))?;
        if let Some(content) = edit.content {
            remark.content = content;
        }
        if let Some(ids) = edit.attachment_ids {
            remark.attachment_ids = link_set(&ids);
        }
        Ok(remark.clone())
    }

    async fn insert_attachment(&self, new: NewAttachment) -> ApiResult<Attachment> {
        let mut tables = self.tables.write().await;
        tables.require_user(new.uploaded_by)?;
        let id = next(&mut tables.seq.attachment);
        let attachment = Attachment {
            id,
            kind: new.kind,
            url: new.url,
            file_name: new.file_name,
            content_type: new.content_type,
            size_bytes: new.size_bytes,
            sha256: new.sha256,
            uploaded_by: new.uploaded_by,
            uploaded_at: Utc::now(),
        };
        tables.attachments.insert(id, attachment.clone());
        Ok(attachment)
    }

    async fn get_attachments(&self, ids: &[i32]) -> ApiResult<Vec<Attachment>> {
        let tables = self.tables.read().await;
        Ok(link_set(ids)
            .iter()
            .filter_map(|id| tables.attachments.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttachmentKind, Group, RemarkAction};
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    async fn seed(store: &MemoryStore) -> (Department, User, User, User) {
        let department = store
            .create_department(NewDepartment {
                name: "Works".to_string(),
                description: String::new(),
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for name in ["amina", "baraka", "chausiku"] {
            ids.push(
                store
                    .create_user(NewUser {
                        username: name.to_string(),
                        email: format!("{}@example.org", name),
                        password_hash: "!".to_string(),
                        first_name: String::new(),
                        last_name: String::new(),
                        is_superuser: false,
                        is_staff: false,
                        groups: vec![Group::Employee],
                        department_ids: vec![department.id],
                        profile_picture: None,
                    })
                    .await
                    .unwrap(),
            );
        }
        let c = ids.pop().unwrap();
        let b = ids.pop().unwrap();
        let a = ids.pop().unwrap();
        (department, a, b, c)
    }

    fn complaint_by(complainant: &User, personnel: &User, department: &Department) -> NewComplaint {
        NewComplaint {
            title: "Leaking roof".to_string(),
            description: "Water comes in over desk 4".to_string(),
            complainant_id: complainant.id,
            targeted_department_id: department.id,
            targeted_personnel_id: personnel.id,
            attachment_ids: vec![],
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email_conflict() {
        let store = MemoryStore::new();
        let (_, amina, _, _) = seed(&store).await;

        let duplicate = NewUser {
            username: amina.username.clone(),
            email: "other@example.org".to_string(),
            password_hash: "!".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            is_superuser: false,
            is_staff: false,
            groups: vec![],
            department_ids: vec![],
            profile_picture: None,
        };
        assert!(matches!(
            store.create_user(duplicate.clone()).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            store
                .create_user(NewUser {
                    username: "fresh".to_string(),
                    email: "AMINA@example.org".to_string(),
                    ..duplicate
                })
                .await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_involving_filter_has_no_duplicates() {
        let store = MemoryStore::new();
        let (works, amina, baraka, chausiku) = seed(&store).await;

        // amina is complainant, personnel and remark target of the same complaint
        let own = store.insert_complaint(complaint_by(&amina, &amina, &works)).await.unwrap();
        store
            .insert_remark(
                NewRemark {
                    complaint_id: own.id,
                    respondent_id: baraka.id,
                    content: "noted".to_string(),
                    status: RemarkAction::Closed,
                    targeted_department_id: works.id,
                    targeted_personnel_id: amina.id,
                    attachment_ids: vec![],
                },
                None,
            )
            .await
            .unwrap();
        let via_remark = store.insert_complaint(complaint_by(&baraka, &chausiku, &works)).await.unwrap();
        store
            .insert_remark(
                NewRemark {
                    complaint_id: via_remark.id,
                    respondent_id: chausiku.id,
                    content: "for amina".to_string(),
                    status: RemarkAction::Closed,
                    targeted_department_id: works.id,
                    targeted_personnel_id: amina.id,
                    attachment_ids: vec![],
                },
                None,
            )
            .await
            .unwrap();
        let unrelated = store.insert_complaint(complaint_by(&baraka, &chausiku, &works)).await.unwrap();

        let mine = store.list_complaints(ComplaintFilter::Involving(amina.id)).await.unwrap();
        let ids: Vec<i32> = mine.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![via_remark.id, own.id]);
        assert!(!ids.contains(&unrelated.id));
    }

    #[tokio::test]
    async fn test_save_of_vanished_complaint_is_integrity_error() {
        let store = MemoryStore::new();
        let (works, amina, baraka, _) = seed(&store).await;
        let complaint = store.insert_complaint(complaint_by(&amina, &baraka, &works)).await.unwrap();
        assert_ok!(store.delete_complaint(complaint.id).await);

        let result = store
            .save_complaint(
                complaint.id,
                ComplaintChange {
                    status: Some(ComplaintStatus::Closed),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Integrity(_))));
        assert_err!(store.delete_complaint(complaint.id).await);
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let store = MemoryStore::new();
        let (works, amina, baraka, chausiku) = seed(&store).await;

        let filed = store.insert_complaint(complaint_by(&amina, &baraka, &works)).await.unwrap();
        let other = store.insert_complaint(complaint_by(&chausiku, &baraka, &works)).await.unwrap();
        let (remark, _) = store
            .insert_remark(
                NewRemark {
                    complaint_id: other.id,
                    respondent_id: amina.id,
                    content: "seen".to_string(),
                    status: RemarkAction::Closed,
                    targeted_department_id: works.id,
                    targeted_personnel_id: baraka.id,
                    attachment_ids: vec![],
                },
                None,
            )
            .await
            .unwrap();

        assert_ok!(store.delete_user(amina.id).await);

        assert!(store.get_user(amina.id).await.unwrap().is_none());
        assert!(store.get_complaint(filed.id).await.unwrap().is_none());
        assert!(store.get_complaint(other.id).await.unwrap().is_some());
        assert!(store.get_remark(remark.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attachments_must_exist_and_are_kept_as_a_set() {
        let store = MemoryStore::new();
        let (works, amina, baraka, _) = seed(&store).await;

        let missing = NewComplaint {
            attachment_ids: vec![42],
            ..complaint_by(&amina, &baraka, &works)
        };
        assert!(matches!(store.insert_complaint(missing).await, Err(AppError::NotFound(_))));

        let upload = store
            .insert_attachment(NewAttachment {
                kind: AttachmentKind::Picture,
                url: "/media/complaint_pictures/x-roof.jpg".to_string(),
                file_name: "roof.jpg".to_string(),
                content_type: "image/jpeg".to_string(),
                size_bytes: 3,
                sha256: "00".repeat(32),
                uploaded_by: amina.id,
            })
            .await
            .unwrap();
        let complaint = store
            .insert_complaint(NewComplaint {
                attachment_ids: vec![upload.id, upload.id],
                ..complaint_by(&amina, &baraka, &works)
            })
            .await
            .unwrap();
        assert_eq!(complaint.attachment_ids, vec![upload.id]);
        assert_eq!(store.get_attachments(&complaint.attachment_ids).await.unwrap(), vec![upload.clone()]);

        let borrowed = NewComplaint {
            attachment_ids: vec![upload.id],
            ..complaint_by(&baraka, &amina, &works)
        };
        assert!(matches!(store.insert_complaint(borrowed).await, Err(AppError::NotFound(_))));
    }
}

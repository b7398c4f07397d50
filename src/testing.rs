//! Test fixtures shared by the unit tests

use crate::attachments::BlobStore;
use crate::auth::{create_tokens, Principal};
use crate::config::Settings;
use crate::db::memory::MemoryStore;
use crate::db::Store;
use crate::error::ApiResult;
use crate::models::{Department, Group, NewDepartment, NewUser, User};
use crate::remarks::RemarkLedger;
use crate::routing::RoutingEngine;
use crate::state::{AppState, SharedState};
use crate::users::UserDirectory;
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Password of every fixture account
pub const PASSWORD: &str = "kilimanjaro-42";

// Minimum bcrypt cost keeps the fixture fast
static PASSWORD_HASH: Lazy<String> = Lazy::new(|| bcrypt::hash(PASSWORD, 4).unwrap());

/// A detached user record, for tests that never touch a store
pub fn user(id: i32, username: &str, groups: &[Group], departments: &[i32]) -> User {
    User {
        id,
        username: username.to_string(),
        email: format!("{}@example.org", username),
        password_hash: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        is_superuser: false,
        is_staff: groups.iter().any(Group::is_staff),
        groups: groups.to_vec(),
        department_ids: departments.to_vec(),
        phone_number: None,
        region: None,
        district: None,
        profile_picture: None,
        date_joined: Utc::now(),
    }
}

/// Blob store that keeps only the URLs it handed out
#[derive(Default)]
pub struct RecordingBlobStore {
    urls: Mutex<Vec<String>>,
}

impl RecordingBlobStore {
    pub async fn names(&self) -> Vec<String> {
        self.urls.lock().await.clone()
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn put(&self, directory: &str, name: &str, _bytes: &[u8]) -> ApiResult<String> {
        let url = format!("/media/{}/{}", directory, name);
        self.urls.lock().await.push(url.clone());
        Ok(url)
    }
}

/// Two departments and one account per role over an in-memory store
pub struct Fixture {
    pub state: SharedState,
    pub store: Arc<dyn Store>,
    pub routing: RoutingEngine,
    pub remarks: RemarkLedger,
    pub users: UserDirectory,
    pub works: Department,
    pub finance: Department,
    pub admin: Principal,
    pub ceo: Principal,
    pub works_hod: Principal,
    pub works_staff: Principal,
    pub finance_hod: Principal,
    /// Files the complaints in most tests
    pub employee: Principal,
    /// Finance employee with no part in any complaint
    pub outsider: Principal,
    /// HOD without a department
    pub lone_hod: Principal,
}

async fn department(store: &dyn Store, name: &str) -> Department {
    store
        .create_department(NewDepartment {
            name: name.to_string(),
            description: format!("{} department", name),
        })
        .await
        .unwrap()
}

async fn account(store: &dyn Store, username: &str, groups: &[Group], departments: &[i32]) -> Principal {
    let user = store
        .create_user(NewUser {
            username: username.to_string(),
            email: format!("{}@example.org", username),
            password_hash: PASSWORD_HASH.clone(),
            first_name: String::new(),
            last_name: String::new(),
            is_superuser: false,
            is_staff: groups.iter().any(Group::is_staff),
            groups: groups.to_vec(),
            department_ids: departments.to_vec(),
            profile_picture: None,
        })
        .await
        .unwrap();
    Principal::new(user)
}

impl Fixture {
    pub async fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let s = store.as_ref();

        let works = department(s, "Works").await;
        let finance = department(s, "Finance").await;

        let admin = {
            let user = s
                .create_user(NewUser {
                    username: "root".to_string(),
                    email: "root@example.org".to_string(),
                    password_hash: PASSWORD_HASH.clone(),
                    first_name: String::new(),
                    last_name: String::new(),
                    is_superuser: true,
                    is_staff: true,
                    groups: vec![],
                    department_ids: vec![],
                    profile_picture: None,
                })
                .await
                .unwrap();
            Principal::new(user)
        };
        let ceo = account(s, "zawadi", &[Group::Ceo], &[]).await;
        let works_hod = account(s, "juma", &[Group::Hod], &[works.id]).await;
        let works_staff = account(s, "amina", &[Group::Employee], &[works.id]).await;
        let finance_hod = account(s, "halima", &[Group::Hod], &[finance.id]).await;
        let employee = account(s, "baraka", &[Group::Employee], &[finance.id]).await;
        let outsider = account(s, "chausiku", &[Group::Employee], &[finance.id]).await;
        let lone_hod = account(s, "mwita", &[Group::Hod], &[]).await;

        let state: SharedState = Arc::new(AppState::new(
            Settings::default(),
            store.clone(),
            Arc::new(RecordingBlobStore::default()),
        ));

        Self {
            routing: state.routing.clone(),
            remarks: state.remarks.clone(),
            users: state.users.clone(),
            state,
            store,
            works,
            finance,
            admin,
            ceo,
            works_hod,
            works_staff,
            finance_hod,
            employee,
            outsider,
            lone_hod,
        }
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// `Authorization` header value for `principal`
    pub fn bearer(&self, principal: &Principal) -> String {
        let tokens = create_tokens(&self.state.settings.auth, principal.id(), &principal.user.username).unwrap();
        format!("Bearer {}", tokens.access_token)
    }
}

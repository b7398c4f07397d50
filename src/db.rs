//! Persistence layer
//!
//! The [`Store`] trait is the boundary between the complaint core and the
//! relational store. Operations that touch more than one table (routing a
//! remark, saving a complaint with its history row, cascading deletes) are
//! single trait methods so each implementation can make them atomic.

pub mod memory;
pub mod postgres;
pub mod queries;

use crate::config::DatabaseConfig;
use crate::error::{ApiResult, AppError};
use crate::models::{
    Attachment, Complaint, ComplaintChange, ComplaintFilter, Department, DepartmentHistory,
    NewAttachment, NewComplaint, NewDepartment, NewRemark, NewUser, ProfileUpdate, Remark,
    RemarkEdit, User,
};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::info;

#[async_trait]
pub trait Store: Send + Sync {
    // Departments
    async fn create_department(&self, new: NewDepartment) -> ApiResult<Department>;
    async fn get_department(&self, id: i32) -> ApiResult<Option<Department>>;
    async fn list_departments(&self) -> ApiResult<Vec<Department>>;

    // Users
    async fn create_user(&self, new: NewUser) -> ApiResult<User>;
    async fn get_user(&self, id: i32) -> ApiResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> ApiResult<Option<User>>;
    async fn list_users(&self) -> ApiResult<Vec<User>>;
    async fn update_profile(&self, id: i32, update: ProfileUpdate) -> ApiResult<User>;
    async fn set_password(&self, id: i32, password_hash: String) -> ApiResult<()>;
    /// Removes the user together with every complaint they filed or are
    /// targeted by, every remark they wrote or are targeted by, and their
    /// group/department rows.
    async fn delete_user(&self, id: i32) -> ApiResult<()>;

    // Complaints
    /// Inserts with status [`crate::models::ComplaintStatus::INITIAL`] and links the attachments.
    async fn insert_complaint(&self, new: NewComplaint) -> ApiResult<Complaint>;
    async fn get_complaint(&self, id: i32) -> ApiResult<Option<Complaint>>;
    /// Newest first
    async fn list_complaints(&self, filter: ComplaintFilter) -> ApiResult<Vec<Complaint>>;
    /// Applies `change` to the stored complaint, appending the history row
    /// [`crate::routing::record_history_on_save`] asks for in the same
    /// transaction. A complaint that vanished is an integrity error.
    async fn save_complaint(&self, id: i32, change: ComplaintChange) -> ApiResult<Complaint>;
    async fn delete_complaint(&self, id: i32) -> ApiResult<()>;
    /// Oldest first
    async fn department_history(&self, complaint_id: i32) -> ApiResult<Vec<DepartmentHistory>>;

    // Remarks
    /// Atomically applies the routed complaint change (if any, through the
    /// same path as [`Store::save_complaint`]) and inserts the remark.
    /// Returns the remark and the complaint as it is after the write.
    async fn insert_remark(
        &self,
        remark: NewRemark,
        routed: Option<ComplaintChange>,
    ) -> ApiResult<(Remark, Complaint)>;
    async fn get_remark(&self, id: i32) -> ApiResult<Option<Remark>>;
    /// Creation order
    async fn list_remarks(&self, complaint_id: i32) -> ApiResult<Vec<Remark>>;
    async fn update_remark(&self, id: i32, edit: RemarkEdit) -> ApiResult<Remark>;

    // Attachments
    async fn insert_attachment(&self, new: NewAttachment) -> ApiResult<Attachment>;
    async fn get_attachments(&self, ids: &[i32]) -> ApiResult<Vec<Attachment>>;
}

/// Create a connection pool, with TLS when the URL asked for `sslmode=require`
pub async fn connect(config: &DatabaseConfig) -> Result<Pool, AppError> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(config.max_pool_size));

    let pool = if config.require_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
        cfg.create_pool(Some(Runtime::Tokio1), tls)
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
    }
    .map_err(|e| AppError::Config(format!("Failed to create pool: {}", e)))?;

    // Test connection
    let client = pool.get().await?;
    client.query_one("SELECT 1", &[]).await?;
    drop(client);

    info!(
        "Database connection successful ({}:{}/{}, TLS: {})",
        config.host, config.port, config.database, config.require_tls
    );
    Ok(pool)
}

/// Create tables if they don't exist
pub async fn init_schema(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;
    client.batch_execute(queries::SCHEMA).await?;
    info!("Database tables initialized");
    Ok(())
}

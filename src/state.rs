//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::attachments::{AttachmentStore, BlobStore};
use crate::config::Settings;
use crate::db::Store;
use crate::remarks::RemarkLedger;
use crate::routing::RoutingEngine;
use crate::users::UserDirectory;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,

    /// Backing store, postgres or in-memory
    pub store: Arc<dyn Store>,

    pub routing: RoutingEngine,
    pub remarks: RemarkLedger,
    pub users: UserDirectory,
    pub attachments: AttachmentStore,
}

impl AppState {
    pub fn new(settings: Settings, store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        let routing = RoutingEngine::new(store.clone());
        let remarks = RemarkLedger::new(store.clone(), routing.clone());
        let users = UserDirectory::new(store.clone(), settings.media.default_profile_picture.clone());
        let attachments = AttachmentStore::new(store.clone(), blobs, settings.media.max_upload_bytes);

        Self {
            settings,
            store,
            routing,
            remarks,
            users,
            attachments,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;

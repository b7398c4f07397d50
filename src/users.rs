//! User directory
//!
//! Authentication, role-scoped listing, self-service profile and password
//! changes, admin deletion and the startup superuser.

use crate::auth::{hash_password, verify_password, Principal};
use crate::config::BootstrapConfig;
use crate::db::Store;
use crate::error::{not_found_error, validation_error, ApiResult, AppError, FieldErrors};
use crate::models::{NewUser, ProfileUpdate, User};
use crate::validation::{validate_phone, validate_username};
use crate::visibility;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// Self-service profile edit. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    #[validate(length(max = 150, message = "First name must be at most 150 characters"))]
    pub first_name: Option<String>,
    #[validate(length(max = 150, message = "Last name must be at most 150 characters"))]
    pub last_name: Option<String>,
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone_number: Option<String>,
    #[validate(length(max = 100, message = "Region must be at most 100 characters"))]
    pub region: Option<String>,
    #[validate(length(max = 100, message = "District must be at most 100 characters"))]
    pub district: Option<String>,
    #[validate(length(max = 255, message = "Picture reference must be at most 255 characters"))]
    pub profile_picture: Option<String>,
}

impl From<ProfileRequest> for ProfileUpdate {
    fn from(req: ProfileRequest) -> Self {
        ProfileUpdate {
            first_name: req.first_name,
            last_name: req.last_name,
            username: req.username,
            email: req.email,
            phone_number: req.phone_number,
            region: req.region,
            district: req.district,
            profile_picture: req.profile_picture,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub old_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn Store>,
    default_profile_picture: String,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn Store>, default_profile_picture: String) -> Self {
        Self {
            store,
            default_profile_picture,
        }
    }

    /// Picture reference new accounts start with
    pub fn default_profile_picture(&self) -> &str {
        &self.default_profile_picture
    }

    /// Check credentials. Unknown users and wrong passwords are indistinguishable.
    pub async fn authenticate(&self, username: &str, password: &str) -> ApiResult<User> {
        let invalid = || AppError::Unauthorized("Invalid username or password".to_string());
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or_else(invalid)?;
        if !verify_password(password, &user.password_hash) {
            return Err(invalid());
        }
        Ok(user)
    }

    pub async fn list(&self, principal: &Principal, search: Option<&str>) -> ApiResult<Vec<User>> {
        let users = self.store.list_users().await?;
        Ok(visibility::scope_users(principal, users, search))
    }

    pub async fn get(&self, principal: &Principal, id: i32) -> ApiResult<User> {
        self.store
            .get_user(id)
            .await?
            .filter(|u| visibility::can_view_user(principal, u))
            .ok_or_else(|| not_found_error(format!("User {} not found", id)))
    }

    pub async fn update_profile(&self, principal: &Principal, id: i32, req: ProfileRequest) -> ApiResult<User> {
        if principal.id() != id {
            return Err(AppError::Forbidden("You can only edit your own profile".to_string()));
        }
        req.validate()?;

        let current = self
            .store
            .get_user(id)
            .await?
            .ok_or_else(|| not_found_error(format!("User {} not found", id)))?;
        let after = |requested: Option<&String>, stored: Option<&String>| -> bool {
            match requested {
                Some(value) => !value.trim().is_empty(),
                None => stored.is_some(),
            }
        };
        let has_region = after(req.region.as_ref(), current.region.as_ref());
        let has_district = after(req.district.as_ref(), current.district.as_ref());

        let mut errors = FieldErrors::new();
        if has_district && !has_region {
            errors.add("district", "Select a region before choosing a district");
        }
        errors.into_result()?;

        let user = self.store.update_profile(id, req.into()).await?;
        info!("Profile of {} updated", user.username);
        Ok(user)
    }

    pub async fn change_password(&self, principal: &Principal, change: PasswordChange) -> ApiResult<()> {
        if !verify_password(&change.old_password, &principal.user.password_hash) {
            return Err(validation_error("old_password", "Your old password was entered incorrectly"));
        }
        change.validate()?;
        if change.new_password1 != change.new_password2 {
            return Err(validation_error("new_password2", "The two password fields didn't match"));
        }

        let hash = hash_password(&change.new_password1)?;
        self.store.set_password(principal.id(), hash).await?;
        info!("Password changed for {}", principal.user.username);
        Ok(())
    }

    /// Admin deletion, cascading to everything the user filed, wrote or is targeted by
    pub async fn delete(&self, principal: &Principal, id: i32) -> ApiResult<()> {
        if !principal.role.is_unrestricted() {
            return Err(AppError::Forbidden("Only a CEO or superuser can delete users".to_string()));
        }
        if id == principal.id() {
            return Err(validation_error("user", "You cannot delete your own account"));
        }
        self.store.delete_user(id).await?;
        warn!("User {} deleted by {}", id, principal.user.username);
        Ok(())
    }

    /// Create the configured superuser unless an account with that name exists
    pub async fn bootstrap_admin(&self, config: &BootstrapConfig) -> ApiResult<Option<User>> {
        let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
            return Ok(None);
        };
        if self.store.find_user_by_username(username).await?.is_some() {
            return Ok(None);
        }

        let admin = self
            .store
            .create_user(NewUser {
                username: username.clone(),
                email: config.admin_email.clone().unwrap_or_default(),
                password_hash: hash_password(password)?,
                first_name: String::new(),
                last_name: String::new(),
                is_superuser: true,
                is_staff: true,
                groups: vec![],
                department_ids: vec![],
                profile_picture: Some(self.default_profile_picture.clone()),
            })
            .await?;
        info!("Created superuser {}", admin.username);
        Ok(Some(admin))
    }
}

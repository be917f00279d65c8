use log::*;

use crate::{
    api::errors::AuthApiError,
    db_types::{NewProfile, Profile, Role},
    traits::AuthManagement,
};

/// `AuthApi` handles the engine side of authentication: profile upserts at login, login-nonce replay
/// protection, and role queries/updates.
#[derive(Debug, Clone)]
pub struct AuthApi<B> {
    db: B,
}

impl<B> AuthApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AuthApi<B>
where B: AuthManagement
{
    /// Ensures a profile exists for the identity and records the login nonce. The nonce must be strictly
    /// greater than any previously seen for this user; replayed login tokens fail here.
    pub async fn upsert_nonce_for_user(&self, user_id: &str, nonce: u64) -> Result<(), AuthApiError> {
        self.db.upsert_nonce_for_user(user_id, nonce).await
    }

    pub async fn upsert_profile(&self, profile: NewProfile) -> Result<Profile, AuthApiError> {
        let profile = self.db.upsert_profile(profile).await?;
        trace!("🔑️ Profile refreshed for {}", profile.user_id);
        Ok(profile)
    }

    pub async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, AuthApiError> {
        self.db.fetch_profile(user_id).await
    }

    /// Confirms the user holds every requested role. Used when exchanging a login token for an access
    /// token, so a caller cannot mint themselves roles they do not have.
    pub async fn check_user_has_roles(&self, user_id: &str, roles: &[Role]) -> Result<(), AuthApiError> {
        self.db.check_user_has_roles(user_id, roles).await
    }

    pub async fn assign_roles(&self, user_id: &str, roles: &[Role]) -> Result<(), AuthApiError> {
        self.db.assign_roles(user_id, roles).await?;
        debug!("🔑️ Roles {roles:?} assigned to {user_id}");
        Ok(())
    }

    pub async fn remove_roles(&self, user_id: &str, roles: &[Role]) -> Result<u64, AuthApiError> {
        let removed = self.db.remove_roles(user_id, roles).await?;
        debug!("🔑️ {removed} roles removed from {user_id}");
        Ok(removed)
    }
}

use crate::{
    api::errors::AuthApiError,
    db_types::{NewProfile, Profile, Role, Roles},
};

/// Profile and role storage, plus login-nonce tracking for replay protection.
#[allow(async_fn_in_trait)]
pub trait AuthManagement {
    /// Creates or refreshes a profile. Roles are only set on first creation; later upserts keep the
    /// existing role set and update the display data.
    async fn upsert_profile(&self, profile: NewProfile) -> Result<Profile, AuthApiError>;

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, AuthApiError>;

    /// Succeeds only if the user holds *every* role in `roles`.
    async fn check_user_has_roles(&self, user_id: &str, roles: &[Role]) -> Result<(), AuthApiError>;

    async fn fetch_roles_for_user(&self, user_id: &str) -> Result<Roles, AuthApiError>;

    async fn assign_roles(&self, user_id: &str, roles: &[Role]) -> Result<(), AuthApiError>;

    /// Returns the number of roles actually removed.
    async fn remove_roles(&self, user_id: &str, roles: &[Role]) -> Result<u64, AuthApiError>;

    /// Stores the latest login nonce for the user. The nonce must be strictly greater than the stored
    /// one; otherwise the call fails with [`AuthApiError::InvalidNonce`].
    async fn upsert_nonce_for_user(&self, user_id: &str, nonce: u64) -> Result<(), AuthApiError>;
}

use chrono::{DateTime, Utc};
use log::warn;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    api::errors::AuthApiError,
    db_types::{NewProfile, Profile, Role, Roles},
};

/// Raw row shape; `roles` is a comma-joined string that gets parsed into [`Roles`].
#[derive(Debug, Clone, FromRow)]
struct ProfileRow {
    user_id: String,
    display_name: String,
    email: String,
    roles: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProfileRow {
    fn into_profile(self) -> Profile {
        let roles = self.roles.parse::<Roles>().unwrap_or_else(|e| {
            warn!("🔑️ Profile {} carries an unparseable role set ({e}). Treating as roleless.", self.user_id);
            Roles::default()
        });
        Profile {
            user_id: self.user_id,
            display_name: self.display_name,
            email: self.email,
            roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Creates the profile if it is new, otherwise refreshes the display data. Roles are only set at
/// creation; an upsert never widens or narrows an existing role set.
pub async fn upsert_profile(profile: NewProfile, conn: &mut SqliteConnection) -> Result<Profile, AuthApiError> {
    let row: ProfileRow = sqlx::query_as(
        r#"
        INSERT INTO profiles (user_id, display_name, email, roles) VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id) DO UPDATE SET
            display_name = excluded.display_name,
            email = excluded.email,
            updated_at = CURRENT_TIMESTAMP
        RETURNING user_id, display_name, email, roles, created_at, updated_at
        "#,
    )
    .bind(profile.user_id)
    .bind(profile.display_name)
    .bind(profile.email)
    .bind(profile.roles.to_string())
    .fetch_one(conn)
    .await?;
    Ok(row.into_profile())
}

pub async fn fetch_profile(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<Profile>, AuthApiError> {
    let row: Option<ProfileRow> = sqlx::query_as(
        "SELECT user_id, display_name, email, roles, created_at, updated_at FROM profiles WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(ProfileRow::into_profile))
}

pub async fn roles_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Roles, AuthApiError> {
    let profile = fetch_profile(user_id, conn).await?.ok_or(AuthApiError::UserNotFound)?;
    Ok(profile.roles)
}

/// Succeeds only when the user holds every role in `roles`.
pub async fn user_has_roles(user_id: &str, roles: &[Role], conn: &mut SqliteConnection) -> Result<(), AuthApiError> {
    let held = roles_for_user(user_id, conn).await?;
    let missing = roles.iter().filter(|r| !held.contains(**r)).count();
    if missing > 0 {
        return Err(AuthApiError::RoleNotAllowed(missing));
    }
    Ok(())
}

pub async fn assign_roles(user_id: &str, roles: &[Role], conn: &mut SqliteConnection) -> Result<(), AuthApiError> {
    let mut held = roles_for_user(user_id, conn).await?;
    for role in roles {
        held.insert(*role);
    }
    write_roles(user_id, &held, conn).await
}

pub async fn remove_roles(user_id: &str, roles: &[Role], conn: &mut SqliteConnection) -> Result<u64, AuthApiError> {
    let mut held = roles_for_user(user_id, conn).await?;
    let removed = roles.iter().filter(|r| held.remove(**r)).count() as u64;
    if removed > 0 {
        write_roles(user_id, &held, conn).await?;
    }
    Ok(removed)
}

async fn write_roles(user_id: &str, roles: &Roles, conn: &mut SqliteConnection) -> Result<(), AuthApiError> {
    sqlx::query("UPDATE profiles SET roles = $1, updated_at = CURRENT_TIMESTAMP WHERE user_id = $2")
        .bind(roles.to_string())
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Records the latest login nonce, requiring strict monotonicity. Replayed login tokens carry an old
/// nonce and land in the `InvalidNonce` branch.
pub async fn upsert_nonce_for_user(
    user_id: &str,
    nonce: u64,
    conn: &mut SqliteConnection,
) -> Result<(), AuthApiError> {
    #[allow(clippy::cast_possible_wrap)]
    let nonce = nonce as i64;
    let result = sqlx::query("UPDATE profiles SET login_nonce = $1 WHERE user_id = $2 AND login_nonce < $1")
        .bind(nonce)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return match fetch_profile(user_id, conn).await? {
            Some(_) => Err(AuthApiError::InvalidNonce),
            None => Err(AuthApiError::UserNotFound),
        };
    }
    Ok(())
}

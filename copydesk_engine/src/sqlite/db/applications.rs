use sqlx::SqliteConnection;

use crate::{
    api::errors::WriterApiError,
    db_types::{ApplicationStatus, NewWriterApplication, Profile, WriterApplication},
    sqlite::db::profiles,
};

/// Files an application, enforcing the one-live-application-per-identity rule: a second application while
/// a pending or approved one exists is rejected.
pub async fn insert_application(
    application: NewWriterApplication,
    conn: &mut SqliteConnection,
) -> Result<WriterApplication, WriterApiError> {
    let live: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM writer_applications WHERE user_id = $1 AND status IN ('pending', 'approved') LIMIT 1",
    )
    .bind(&application.user_id)
    .fetch_optional(&mut *conn)
    .await?;
    if live.is_some() {
        return Err(WriterApiError::DuplicateApplication);
    }
    let specialties = application.specialties.join(",");
    let application = sqlx::query_as(
        r#"
        INSERT INTO writer_applications (
            user_id, name, email, portfolio_url, experience, specialties, bio, education, certifications,
            availability
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(application.user_id)
    .bind(application.name)
    .bind(application.email)
    .bind(application.portfolio_url)
    .bind(application.experience)
    .bind(specialties)
    .bind(application.bio)
    .bind(application.education)
    .bind(application.certifications)
    .bind(application.availability)
    .fetch_one(conn)
    .await?;
    Ok(application)
}

pub async fn fetch_application(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<WriterApplication>, WriterApiError> {
    let application =
        sqlx::query_as("SELECT * FROM writer_applications WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(application)
}

pub async fn list_applications(
    status: Option<ApplicationStatus>,
    conn: &mut SqliteConnection,
) -> Result<Vec<WriterApplication>, WriterApiError> {
    let applications = match status {
        Some(status) => {
            sqlx::query_as("SELECT * FROM writer_applications WHERE status = $1 ORDER BY id ASC")
                .bind(status)
                .fetch_all(conn)
                .await?
        },
        None => sqlx::query_as("SELECT * FROM writer_applications ORDER BY id ASC").fetch_all(conn).await?,
    };
    Ok(applications)
}

/// Settles a pending application with a guarded update: a concurrent or repeated decision loses the
/// `status = 'pending'` condition and maps to `AlreadyDecided`.
pub async fn decide_application(
    id: i64,
    new_status: ApplicationStatus,
    conn: &mut SqliteConnection,
) -> Result<WriterApplication, WriterApiError> {
    let updated: Option<WriterApplication> = sqlx::query_as(
        "UPDATE writer_applications SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = \
         'pending' RETURNING *",
    )
    .bind(new_status)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(application) => Ok(application),
        None => match fetch_application(id, conn).await? {
            Some(_) => Err(WriterApiError::AlreadyDecided),
            None => Err(WriterApiError::ApplicationNotFound),
        },
    }
}

/// Has this user an approved application on file?
pub async fn has_approved_application(user_id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let id: Option<i64> =
        sqlx::query_scalar("SELECT id FROM writer_applications WHERE user_id = $1 AND status = 'approved' LIMIT 1")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;
    Ok(id.is_some())
}

/// Profiles of all writers with an approved application, for the assignment picker.
pub async fn approved_writers(conn: &mut SqliteConnection) -> Result<Vec<Profile>, WriterApiError> {
    let user_ids: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT user_id FROM writer_applications WHERE status = 'approved' ORDER BY user_id ASC",
    )
    .fetch_all(&mut *conn)
    .await?;
    let mut writers = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        if let Some(profile) = profiles::fetch_profile(&user_id, conn)
            .await
            .map_err(|e| WriterApiError::DatabaseError(e.to_string()))?
        {
            writers.push(profile);
        }
    }
    Ok(writers)
}

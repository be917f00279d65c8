use crate::{
    api::errors::WriterApiError,
    db_types::{ApplicationStatus, NewWriterApplication, Profile, WriterApplication},
};

/// Writer application storage and the approved-writer roster.
#[allow(async_fn_in_trait)]
pub trait WriterManagement {
    /// Files a new application. Fails with [`WriterApiError::DuplicateApplication`] while the user
    /// already has a pending or approved application.
    async fn submit_application(&self, application: NewWriterApplication) -> Result<WriterApplication, WriterApiError>;

    async fn fetch_application(&self, id: i64) -> Result<Option<WriterApplication>, WriterApiError>;

    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<WriterApplication>, WriterApiError>;

    /// Settles a pending application. On approval the applicant's profile is granted the writer role in
    /// the same transaction. Fails with [`WriterApiError::AlreadyDecided`] when the application is no
    /// longer pending.
    async fn decide_application(&self, id: i64, approve: bool) -> Result<WriterApplication, WriterApiError>;

    /// Profiles of all writers with an approved application, for the assignment picker.
    async fn list_approved_writers(&self) -> Result<Vec<Profile>, WriterApiError>;
}

use log::*;

use crate::{
    api::errors::WriterApiError,
    db_types::{ApplicationStatus, NewWriterApplication, Profile, WriterApplication},
    helpers::MAX_SPECIALTIES,
    policy::{authorize, Action, Actor},
    traits::WriterManagement,
};

/// `WriterApi` covers the writer-onboarding flow: applications, admin decisions, and the approved-writer
/// roster used by the assignment picker.
#[derive(Debug, Clone)]
pub struct WriterApi<B> {
    db: B,
}

impl<B> WriterApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> WriterApi<B>
where B: WriterManagement
{
    /// Files an application for the calling user. One live application per identity; the specialties list
    /// is bounded.
    pub async fn submit_application(
        &self,
        actor: &Actor,
        mut application: NewWriterApplication,
    ) -> Result<WriterApplication, WriterApiError> {
        authorize(actor, Action::ApplyAsWriter, None)?;
        let user_id = actor.user_id.clone().ok_or_else(|| {
            WriterApiError::InvalidApplication("an authenticated identity is required".to_string())
        })?;
        application.user_id = user_id;
        if application.specialties.is_empty() {
            return Err(WriterApiError::InvalidApplication("at least one specialty is required".into()));
        }
        if application.specialties.len() > MAX_SPECIALTIES {
            return Err(WriterApiError::InvalidApplication(format!(
                "at most {MAX_SPECIALTIES} specialties are allowed"
            )));
        }
        if application.bio.trim().is_empty() {
            return Err(WriterApiError::InvalidApplication("a bio is required".into()));
        }
        let application = self.db.submit_application(application).await?;
        info!("✍️ Writer application #{} filed by {}", application.id, application.user_id);
        Ok(application)
    }

    pub async fn list_applications(
        &self,
        actor: &Actor,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<WriterApplication>, WriterApiError> {
        authorize(actor, Action::ListApplications, None)?;
        self.db.list_applications(status).await
    }

    /// Settles a pending application. Approval grants the writer role in the same transaction.
    pub async fn decide_application(
        &self,
        actor: &Actor,
        id: i64,
        approve: bool,
    ) -> Result<WriterApplication, WriterApiError> {
        authorize(actor, Action::DecideApplication, None)?;
        let application = self.db.decide_application(id, approve).await?;
        info!(
            "✍️ Application #{id} for {} {}",
            application.user_id,
            if approve { "approved" } else { "rejected" }
        );
        Ok(application)
    }

    pub async fn list_approved_writers(&self, actor: &Actor) -> Result<Vec<Profile>, WriterApiError> {
        authorize(actor, Action::ListApplications, None)?;
        self.db.list_approved_writers().await
    }
}

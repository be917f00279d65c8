use std::fmt::Display;

use chrono::{DateTime, Utc};
use copydesk_engine::db_types::{
    AvailabilityTier,
    ExperienceTier,
    NewWriterApplication,
    Role,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleUpdateRequest {
    pub user_id: String,
    #[serde(default)]
    pub apply: Vec<Role>,
    #[serde(default)]
    pub revoke: Vec<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignWriterParams {
    pub writer_id: String,
    /// Agreed writer fee in cents.
    pub writer_price: i64,
    pub writer_deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitWorkParams {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub file_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesParams {
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelParams {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessageParams {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFileParams {
    pub file_name: String,
    pub content_type: String,
}

/// The client echoes the price it displayed; the server validates it against the stored order price
/// before creating a provider session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutParams {
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDecisionParams {
    pub approve: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterApplicationParams {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub portfolio_url: Option<String>,
    pub experience: ExperienceTier,
    pub specialties: Vec<String>,
    pub bio: String,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub certifications: Option<String>,
    pub availability: AvailabilityTier,
}

impl WriterApplicationParams {
    /// The engine fills in the authenticated user id itself; anything a client supplies there is ignored.
    pub fn into_new_application(self) -> NewWriterApplication {
        NewWriterApplication {
            user_id: String::new(),
            name: self.name,
            email: self.email,
            portfolio_url: self.portfolio_url,
            experience: self.experience,
            specialties: self.specialties,
            bio: self.bio,
            education: self.education,
            certifications: self.certifications,
            availability: self.availability,
        }
    }
}

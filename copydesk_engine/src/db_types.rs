use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use cpd_common::UsdCents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        Role        ---------------------------------------------------------
/// Roles drive every access-policy decision. A profile holds a set of them; admin approval of a writer
/// application grants [`Role::Writer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Places orders and follows their progress.
    Client,
    /// An approved writer. May be attached to orders and submit work.
    Writer,
    /// Full access: assignment, review, cancellation, application decisions.
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Writer => write!(f, "writer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Self::Client),
            "writer" => Ok(Self::Writer),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

/// A set of roles, stored in the database as a comma-joined string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles(pub Vec<Role>);

impl Roles {
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, role: Role) {
        if !self.contains(role) {
            self.0.push(role);
        }
    }

    pub fn remove(&mut self, role: Role) -> bool {
        let n = self.0.len();
        self.0.retain(|r| *r != role);
        self.0.len() < n
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }
}

impl From<Vec<Role>> for Roles {
    fn from(roles: Vec<Role>) -> Self {
        Self(roles)
    }
}

impl Display for Roles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(",");
        write!(f, "{s}")
    }
}

impl FromStr for Roles {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let roles = s.split(',').map(|r| r.trim().parse::<Role>()).collect::<Result<Vec<Role>, _>>()?;
        Ok(Self(roles))
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
/// The order lifecycle states. Legal movements between them are defined in [`crate::order_fsm`]; nothing
/// else in the engine is allowed to change an order's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been created and no payment has been confirmed yet.
    PendingPayment,
    /// Payment confirmed; waiting for a writer to be assigned.
    InProgress,
    /// A writer is attached and working.
    Writing,
    /// Work has been submitted and awaits an admin decision.
    InReview,
    /// The admin requested changes. Transient: immediately reopens `Writing`.
    Revision,
    /// Approved and closed. Terminal.
    Completed,
    /// Cancelled by an admin or the expiry sweep. Terminal.
    Cancelled,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::PendingPayment => "pending_payment",
            OrderStatusType::InProgress => "in_progress",
            OrderStatusType::Writing => "writing",
            OrderStatusType::InReview => "in_review",
            OrderStatusType::Revision => "revision",
            OrderStatusType::Completed => "completed",
            OrderStatusType::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(Self::PendingPayment),
            "in_progress" => Ok(Self::InProgress),
            "writing" => Ok(Self::Writing),
            "in_review" => Ok(Self::InReview),
            "revision" => Ok(Self::Revision),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------     ContentType     ---------------------------------------------------------
/// What kind of copy the client is ordering. The variant determines the authoritative per-word rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    BlogPost,
    WebCopy,
    ProductDescription,
    SocialMedia,
    TechnicalWriting,
    EmailCampaign,
}

impl ContentType {
    /// Base rate in US cents per word.
    pub fn base_rate_cents(&self) -> i64 {
        match self {
            ContentType::BlogPost => 12,
            ContentType::WebCopy => 15,
            ContentType::ProductDescription => 10,
            ContentType::SocialMedia => 8,
            ContentType::TechnicalWriting => 20,
            ContentType::EmailCampaign => 14,
        }
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContentType::BlogPost => "blog_post",
            ContentType::WebCopy => "web_copy",
            ContentType::ProductDescription => "product_description",
            ContentType::SocialMedia => "social_media",
            ContentType::TechnicalWriting => "technical_writing",
            ContentType::EmailCampaign => "email_campaign",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ContentType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blog_post" => Ok(Self::BlogPost),
            "web_copy" => Ok(Self::WebCopy),
            "product_description" => Ok(Self::ProductDescription),
            "social_media" => Ok(Self::SocialMedia),
            "technical_writing" => Ok(Self::TechnicalWriting),
            "email_campaign" => Ok(Self::EmailCampaign),
            s => Err(ConversionError(format!("Invalid content type: {s}"))),
        }
    }
}

//--------------------------------------     DeadlineTier    ---------------------------------------------------------
/// The turnaround the client selected. Rush tiers carry a percentage fee on top of the base price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum DeadlineTier {
    #[sqlx(rename = "24h")]
    #[serde(rename = "24h")]
    Rush24h,
    #[sqlx(rename = "48h")]
    #[serde(rename = "48h")]
    Rush48h,
    #[sqlx(rename = "3d")]
    #[serde(rename = "3d")]
    ThreeDays,
    #[sqlx(rename = "7d")]
    #[serde(rename = "7d")]
    SevenDays,
    #[sqlx(rename = "14d")]
    #[serde(rename = "14d")]
    FourteenDays,
}

impl DeadlineTier {
    /// Rush fee as a percentage of the base price.
    pub fn rush_fee_percent(&self) -> i64 {
        match self {
            DeadlineTier::Rush24h => 50,
            DeadlineTier::Rush48h => 30,
            _ => 0,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            DeadlineTier::Rush24h => Duration::hours(24),
            DeadlineTier::Rush48h => Duration::hours(48),
            DeadlineTier::ThreeDays => Duration::days(3),
            DeadlineTier::SevenDays => Duration::days(7),
            DeadlineTier::FourteenDays => Duration::days(14),
        }
    }

    pub fn due_from(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start + self.duration()
    }
}

impl Display for DeadlineTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeadlineTier::Rush24h => "24h",
            DeadlineTier::Rush48h => "48h",
            DeadlineTier::ThreeDays => "3d",
            DeadlineTier::SevenDays => "7d",
            DeadlineTier::FourteenDays => "14d",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DeadlineTier {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(Self::Rush24h),
            "48h" => Ok(Self::Rush48h),
            "3d" => Ok(Self::ThreeDays),
            "7d" => Ok(Self::SevenDays),
            "14d" => Ok(Self::FourteenDays),
            s => Err(ConversionError(format!("Invalid deadline tier: {s}"))),
        }
    }
}

//--------------------------------------        OrderId      ---------------------------------------------------------
/// Opaque public order identifier. The human-facing handle is the sequential `order_number` instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh random id of the form `ord-<12 hex chars>`.
    pub fn random() -> Self {
        let tail: u64 = rand::random::<u64>() & 0xffff_ffff_ffff;
        Self(format!("ord-{tail:012x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    /// Human-facing sequential number. Assigned once at creation, immutable afterwards.
    pub order_number: i64,
    pub client_email: String,
    /// Identity the order has been linked to, if the client has registered.
    pub client_id: Option<String>,
    pub content_type: ContentType,
    pub word_count: i64,
    pub title: String,
    pub description: String,
    pub keywords: Option<String>,
    pub expertise: Option<String>,
    pub deadline: DeadlineTier,
    pub due_at: DateTime<Utc>,
    pub client_price: UsdCents,
    pub writer_id: Option<String>,
    pub writer_price: Option<UsdCents>,
    pub writer_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: OrderStatusType,
}

impl Order {
    /// True when the order has reached a terminal status and may never move again.
    pub fn is_closed(&self) -> bool {
        crate::order_fsm::is_terminal(self.status)
    }
}

//--------------------------------------       NewOrder      ---------------------------------------------------------
/// An incoming order as submitted by a (possibly anonymous) client. The authoritative price is computed by
/// the engine; any client-side estimate is discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub client_email: String,
    pub content_type: ContentType,
    pub word_count: i64,
    pub title: String,
    pub description: String,
    pub keywords: Option<String>,
    pub expertise: Option<String>,
    pub deadline: DeadlineTier,
}

impl NewOrder {
    pub fn new<S: Into<String>>(
        client_email: S,
        content_type: ContentType,
        word_count: i64,
        title: S,
        description: S,
        deadline: DeadlineTier,
    ) -> Self {
        Self {
            client_email: client_email.into(),
            content_type,
            word_count,
            title: title.into(),
            description: description.into(),
            keywords: None,
            expertise: None,
            deadline,
        }
    }

    pub fn with_keywords<S: Into<String>>(mut self, keywords: S) -> Self {
        self.keywords = Some(keywords.into());
        self
    }

    pub fn with_expertise<S: Into<String>>(mut self, expertise: S) -> Self {
        self.expertise = Some(expertise.into());
        self
    }
}

//--------------------------------------     StageRecord     ---------------------------------------------------------
/// One entry in an order's append-only stage history. The current stage is the single record without a
/// `completed_at` timestamp.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StageRecord {
    pub id: i64,
    pub order_id: OrderId,
    pub stage: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

//--------------------------------------       Message       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub order_id: OrderId,
    pub sender_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub order_id: OrderId,
    pub sender_id: String,
    pub body: String,
}

impl NewMessage {
    pub fn new<S: Into<String>>(order_id: OrderId, sender_id: S, body: S) -> Self {
        Self { order_id, sender_id: sender_id.into(), body: body.into() }
    }
}

//--------------------------------------      OrderFile      ---------------------------------------------------------
/// Metadata for an artifact attached to an order. The bytes live in external object storage under
/// `storage_path`; the engine only records and scopes access to the path.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderFile {
    pub id: i64,
    pub order_id: OrderId,
    pub uploader_id: String,
    pub storage_path: String,
    pub file_name: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderFile {
    pub order_id: OrderId,
    pub uploader_id: String,
    pub file_name: String,
    pub content_type: String,
}

//--------------------------------------       Profile       ---------------------------------------------------------
/// Maps an identity-provider user id to display data and roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub roles: Roles,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub roles: Roles,
}

//--------------------------------------  WriterApplication  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExperienceTier {
    Junior,
    MidLevel,
    Experienced,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityTier {
    UpTo10Hours,
    UpTo20Hours,
    UpTo30Hours,
    FullTime,
}

/// A prospective writer's profile submission. Terminal once approved or rejected; only one live
/// application per identity.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WriterApplication {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub portfolio_url: Option<String>,
    pub experience: ExperienceTier,
    /// Comma-joined specialisation tags, at most five.
    pub specialties: String,
    pub bio: String,
    pub education: Option<String>,
    pub certifications: Option<String>,
    pub availability: AvailabilityTier,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWriterApplication {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub portfolio_url: Option<String>,
    pub experience: ExperienceTier,
    pub specialties: Vec<String>,
    pub bio: String,
    pub education: Option<String>,
    pub certifications: Option<String>,
    pub availability: AvailabilityTier,
}

//-------------------------------------- PaymentConfirmation ---------------------------------------------------------
/// A verified "payment succeeded" notification from the checkout provider. `event_id` is the provider's
/// delivery id and is the key for replay deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub event_id: String,
    pub order_id: OrderId,
    pub amount: UsdCents,
}

//--------------------------------------    SubmittedWork    ---------------------------------------------------------
/// A writer's deliverable. At least one of `content` or `file_id` must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmittedWork {
    pub content: Option<String>,
    pub file_id: Option<i64>,
}

impl SubmittedWork {
    pub fn is_empty(&self) -> bool {
        self.content.as_deref().map(str::trim).unwrap_or("").is_empty() && self.file_id.is_none()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roles_round_trip() {
        let roles: Roles = "client,writer".parse().unwrap();
        assert!(roles.contains(Role::Client));
        assert!(roles.contains(Role::Writer));
        assert!(!roles.contains(Role::Admin));
        assert_eq!(roles.to_string(), "client,writer");
        assert!("".parse::<Roles>().unwrap().is_empty());
        assert!("client,owner".parse::<Roles>().is_err());
    }

    #[test]
    fn status_round_trip() {
        for s in ["pending_payment", "in_progress", "writing", "in_review", "revision", "completed", "cancelled"] {
            let status: OrderStatusType = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("paid".parse::<OrderStatusType>().is_err());
    }

    #[test]
    fn deadline_tiers() {
        assert_eq!(DeadlineTier::Rush24h.rush_fee_percent(), 50);
        assert_eq!(DeadlineTier::Rush48h.rush_fee_percent(), 30);
        assert_eq!(DeadlineTier::SevenDays.rush_fee_percent(), 0);
        let start = Utc::now();
        assert_eq!(DeadlineTier::ThreeDays.due_from(start), start + Duration::days(3));
    }

    #[test]
    fn order_id_format() {
        let id = OrderId::random();
        assert!(id.as_str().starts_with("ord-"));
        assert_eq!(id.as_str().len(), 16);
    }

    #[test]
    fn submitted_work_emptiness() {
        assert!(SubmittedWork::default().is_empty());
        assert!(SubmittedWork { content: Some("   ".into()), file_id: None }.is_empty());
        assert!(!SubmittedWork { content: Some("draft".into()), file_id: None }.is_empty());
        assert!(!SubmittedWork { content: None, file_id: Some(3) }.is_empty());
    }
}

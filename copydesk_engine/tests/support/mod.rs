pub mod prepare_env;

use copydesk_engine::{
    db_types::{
        AvailabilityTier,
        ContentType,
        DeadlineTier,
        ExperienceTier,
        NewOrder,
        NewProfile,
        NewWriterApplication,
        Role,
        Roles,
    },
    events::EventProducers,
    messaging::MessageFeed,
    policy::Actor,
    AuthManagement,
    OrderFlowApi,
    SqliteDatabase,
    WorkflowManagement,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::support::prepare_env::{prepare_test_env, random_db_path};

pub async fn setup() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    // A single connection keeps concurrent write transactions strictly serialised in tests.
    SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating database")
}

pub fn order_flow(db: SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db, EventProducers::default(), MessageFeed::new())
}

pub async fn tear_down(db: &mut SqliteDatabase) {
    let url = WorkflowManagement::url(db).to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.expect("Error dropping test database");
}

pub fn admin() -> Actor {
    Actor::new("user-admin", "admin@copydesk.test", Roles(vec![Role::Admin]))
}

pub fn client(email: &str) -> Actor {
    Actor { user_id: Some("user-client".into()), email: Some(email.into()), roles: Roles(vec![Role::Client]) }
}

pub fn writer(user_id: &str) -> Actor {
    Actor {
        user_id: Some(user_id.into()),
        email: Some(format!("{user_id}@copydesk.test")),
        roles: Roles(vec![Role::Writer]),
    }
}

pub fn blog_post_order(email: &str) -> NewOrder {
    NewOrder::new(
        email,
        ContentType::BlogPost,
        1000,
        "Why content marketplaces need state machines",
        "A thousand words on order lifecycles.",
        DeadlineTier::Rush48h,
    )
}

/// Seeds a profile with the writer role and an approved application, so the user passes the assignment
/// eligibility checks.
pub async fn seed_approved_writer(db: &SqliteDatabase, user_id: &str) {
    let profile = NewProfile {
        user_id: user_id.to_string(),
        display_name: format!("Writer {user_id}"),
        email: format!("{user_id}@copydesk.test"),
        roles: Roles(vec![Role::Writer]),
    };
    db.upsert_profile(profile).await.expect("Error seeding writer profile");
    let application = NewWriterApplication {
        user_id: user_id.to_string(),
        name: format!("Writer {user_id}"),
        email: format!("{user_id}@copydesk.test"),
        portfolio_url: None,
        experience: ExperienceTier::Experienced,
        specialties: vec!["technology".into()],
        bio: "Ten years of B2B copy.".into(),
        education: None,
        certifications: None,
        availability: AvailabilityTier::FullTime,
    };
    use copydesk_engine::WriterManagement;
    let app = db.submit_application(application).await.expect("Error seeding application");
    db.decide_application(app.id, true).await.expect("Error approving application");
}

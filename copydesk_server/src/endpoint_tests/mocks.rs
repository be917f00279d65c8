use copydesk_engine::{
    db_types::{Message, NewProfile, Order, OrderFile, OrderId, Profile, Role, Roles, StageRecord},
    order_objects::OrderQueryFilter,
    AccountApiError,
    AuthApiError,
    AuthManagement,
    OrderManagement,
};
use mockall::mock;

mock! {
    pub OrderManager {}
    impl OrderManagement for OrderManager {
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, AccountApiError>;
        async fn fetch_order_by_number(&self, order_number: i64) -> Result<Option<Order>, AccountApiError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, AccountApiError>;
        async fn orders_for_client(&self, user_id: &str, email: &str) -> Result<Vec<Order>, AccountApiError>;
        async fn orders_for_writer(&self, writer_id: &str) -> Result<Vec<Order>, AccountApiError>;
        async fn fetch_stage_history(&self, order_id: &OrderId) -> Result<Vec<StageRecord>, AccountApiError>;
        async fn fetch_messages(&self, order_id: &OrderId) -> Result<Vec<Message>, AccountApiError>;
        async fn fetch_files(&self, order_id: &OrderId) -> Result<Vec<OrderFile>, AccountApiError>;
    }
}

mock! {
    pub AuthManager {}
    impl AuthManagement for AuthManager {
        async fn upsert_profile(&self, profile: NewProfile) -> Result<Profile, AuthApiError>;
        async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, AuthApiError>;
        async fn check_user_has_roles(&self, user_id: &str, roles: &[Role]) -> Result<(), AuthApiError>;
        async fn fetch_roles_for_user(&self, user_id: &str) -> Result<Roles, AuthApiError>;
        async fn assign_roles(&self, user_id: &str, roles: &[Role]) -> Result<(), AuthApiError>;
        async fn remove_roles(&self, user_id: &str, roles: &[Role]) -> Result<u64, AuthApiError>;
        async fn upsert_nonce_for_user(&self, user_id: &str, nonce: u64) -> Result<(), AuthApiError>;
    }
}

mod pricing;
mod storage_path;
mod validation;

pub use pricing::quote_price;
pub use storage_path::object_path;
pub use validation::{validate_new_order, ValidationError, MAX_SPECIALTIES};

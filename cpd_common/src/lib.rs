mod money;

pub mod op;
mod secret;

pub use money::{UsdCents, UsdCentsConversionError, USD_CURRENCY_CODE, USD_CURRENCY_CODE_LOWER};
pub use secret::Secret;

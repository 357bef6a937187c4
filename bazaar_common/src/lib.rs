mod money;

pub mod helpers;
pub mod op;
mod secret;
pub mod signature;

pub use money::{Money, MoneyConversionError, DEFAULT_CURRENCY_CODE};
pub use secret::Secret;

mod amount;

pub mod helpers;
mod secret;
pub mod time;

pub use amount::{Amount, AmountConversionError};
pub use secret::Secret;

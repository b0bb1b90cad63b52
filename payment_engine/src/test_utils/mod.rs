//! Test doubles for the engine's collaborators, plus environment setup for integration tests.
mod merchant_directory;
pub mod prepare_env;
mod scripted_settlement;

pub use merchant_directory::MerchantDirectory;
pub use scripted_settlement::ScriptedSettlement;

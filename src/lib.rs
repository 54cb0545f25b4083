pub mod artifacts;
pub mod cli;
mod commands;
pub mod compiler;
mod consts;
pub mod deployment;
pub mod settings;
pub mod signer;
pub mod types;
pub mod verifier;

pub use self::settings::Settings;
pub use commands::run;

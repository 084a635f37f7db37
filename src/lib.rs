//! typebot-harvest: export, inventory and seeding on top of `typebot-client`.
//!
//! The binary wires these modules to subcommands; everything here is usable
//! on its own with any [`typebot_client::TypebotClient`].

pub mod chat;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod inventory;
pub mod pipeline;
pub mod seed;

pub use config::Config;
pub use error::{HarvestError, Result};

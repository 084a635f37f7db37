//! Endpoint wrappers, one module per API area.

pub mod bots;
pub mod chat;
pub mod results;
pub mod workspaces;

//! # typebot-client
//!
//! Rust client library for the Typebot v1 HTTP API, aimed at self-hosted
//! instances.
//!
//! Covers bot structure retrieval, cursor-paginated result listings, single
//! results, programmatic chat sessions and the workspace/folder/bot listings.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use typebot_client::{PrefilledVariables, Result, TypebotClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // BASE_URL / AUTH_TOKEN from the environment
//!     let client = TypebotClient::builder().from_env().build()?;
//!
//!     let mut prefilled = PrefilledVariables::new();
//!     prefilled.insert("name".into(), "Ana".into());
//!
//!     let mut session = client.start_chat("b1", &prefilled).await?;
//!     for answer in ["yes", "42"] {
//!         if session.is_finished() {
//!             break;
//!         }
//!         session.reply(&client, answer).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod transport;

// Re-exports for ergonomic usage
pub use api::chat::ChatSession;
pub use api::results::ResultPager;
pub use client::{TypebotClient, TypebotClientBuilder};
pub use error::{Error, Result};
pub use models::bot::{BotDefinition, Variable, VariableNames};
pub use models::chat::{ChatInput, ChatMessage, ChatState, PrefilledVariables, SessionId};
pub use models::result::{Answer, ResultPage, ResultRecord, ResultVariable, ResultsQuery, TimeFilter};
pub use models::workspace::{BotSummary, Folder, Workspace};
pub use transport::{Credentials, RetryPolicy};

//! Programmatic chat sessions.

use tracing::{debug, info};

use crate::client::TypebotClient;
use crate::config;
use crate::error::Result;
use crate::models::chat::{
    ChatState, ContinueChatRequest, PrefilledVariables, SessionId, StartChatRequest,
    StartChatResponse,
};
use crate::transport::http::TypebotHttpClient;

/// Start a session with `POST /typebots/{botId}/startChat`.
pub async fn start_chat(
    http: &TypebotHttpClient,
    base_url: &str,
    bot_id: &str,
    prefilled: &PrefilledVariables,
) -> Result<StartChatResponse> {
    let url = config::start_chat_url(base_url, bot_id);
    let request = StartChatRequest {
        prefilled_variables: (!prefilled.is_empty()).then(|| prefilled.clone()),
    };

    let body = http
        .post_json(&url, &serde_json::to_value(&request)?, &format!("bot {}", bot_id))
        .await?;
    let response: StartChatResponse = serde_json::from_value(body)?;

    info!(
        bot_id,
        session_id = %response.session_id,
        prefilled = prefilled.len(),
        "Chat session started"
    );
    Ok(response)
}

/// Submit one answer with `POST /sessions/{sessionId}/continueChat`.
pub async fn continue_chat(
    http: &TypebotHttpClient,
    base_url: &str,
    session_id: &SessionId,
    message: &str,
) -> Result<ChatState> {
    let url = config::continue_chat_url(base_url, session_id.as_str());
    let request = ContinueChatRequest {
        message: message.to_string(),
    };

    let body = http
        .post_json(&url, &serde_json::to_value(&request)?, &format!("session {}", session_id))
        .await?;
    let state: ChatState = serde_json::from_value(body)?;

    debug!(
        session_id = %session_id,
        messages = state.messages.len(),
        finished = state.is_finished(),
        "Answer submitted"
    );
    Ok(state)
}

/// A running conversation.
///
/// Turns go through [`ChatSession::reply`], which borrows the session
/// mutably: answers to one session are always submitted one at a time and
/// in order.
#[derive(Debug, Clone)]
pub struct ChatSession {
    session_id: SessionId,
    result_id: Option<String>,
    state: ChatState,
    turns: u32,
}

impl ChatSession {
    pub(crate) fn from_start(response: StartChatResponse) -> Self {
        Self {
            session_id: response.session_id,
            result_id: response.result_id,
            state: response.state,
            turns: 0,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Id of the result record the session writes into, when reported.
    pub fn result_id(&self) -> Option<&str> {
        self.result_id.as_deref()
    }

    /// Latest flow state.
    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Number of answers submitted so far.
    pub fn turns(&self) -> u32 {
        self.turns
    }

    /// Submit the next answer and advance the flow.
    pub async fn reply(&mut self, client: &TypebotClient, value: &str) -> Result<&ChatState> {
        let state = client.continue_chat(&self.session_id, value).await?;
        self.state = state;
        self.turns += 1;
        Ok(&self.state)
    }
}

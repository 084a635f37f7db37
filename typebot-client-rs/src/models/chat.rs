//! Chat session payloads (`startChat` / `continueChat`).

use serde::{Deserialize, Serialize};

/// Values injected into a session at start time.
pub type PrefilledVariables = serde_json::Map<String, serde_json::Value>;

/// Session token returned by `startChat`.
///
/// Every continuation call must carry the token of a started session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a token obtained earlier, e.g. to resume a session.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of `POST /typebots/{botId}/startChat`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefilled_variables: Option<PrefilledVariables>,
}

/// Body of `POST /sessions/{sessionId}/continueChat`.
#[derive(Debug, Clone, Serialize)]
pub struct ContinueChatRequest {
    pub message: String,
}

/// A message emitted by the bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl ChatMessage {
    /// Plain text of a text bubble, if the content carries any.
    ///
    /// Handles both the markdown format and the rich-text tree format.
    pub fn text(&self) -> Option<String> {
        if let Some(markdown) = self.content.get("markdown").and_then(|v| v.as_str()) {
            return Some(markdown.to_string());
        }
        let rich_text = self.content.get("richText")?.as_array()?;
        let lines: Vec<String> = rich_text
            .iter()
            .map(collect_text)
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

fn collect_text(node: &serde_json::Value) -> String {
    let mut text = node
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    if let Some(children) = node.get("children").and_then(|v| v.as_array()) {
        for child in children {
            text.push_str(&collect_text(child));
        }
    }
    text
}

/// The input the flow is waiting for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub options: serde_json::Value,
    #[serde(default)]
    pub items: serde_json::Value,
}

/// Flow state after a start or continue call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatState {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub input: Option<ChatInput>,
    #[serde(default)]
    pub client_side_actions: serde_json::Value,
    #[serde(default)]
    pub logs: serde_json::Value,
}

impl ChatState {
    /// True once the flow no longer waits for an answer.
    pub fn is_finished(&self) -> bool {
        self.input.is_none()
    }
}

/// Response of `startChat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChatResponse {
    pub session_id: SessionId,
    #[serde(default)]
    pub result_id: Option<String>,
    #[serde(flatten)]
    pub state: ChatState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_request_serialization() {
        let mut vars = PrefilledVariables::new();
        vars.insert("name".into(), json!("Ana"));
        let req = StartChatRequest {
            prefilled_variables: Some(vars),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"prefilledVariables": {"name": "Ana"}})
        );
        assert_eq!(serde_json::to_value(StartChatRequest::default()).unwrap(), json!({}));
    }

    #[test]
    fn test_start_response_decoding() {
        let resp: StartChatResponse = serde_json::from_value(json!({
            "sessionId": "s1",
            "resultId": "r1",
            "typebot": {"id": "b1"},
            "messages": [{
                "id": "m1",
                "type": "text",
                "content": {"type": "richText", "richText": [
                    {"type": "p", "children": [{"text": "Hello "}, {"text": "Ana"}]},
                    {"type": "p", "children": [{"text": "Ready?"}]}
                ]}
            }],
            "input": {"id": "i1", "type": "choice input", "items": [{"content": "yes"}]}
        }))
        .unwrap();

        assert_eq!(resp.session_id.as_str(), "s1");
        assert_eq!(resp.result_id.as_deref(), Some("r1"));
        assert!(!resp.state.is_finished());
        assert_eq!(resp.state.messages[0].text().as_deref(), Some("Hello Ana\nReady?"));
    }

    #[test]
    fn test_finished_state() {
        let state: ChatState = serde_json::from_value(json!({
            "messages": [{"type": "text", "content": {"type": "markdown", "markdown": "Thanks!"}}]
        }))
        .unwrap();
        assert!(state.is_finished());
        assert_eq!(state.messages[0].text().as_deref(), Some("Thanks!"));
    }

    #[test]
    fn test_non_text_message() {
        let msg = ChatMessage {
            id: None,
            kind: "image".into(),
            content: json!({"url": "https://x/y.png"}),
        };
        assert!(msg.text().is_none());
    }
}

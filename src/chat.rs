//! One-off chat sessions from the command line.

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use typebot_client::{ChatState, PrefilledVariables, TypebotClient};

use crate::error::Result;

/// Parse a `key=value` prefill argument.
pub fn parse_var(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{arg}`")),
    }
}

/// Bot messages shown after one step of the conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    /// The answer that produced this step; `None` for the greeting.
    pub answer: Option<String>,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub session_id: String,
    pub result_id: Option<String>,
    pub turns: Vec<Turn>,
    pub finished: bool,
}

fn texts(state: &ChatState) -> Vec<String> {
    state.messages.iter().filter_map(|m| m.text()).collect()
}

/// Start a session and submit `answers` in order, stopping once the flow
/// ends.
pub async fn run_chat(
    client: &TypebotClient,
    bot_id: &str,
    vars: &[(String, String)],
    answers: &[String],
) -> Result<Transcript> {
    let prefilled: PrefilledVariables = vars
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    let mut session = client.start_chat(bot_id, &prefilled).await?;
    let mut turns = vec![Turn {
        answer: None,
        messages: texts(session.state()),
    }];

    for answer in answers {
        if session.is_finished() {
            info!(remaining = answers.len() + 1 - turns.len(), "Flow ended, ignoring remaining answers");
            break;
        }
        let state = session.reply(client, answer).await?;
        turns.push(Turn {
            answer: Some(answer.clone()),
            messages: texts(state),
        });
    }

    Ok(Transcript {
        session_id: session.session_id().to_string(),
        result_id: session.result_id().map(str::to_string),
        finished: session.is_finished(),
        turns,
    })
}

/// Plain-text rendering of a transcript.
pub fn render_transcript(transcript: &Transcript) -> String {
    let mut out = format!("session {}\n", transcript.session_id);
    for turn in &transcript.turns {
        if let Some(answer) = &turn.answer {
            out.push_str(&format!("> {answer}\n"));
        }
        for message in &turn.messages {
            out.push_str(&format!("bot: {message}\n"));
        }
    }
    out.push_str(if transcript.finished {
        "flow finished\n"
    } else {
        "flow awaiting input\n"
    });
    out
}

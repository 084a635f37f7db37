//! Drive a conversation: start a session with prefilled variables and answer
//! each input in turn.

use typebot_client::{PrefilledVariables, Result, TypebotClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("typebot_client=debug")
        .init();

    let bot_id = std::env::var("BOT_ID").unwrap_or_else(|_| "my-bot".to_string());
    let client = TypebotClient::builder().from_env().build()?;

    let mut prefilled = PrefilledVariables::new();
    prefilled.insert("Name".into(), "Ana".into());

    let mut session = client.start_chat(&bot_id, &prefilled).await?;
    println!("session {}", session.session_id());

    for answer in ["yes", "28", "ana@example.com"] {
        if session.is_finished() {
            break;
        }
        let state = session.reply(&client, answer).await?;
        for message in &state.messages {
            if let Some(text) = message.text() {
                println!("bot: {}", text);
            }
        }
    }

    println!(
        "{} answer(s) sent, flow finished: {}",
        session.turns(),
        session.is_finished()
    );
    Ok(())
}

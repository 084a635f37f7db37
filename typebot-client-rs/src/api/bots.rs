//! Bot structure retrieval.

use tracing::{debug, info};

use crate::config;
use crate::error::{Error, Result};
use crate::models::bot::BotDefinition;
use crate::transport::http::TypebotHttpClient;

/// Fetch the bot structure from `GET /typebots/{botId}`.
pub async fn fetch_bot_definition(
    http: &TypebotHttpClient,
    base_url: &str,
    bot_id: &str,
) -> Result<BotDefinition> {
    let url = config::bot_url(base_url, bot_id);
    info!(bot_id, "Fetching bot structure");

    let resource = format!("bot {}", bot_id);
    let body = http.get_json(&url, &[], &resource).await?;
    if body.is_null() || body.get("typebot").is_some_and(|t| t.is_null()) {
        return Err(Error::not_found(resource));
    }
    let definition = BotDefinition::from_response(body)?;

    debug!(
        bot_id,
        name = definition.name.as_str(),
        variables = definition.variables.len(),
        "Bot structure fetched"
    );
    Ok(definition)
}

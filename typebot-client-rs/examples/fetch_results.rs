//! Fetch every result of a bot and print them with friendly variable names.

use typebot_client::{Result, ResultsQuery, TimeFilter, TypebotClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("typebot_client=info")
        .init();

    let bot_id = std::env::var("BOT_ID").unwrap_or_else(|_| "my-bot".to_string());
    let client = TypebotClient::builder().from_env().build()?;

    // Identifiers in result records stay opaque without the mapping
    let names = client.fetch_bot_definition(&bot_id).await?.variable_names();

    // The server defaults to the last 7 days
    let query = ResultsQuery::new().time_filter(TimeFilter::AllTime).limit(100);
    let mut pager = client.result_pager(&bot_id, query);

    while let Some(page) = pager.next_page().await? {
        for record in &page.results {
            println!("# {} (completed: {:?})", record.id, record.is_completed);
            for var in &record.variables {
                let id = var.id.as_deref().unwrap_or_default();
                let name = var.name.as_deref().unwrap_or_else(|| names.resolve(id));
                println!("  {} = {}", name, var.value);
            }
        }
    }

    println!("{} page(s) fetched", pager.pages());
    Ok(())
}
